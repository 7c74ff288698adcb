#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_concurrent: usize,
    pub min_site_delay_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_concurrent: 10, min_site_delay_ms: 500 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    pub total: usize,
    pub running: usize,
    pub idle: usize,
    pub success: usize,
    pub failed: usize,
    pub declined: usize,
    pub avg_checkout_time_seconds: Option<f64>,
    pub total_retries: u64,
}
