pub mod cli;
pub mod demo;

use std::sync::Arc;

use clap::Parser;

use cli::{Cli, Command};
use proxy::{PoolConfig, ProxyPool};
use scheduler::{Scheduler, SchedulerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    common::logger::init_logger("solecop");

    let cli = Cli::parse();

    match cli.command {
        Command::Run { keywords, ticks, max_concurrent } => run_pipeline(keywords, ticks, max_concurrent).await?,
        Command::ProxyCheck { proxies, strategy, draws } => proxy_check(proxies, strategy.into(), draws)?,
    }

    Ok(())
}

/// Wires Monitor Engine → Task Scheduler → Checkout Engine against a
/// scripted demo storefront: a size restocks on the second tick, the
/// monitor's keyword match turns that into an auto-submitted task, and the
/// scheduler runs it against a `DemoCheckoutHandler` standing in for a real
/// storefront.
async fn run_pipeline(keywords: String, ticks: usize, max_concurrent: usize) -> anyhow::Result<()> {
    let site = Arc::new(demo::ScriptedSite::restock_after_first_tick());
    let monitor = monitor::Monitor::new(
        monitor::MonitorConfig {
            site_name: "Demo Sneaker Co".to_string(),
            site_url: "https://demo.example.com".to_string(),
            keywords,
            delay: std::time::Duration::from_millis(50),
            error_delay: std::time::Duration::from_millis(50),
        },
        site,
    );

    let scheduler = Scheduler::new(
        SchedulerConfig { max_concurrent, min_site_delay_ms: 50 },
        Arc::new(demo::DemoCheckoutHandler),
    );

    let mut events = monitor.subscribe().await;
    let mut submitted = Vec::new();

    for tick in 0..ticks {
        monitor.tick().await;
        while let Ok(event) = events.try_recv() {
            tracing::info!(
                tick,
                event_type = ?event.event_type,
                product = %event.observation.title,
                sizes = ?event.observation.available_sizes,
                "monitor match"
            );
            let config = demo::task_config_for_event(&event);
            if let Some(task_id) = scheduler.submit_auto(config, event.observation.url.clone()).await {
                submitted.push(task_id);
            }
        }
    }

    for task_id in submitted {
        if let Some(task) = scheduler.wait_for_terminal(task_id).await {
            tracing::info!(task_id = %task.id, status = %task.status, "task finished");
        }
    }

    let stats = scheduler.stats().await;
    println!(
        "scheduler stats: total={} success={} declined={} failed={}",
        stats.total, stats.success, stats.declined, stats.failed
    );

    Ok(())
}

/// Draws `draws` proxies from a pool seeded from `proxies` under `strategy`
/// and prints the sequence chosen, useful for sanity-checking a rotation
/// policy against a real proxy list before wiring it into a live session.
fn proxy_check(proxies: Vec<String>, strategy: proxy::ProxyRotationStrategy, draws: usize) -> anyhow::Result<()> {
    let pool = ProxyPool::new(PoolConfig { rotation_strategy: strategy, ..Default::default() });
    pool.add_proxies_from_string(&proxies.join("\n"), "cli");

    for i in 0..draws {
        match pool.get_proxy(None, None, None, None) {
            Ok(p) => println!("draw {i}: {}", p.display()),
            Err(err) => println!("draw {i}: no proxy available ({err})"),
        }
    }

    println!("{:#?}", pool.get_stats(None));
    Ok(())
}
