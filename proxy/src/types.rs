//! Proxy entity and rotation-strategy vocabulary.

use std::collections::HashSet;
use std::fmt;

use uuid::Uuid;

use crate::error::ProxyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStatus {
    Untested,
    Good,
    Slow,
    Bad,
    Banned,
    RateLimited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyRotationStrategy {
    RoundRobin,
    Random,
    Sticky,
    Smart,
    Fastest,
    LeastUsed,
}

#[derive(Debug, Clone, Default)]
pub struct ProxyStats {
    pub success_count: u64,
    pub failure_count: u64,
    pub total_requests: u64,
    pub avg_response_time_ms: f64,
    pub last_response_time_ms: f64,
    pub last_used_ms: u64,
    pub last_tested_ms: u64,
    pub consecutive_failures: u32,
    pub ban_count: u32,
    pub sites_banned: HashSet<String>,
}

impl ProxyStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.success_count as f64 / self.total_requests as f64
        }
    }
}

#[derive(Clone)]
pub struct Proxy {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub protocol: String,
    pub group_id: Option<String>,
    pub status: ProxyStatus,
    pub stats: ProxyStats,
    pub country: Option<String>,
    pub is_residential: bool,
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("id", &self.id)
            .field("display", &self.display())
            .field("status", &self.status)
            .finish()
    }
}

impl Proxy {
    pub fn new(host: impl Into<String>, port: u16, group_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            host: host.into(),
            port,
            username: None,
            password: None,
            protocol: "http".to_string(),
            group_id,
            status: ProxyStatus::Untested,
            stats: ProxyStats::default(),
            country: None,
            is_residential: false,
        }
    }

    /// Parses `host:port`, or `host:port:user:pass` (password may itself
    /// contain colons, so everything past the third colon is joined back).
    pub fn from_string(proxy_string: &str, group_id: Option<String>) -> Result<Self, ProxyError> {
        let parts: Vec<&str> = proxy_string.trim().split(':').collect();
        match parts.as_slice() {
            [host, port] => {
                let port: u16 = port
                    .parse()
                    .map_err(|_| ProxyError::InvalidFormat(proxy_string.to_string()))?;
                Ok(Self::new(*host, port, group_id))
            }
            [host, port, user, rest @ ..] => {
                let port: u16 = port
                    .parse()
                    .map_err(|_| ProxyError::InvalidFormat(proxy_string.to_string()))?;
                let mut proxy = Self::new(*host, port, group_id);
                proxy.username = Some((*user).to_string());
                proxy.password = Some(rest.join(":"));
                Ok(proxy)
            }
            _ => Err(ProxyError::InvalidFormat(proxy_string.to_string())),
        }
    }

    pub fn url(&self) -> String {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => {
                format!("{}://{}:{}@{}:{}", self.protocol, user, pass, self.host, self.port)
            }
            _ => format!("{}://{}:{}", self.protocol, self.host, self.port),
        }
    }

    pub fn display(&self) -> String {
        if self.username.is_some() {
            format!("{}:{}:****", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_port() {
        let p = Proxy::from_string("1.2.3.4:8080", None).unwrap();
        assert_eq!(p.host, "1.2.3.4");
        assert_eq!(p.port, 8080);
        assert!(p.username.is_none());
    }

    #[test]
    fn parses_host_port_user_pass_with_embedded_colon() {
        let p = Proxy::from_string("1.2.3.4:8080:user:pa:ss", None).unwrap();
        assert_eq!(p.username.as_deref(), Some("user"));
        assert_eq!(p.password.as_deref(), Some("pa:ss"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Proxy::from_string("not-a-proxy", None).is_err());
    }

    #[test]
    fn display_masks_credentials() {
        let mut p = Proxy::new("1.2.3.4", 8080, None);
        p.username = Some("user".into());
        p.password = Some("pw".into());
        assert_eq!(p.display(), "1.2.3.4:8080:****");
        assert!(p.url().contains("user:pw@"));
    }
}
