use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use tokio::fs;
use tracing::warn;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    pub listen_addr: String,
    /// Absent = keyed store en mémoire (dev, tests)
    pub redis_url: Option<String>,
    pub processor_url: String,
    pub store_timeout_secs: u64,
    pub forward_timeout_secs: u64,
    pub health_timeout_secs: u64,
    pub forward_queue_capacity: usize,
    pub presence_window_secs: u64,
    pub history_ttl_secs: u64,
    pub history_capacity: usize,
    pub known_agent_types: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".into(),
            redis_url: None,
            processor_url: "http://middleware-processor:8001".into(),
            store_timeout_secs: 2,
            forward_timeout_secs: 5,
            health_timeout_secs: 2,
            forward_queue_capacity: continuum_core::forward::DEFAULT_QUEUE_CAPACITY,
            presence_window_secs: continuum_core::presence::DEFAULT_PRESENCE_WINDOW.as_secs(),
            history_ttl_secs: continuum_core::history::DEFAULT_HISTORY_TTL.as_secs(),
            history_capacity: continuum_core::history::DEFAULT_HISTORY_CAPACITY,
            known_agent_types: continuum_core::presence::DEFAULT_AGENT_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

impl GatewayConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_secs(self.forward_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn presence_window(&self) -> Duration {
        Duration::from_secs(self.presence_window_secs)
    }

    pub fn history_ttl(&self) -> Duration {
        Duration::from_secs(self.history_ttl_secs)
    }

    /// Les variables d'environnement l'emportent sur le fichier.
    fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var("REDIS_URL") {
            self.redis_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Ok(url) = std::env::var("PROCESSOR_URL") {
            self.processor_url = url;
        }
        if let Ok(addr) = std::env::var("LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        self
    }
}

pub fn parse_config(txt: &str) -> GatewayConfig {
    if txt.trim().is_empty() {
        return GatewayConfig::default();
    }
    serde_yaml::from_str(txt).unwrap_or_else(|e| {
        warn!("invalid gateway config: {e}");
        GatewayConfig::default()
    })
}

pub async fn load_config() -> GatewayConfig {
    let path = std::env::var("CONTINUUM_GATEWAY_CONFIG").unwrap_or_else(|_| "gateway.yaml".into());
    let cfg = if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        parse_config(&txt)
    } else {
        warn!("no {path}, using default gateway config");
        GatewayConfig::default()
    };
    cfg.apply_env()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.history_capacity, 100);
        assert_eq!(cfg.presence_window(), Duration::from_secs(300));
        assert_eq!(cfg.history_ttl(), Duration::from_secs(3600));
        assert_eq!(cfg.known_agent_types.len(), 3);
        assert!(cfg.redis_url.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = parse_config("redis_url: redis://redis:6379\nhistory_capacity: 20\n");
        assert_eq!(cfg.redis_url.as_deref(), Some("redis://redis:6379"));
        assert_eq!(cfg.history_capacity, 20);
        assert_eq!(cfg.forward_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_yaml_falls_back() {
        let cfg = parse_config("history_capacity: [not, a, number]");
        assert_eq!(cfg.history_capacity, 100);
    }
}
