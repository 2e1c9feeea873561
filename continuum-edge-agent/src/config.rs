//! Configuration de l'agent, lue uniquement depuis l'environnement.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub agent_id: String,
    pub location: String,
    pub agent_type: String,
    pub middleware_url: String,
    pub push_interval_secs: u64,
    pub startup_delay_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_id: "edge-unknown".to_string(),
            location: "unknown".to_string(),
            agent_type: "generic".to_string(),
            middleware_url: "http://middleware-gateway:8000".to_string(),
            push_interval_secs: 10,
            startup_delay_secs: 10,
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construit la config à partir d'une source clé -> valeur (l'environnement en prod).
    /// Les durées illisibles retombent sur la valeur par défaut.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            agent_id: lookup("AGENT_ID").unwrap_or(defaults.agent_id),
            location: lookup("AGENT_LOCATION").unwrap_or(defaults.location),
            agent_type: lookup("AGENT_TYPE").unwrap_or(defaults.agent_type),
            middleware_url: lookup("MIDDLEWARE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.middleware_url),
            push_interval_secs: secs("PUSH_INTERVAL", defaults.push_interval_secs),
            startup_delay_secs: secs("AGENT_STARTUP_DELAY", defaults.startup_delay_secs),
        }
    }

    pub fn push_interval(&self) -> Duration {
        Duration::from_secs(self.push_interval_secs.max(1))
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    pub fn ingest_url(&self) -> String {
        format!("{}/api/v1/metrics", self.middleware_url)
    }
}
