use continuum_core::{KeyedStore, ProcessorClient};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
pub struct GatewayHealth {
    pub status: String,
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub components: BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self { start_time: Instant::now() }
    }

    /// Sonde le store et le processor ; "degraded" dès qu'un composant ne répond pas.
    pub async fn check(&self, store: &dyn KeyedStore, processor: &dyn ProcessorClient) -> GatewayHealth {
        let mut components = BTreeMap::new();

        let redis = match store.ping().await {
            Ok(()) => "healthy",
            Err(e) => {
                debug!("[health] store unhealthy: {e}");
                "unhealthy"
            }
        };
        components.insert("redis".to_string(), redis.to_string());

        let processor = match processor.health().await {
            Ok(()) => "healthy",
            Err(e) => {
                debug!("[health] processor unhealthy: {e}");
                "unhealthy"
            }
        };
        components.insert("processor".to_string(), processor.to_string());

        let status = if components.values().all(|v| v == "healthy") { "healthy" } else { "degraded" };

        GatewayHealth {
            status: status.to_string(),
            timestamp: continuum_core::now_iso(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            components,
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}
