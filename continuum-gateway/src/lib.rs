//! Continuum Gateway - rôle passerelle du relais de télémétrie.
//!
//! Reçoit les payloads des agents edge, les bufferise (historique borné), suit les agents
//! actifs et les remet en tâche de fond au processor.

pub mod config;
pub mod health;
pub mod http;

pub use config::{load_config, GatewayConfig};
pub use http::{build_router, AppState};

use continuum_core::{
    ForwardQueue, Gateway, GatewayMetrics, HistoryRing, KeyedStore, PresenceTracker, ProcessorClient,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Assemble l'état partagé à partir des capacités externes (store, processor).
/// Renvoie aussi le worker de remise au processor.
pub fn assemble(
    cfg: &GatewayConfig,
    store: Arc<dyn KeyedStore>,
    processor: Arc<dyn ProcessorClient>,
) -> anyhow::Result<(AppState, JoinHandle<()>)> {
    let presence = Arc::new(
        PresenceTracker::new(store.clone(), cfg.presence_window())
            .with_known_types(cfg.known_agent_types.iter().cloned()),
    );
    let history = Arc::new(HistoryRing::new(store.clone(), cfg.history_ttl(), cfg.history_capacity));
    let (queue, worker) = ForwardQueue::spawn(processor.clone(), cfg.forward_queue_capacity);
    let gateway = Gateway::new(presence, history, queue, GatewayMetrics::new()?);

    let state = AppState {
        gateway: Arc::new(gateway),
        store,
        processor,
        health_tracker: health::HealthTracker::new(),
    };
    Ok((state, worker))
}
