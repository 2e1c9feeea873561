//! Continuum Processor - rôle de traitement du relais de télémétrie.
//!
//! Sans état : chaque payload remis par la passerelle est validé, normalisé, enrichi
//! puis poussé vers le backend de métriques.

pub mod config;
pub mod http;

pub use config::{load_config, ProcessorConfig};
pub use http::{build_router, AppState};

use continuum_core::{Enricher, Exporter, MetricsSink, Processor, ProcessorMetrics};
use std::sync::Arc;

pub fn assemble(cfg: &ProcessorConfig, sink: Arc<dyn MetricsSink>) -> anyhow::Result<AppState> {
    let enricher = Enricher::new(cfg.layer_table(), cfg.pipeline_version.clone());
    let processor = Processor::new(enricher, Exporter::new(sink), ProcessorMetrics::new()?);
    Ok(AppState {
        processor: Arc::new(processor),
    })
}
