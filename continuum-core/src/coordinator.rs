/**
 * COORDINATEUR D'INGESTION - Les deux rôles du pipeline
 *
 * GATEWAY : accept(payload)
 *   compteur reçu -> buffer historique -> présence -> gauges actifs -> file vers processor
 *   Le producteur reçoit un accusé dès que le payload est bufferisé ; présence/gauges et
 *   remise au processor ne peuvent plus faire échouer la réponse.
 *
 * PROCESSOR : process(payload)
 *   validate -> normalize -> enrich -> export
 *   Rejet = terminal (aucune étape suivante) ; échec d'export = erreur remontée.
 *
 * Le processor ne possède aucun état : il transforme ce qu'on lui remet.
 */

use crate::enrich::Enricher;
use crate::export::{ExportError, Exporter};
use crate::forward::ForwardQueue;
use crate::history::HistoryRing;
use crate::normalize::normalize;
use crate::payload::MetricPayload;
use crate::presence::PresenceTracker;
use crate::store::StoreError;
use crate::telemetry::{GatewayMetrics, ProcessorMetrics};
use crate::validate::{self, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Accusé de réception renvoyé au producteur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptAck {
    pub status: String,
    pub agent_id: String,
    pub timestamp: String,
}

/// Résumé renvoyé par le processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedAck {
    pub status: String,
    pub agent_id: String,
    pub processed_at: String,
    pub metrics_count: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to buffer payload: {0}")]
    Buffer(#[source] StoreError),
    #[error("store query failed: {0}")]
    Query(#[source] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Invalid payload: {0}")]
    Invalid(#[from] ValidationError),
    #[error("{0}")]
    Export(#[from] ExportError),
}

pub struct Gateway {
    presence: Arc<PresenceTracker>,
    history: Arc<HistoryRing>,
    forward: ForwardQueue,
    metrics: GatewayMetrics,
}

impl Gateway {
    pub fn new(
        presence: Arc<PresenceTracker>,
        history: Arc<HistoryRing>,
        forward: ForwardQueue,
        metrics: GatewayMetrics,
    ) -> Self {
        Self {
            presence,
            history,
            forward,
            metrics,
        }
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.metrics
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub async fn accept(&self, payload: MetricPayload) -> Result<AcceptAck, GatewayError> {
        let _timer = self.metrics.processing_seconds.start_timer();

        self.metrics
            .received
            .with_label_values(&[payload.agent_type.as_str(), payload.location.as_str()])
            .inc();

        self.history.record(&payload).await.map_err(GatewayError::Buffer)?;

        if let Err(e) = self.presence.observe(&payload.agent_type, &payload.agent_id).await {
            warn!("failed to track presence of {}: {e}", payload.agent_id);
        }
        match self.presence.counts().await {
            Ok(counts) => self.metrics.publish_active(&counts),
            Err(e) => warn!("failed to refresh active agent gauges: {e}"),
        }

        info!("Received metrics from {} ({})", payload.agent_id, payload.agent_type);
        let agent_id = payload.agent_id.clone();
        if !self.forward.enqueue(payload) {
            self.metrics.forward_dropped.inc();
        }

        Ok(AcceptAck {
            status: "accepted".to_string(),
            agent_id,
            timestamp: crate::now_iso(),
        })
    }

    pub async fn active_agents(&self) -> Result<BTreeMap<String, BTreeSet<String>>, GatewayError> {
        self.presence.snapshot().await.map_err(GatewayError::Query)
    }

    pub async fn history(&self, agent_id: &str, limit: usize) -> Result<Vec<MetricPayload>, GatewayError> {
        self.history.history(agent_id, limit).await.map_err(GatewayError::Query)
    }
}

pub struct Processor {
    enricher: Enricher,
    exporter: Exporter,
    metrics: ProcessorMetrics,
}

impl Processor {
    pub fn new(enricher: Enricher, exporter: Exporter, metrics: ProcessorMetrics) -> Self {
        Self {
            enricher,
            exporter,
            metrics,
        }
    }

    pub fn metrics(&self) -> &ProcessorMetrics {
        &self.metrics
    }

    pub fn pipeline_version(&self) -> &str {
        self.enricher.pipeline_version()
    }

    pub fn exporter(&self) -> &Exporter {
        &self.exporter
    }

    pub async fn process(&self, payload: &MetricPayload) -> Result<ProcessedAck, ProcessError> {
        if let Err(reason) = validate::check(payload) {
            warn!("rejected payload from {:?}: {reason}", payload.agent_id);
            self.metrics.record("rejected");
            return Err(reason.into());
        }

        let normalized = normalize(payload);
        debug!("Normalized data from {}", payload.agent_id);

        let enriched = self.enricher.enrich(&normalized);
        debug!("Enriched data from {}", payload.agent_id);

        if let Err(e) = self.exporter.export(&enriched).await {
            self.metrics.record("failed");
            return Err(e.into());
        }

        self.metrics.record("processed");
        Ok(ProcessedAck {
            status: "processed".to_string(),
            agent_id: payload.agent_id.clone(),
            processed_at: crate::now_iso(),
            metrics_count: enriched.metrics.len(),
        })
    }
}
