/**
 * EXPORT - Conversion des enregistrements enrichis en échantillons gauge
 *
 * Un lot d'échantillons est construit à chaque appel, remis en entier au sink
 * (un seul push, atomique), puis jeté : aucun registre global côté pipeline.
 *
 * Échec du sink = erreur remontée à l'appelant, jamais de retry local.
 */

mod pushgateway;

pub use self::pushgateway::PushgatewaySink;

use crate::enrich::EnrichedRecord;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub const JOB_PREFIX: &str = "edge_agent_";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("metrics sink unreachable: {0}")]
    Unreachable(String),
    #[error("metrics sink push timed out after {0:?}")]
    Timeout(Duration),
    #[error("metrics sink rejected push with status {0}")]
    Rejected(u16),
    #[error("failed to encode samples: {0}")]
    Encode(String),
}

/// Labels communs à chaque échantillon.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleLabels {
    pub agent_id: String,
    pub location: String,
    pub layer: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub help: String,
    pub value: f64,
    pub labels: SampleLabels,
}

/// Lot jetable d'échantillons, regroupés sous un nom de job.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBatch {
    pub job: String,
    pub samples: Vec<Sample>,
}

impl SampleBatch {
    /// Une gauge par métrique numérique ; les valeurs non numériques sont ignorées.
    pub fn from_enriched(enriched: &EnrichedRecord) -> Self {
        let source = &enriched.source;
        let labels = SampleLabels {
            agent_id: source.source.agent_id.clone(),
            location: source.source.location.clone(),
            layer: source.layer.as_str().to_string(),
        };
        let help = format!("Metric from {}", source.source.agent_type);

        let samples = enriched
            .metrics
            .iter()
            .filter_map(|(name, value)| {
                value.as_f64().map(|value| Sample {
                    name: name.clone(),
                    help: help.clone(),
                    value,
                    labels: labels.clone(),
                })
            })
            .collect();

        Self {
            job: format!("{JOB_PREFIX}{}", source.source.agent_type),
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Backend de séries temporelles qui reçoit les lots.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn push(&self, batch: SampleBatch) -> Result<(), ExportError>;

    /// Joignabilité du sink, pour les health checks.
    async fn ping(&self) -> Result<(), ExportError> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct Exporter {
    sink: Arc<dyn MetricsSink>,
}

impl Exporter {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &Arc<dyn MetricsSink> {
        &self.sink
    }

    /// Pousse le lot dérivé de `enriched`. Renvoie le nombre d'échantillons envoyés.
    pub async fn export(&self, enriched: &EnrichedRecord) -> Result<usize, ExportError> {
        let batch = SampleBatch::from_enriched(enriched);
        let job = batch.job.clone();
        let count = batch.len();

        match self.sink.push(batch).await {
            Ok(()) => {
                info!("pushed {count} samples for {} (job {job})", enriched.source.source.agent_id);
                Ok(count)
            }
            Err(e) => {
                error!("failed to push metrics for job {job}: {e}");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::Enricher;
    use crate::normalize::normalize;
    use crate::payload::{MetricPayload, MetricValue, Metrics};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Capture {
        batches: Mutex<Vec<SampleBatch>>,
        fail: bool,
    }

    #[async_trait]
    impl MetricsSink for Capture {
        async fn push(&self, batch: SampleBatch) -> Result<(), ExportError> {
            if self.fail {
                return Err(ExportError::Unreachable("connection refused".into()));
            }
            self.batches.lock().push(batch);
            Ok(())
        }
    }

    fn enriched() -> EnrichedRecord {
        let mut metrics = Metrics::new();
        metrics.insert("cpu_usage".into(), MetricValue::Float(41.2));
        metrics.insert("connections".into(), MetricValue::Integer(7));
        metrics.insert("status".into(), MetricValue::Text("ok".into()));
        metrics.insert("online".into(), MetricValue::Flag(true));
        let payload = MetricPayload {
            agent_id: "g1".into(),
            location: "rack-2".into(),
            agent_type: "gateway".into(),
            timestamp: "2024-01-01T00:00:00Z".into(),
            metrics,
        };
        Enricher::default().enrich(&normalize(&payload))
    }

    #[test]
    fn test_batch_keeps_numeric_only() {
        let batch = SampleBatch::from_enriched(&enriched());
        assert_eq!(batch.job, "edge_agent_gateway");
        let names: Vec<_> = batch.samples.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["gateway_connections", "gateway_cpu_usage"]);
        let labels = &batch.samples[0].labels;
        assert_eq!(labels.agent_id, "g1");
        assert_eq!(labels.location, "rack-2");
        assert_eq!(labels.layer, "fog");
        assert_eq!(batch.samples[0].value, 7.0);
    }

    #[tokio::test]
    async fn test_export_pushes_one_batch() {
        let sink = Arc::new(Capture::default());
        let exporter = Exporter::new(sink.clone());
        assert_eq!(exporter.export(&enriched()).await.unwrap(), 2);
        assert_eq!(sink.batches.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_export_escalates_sink_failure() {
        let sink = Arc::new(Capture { fail: true, ..Default::default() });
        let exporter = Exporter::new(sink);
        assert!(matches!(exporter.export(&enriched()).await, Err(ExportError::Unreachable(_))));
    }
}
