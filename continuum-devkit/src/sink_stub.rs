/*!
Sink de métriques factice

Enregistre tous les lots poussés au lieu de les envoyer à une Pushgateway.
Peut être basculé en panne pour exercer le chemin d'échec d'export.
*/

use async_trait::async_trait;
use continuum_core::{ExportError, MetricsSink, SampleBatch};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct RecordingSink {
    batches: Arc<Mutex<Vec<SampleBatch>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink qui refuse tout push.
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.set_failing(true);
        sink
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<SampleBatch> {
        self.batches.lock().clone()
    }

    /// Lots poussés pour un job donné (`edge_agent_<type>`)
    pub fn batches_for_job(&self, job: &str) -> Vec<SampleBatch> {
        self.batches.lock().iter().filter(|b| b.job == job).cloned().collect()
    }

    /// Dernière valeur poussée pour une série, tous lots confondus.
    pub fn last_value(&self, name: &str) -> Option<f64> {
        self.batches
            .lock()
            .iter()
            .rev()
            .flat_map(|b| b.samples.iter())
            .find(|s| s.name == name)
            .map(|s| s.value)
    }

    pub fn clear(&self) {
        self.batches.lock().clear();
    }
}

#[async_trait]
impl MetricsSink for RecordingSink {
    async fn push(&self, batch: SampleBatch) -> Result<(), ExportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ExportError::Unreachable("[mock] pushgateway down".into()));
        }
        tracing::debug!("[mock] pushed {} samples to job {}", batch.samples.len(), batch.job);
        self.batches.lock().push(batch);
        Ok(())
    }

    async fn ping(&self) -> Result<(), ExportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ExportError::Unreachable("[mock] pushgateway down".into()));
        }
        Ok(())
    }
}
