/*!
Clients processor factices

- `RecordingProcessor` : enregistre les payloads remis, sans les traiter
- `InProcessProcessor` : branche la passerelle directement sur un `Processor` du même process
*/

use async_trait::async_trait;
use continuum_core::{ForwardError, MetricPayload, ProcessError, Processor, ProcessorClient};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct RecordingProcessor {
    forwarded: Arc<Mutex<Vec<MetricPayload>>>,
    down: Arc<AtomicBool>,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn forwarded(&self) -> Vec<MetricPayload> {
        self.forwarded.lock().clone()
    }

    pub fn forwarded_for(&self, agent_id: &str) -> Vec<MetricPayload> {
        self.forwarded
            .lock()
            .iter()
            .filter(|p| p.agent_id == agent_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ProcessorClient for RecordingProcessor {
    async fn forward(&self, payload: &MetricPayload) -> Result<(), ForwardError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(ForwardError::Unreachable("[mock] processor down".into()));
        }
        self.forwarded.lock().push(payload.clone());
        Ok(())
    }

    async fn health(&self) -> Result<(), ForwardError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(ForwardError::Unreachable("[mock] processor down".into()));
        }
        Ok(())
    }
}

/// Remise directe au pipeline de traitement, statuts HTTP équivalents en cas d'échec.
#[derive(Clone)]
pub struct InProcessProcessor {
    processor: Arc<Processor>,
}

impl InProcessProcessor {
    pub fn new(processor: Arc<Processor>) -> Self {
        Self { processor }
    }

    pub fn processor(&self) -> &Arc<Processor> {
        &self.processor
    }
}

#[async_trait]
impl ProcessorClient for InProcessProcessor {
    async fn forward(&self, payload: &MetricPayload) -> Result<(), ForwardError> {
        match self.processor.process(payload).await {
            Ok(_) => Ok(()),
            Err(ProcessError::Invalid(_)) => Err(ForwardError::Status(400)),
            Err(ProcessError::Export(_)) => Err(ForwardError::Status(500)),
        }
    }

    async fn health(&self) -> Result<(), ForwardError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PayloadBuilder, RecordingSink};
    use continuum_core::{Enricher, Exporter, ProcessorMetrics};

    #[tokio::test]
    async fn test_recording_processor() {
        let processor = RecordingProcessor::new();
        processor.forward(&PayloadBuilder::e2e()).await.unwrap();
        assert_eq!(processor.forwarded_for("a1").len(), 1);

        processor.set_down(true);
        assert!(processor.forward(&PayloadBuilder::e2e()).await.is_err());
        assert!(processor.health().await.is_err());
        assert_eq!(processor.forwarded().len(), 1);
    }

    #[tokio::test]
    async fn test_in_process_maps_failures_to_status() {
        let sink = RecordingSink::new();
        let processor = Arc::new(Processor::new(
            Enricher::default(),
            Exporter::new(Arc::new(sink.clone())),
            ProcessorMetrics::new().unwrap(),
        ));
        let client = InProcessProcessor::new(processor);

        client.forward(&PayloadBuilder::e2e()).await.unwrap();
        assert_eq!(sink.batches().len(), 1);

        let invalid = PayloadBuilder::new("").metric("temperature", 20.0).build();
        assert!(matches!(client.forward(&invalid).await, Err(ForwardError::Status(400))));

        sink.set_failing(true);
        assert!(matches!(client.forward(&PayloadBuilder::e2e()).await, Err(ForwardError::Status(500))));
    }
}
