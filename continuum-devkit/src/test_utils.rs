/*!
Test Harness pour le relais

Relie dans un seul process :
- un store mémoire (à la place de Redis)
- un `Processor` qui pousse vers un `RecordingSink` (à la place de la Pushgateway)
- une `Gateway` dont la file de remise alimente ce processor
*/

use crate::processor_stub::InProcessProcessor;
use crate::sink_stub::RecordingSink;
use anyhow::Result;
use continuum_core::forward::DEFAULT_QUEUE_CAPACITY;
use continuum_core::history::{DEFAULT_HISTORY_CAPACITY, DEFAULT_HISTORY_TTL};
use continuum_core::presence::DEFAULT_PRESENCE_WINDOW;
use continuum_core::{
    Enricher, Exporter, ForwardQueue, Gateway, GatewayMetrics, HistoryRing, MemoryStore, PresenceTracker,
    Processor, ProcessorMetrics, SampleBatch,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub sink: RecordingSink,
    pub processor: Arc<Processor>,
    pub client: InProcessProcessor,
}

impl TestHarness {
    pub fn new() -> Result<Self> {
        tracing_subscriber::fmt()
            .with_env_filter("continuum_core=debug")
            .with_test_writer()
            .try_init()
            .ok();

        let sink = RecordingSink::new();
        let processor = Arc::new(Processor::new(
            Enricher::default(),
            Exporter::new(Arc::new(sink.clone())),
            ProcessorMetrics::new()?,
        ));
        Ok(Self {
            store: Arc::new(MemoryStore::new()),
            sink,
            client: InProcessProcessor::new(processor.clone()),
            processor,
        })
    }

    /// Passerelle avec les réglages par défaut, remettant au processor du harness.
    pub fn gateway(&self) -> Result<(Gateway, JoinHandle<()>)> {
        let presence = Arc::new(PresenceTracker::new(self.store.clone(), DEFAULT_PRESENCE_WINDOW));
        let history = Arc::new(HistoryRing::new(
            self.store.clone(),
            DEFAULT_HISTORY_TTL,
            DEFAULT_HISTORY_CAPACITY,
        ));
        let (queue, worker) = ForwardQueue::spawn(Arc::new(self.client.clone()), DEFAULT_QUEUE_CAPACITY);
        Ok((Gateway::new(presence, history, queue, GatewayMetrics::new()?), worker))
    }

    /// Attend que le sink ait reçu au moins `count` lots.
    pub async fn wait_for_batches(&self, count: usize, timeout_ms: u64) -> Result<Vec<SampleBatch>> {
        let start = std::time::Instant::now();

        while start.elapsed() < Duration::from_millis(timeout_ms) {
            let batches = self.sink.batches();
            if batches.len() >= count {
                return Ok(batches);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        tracing::warn!("timeout waiting for {count} batches");
        anyhow::bail!("expected {count} batches, got {}", self.sink.batches().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PayloadBuilder;

    #[tokio::test]
    async fn test_gateway_to_sink_roundtrip() {
        let harness = TestHarness::new().unwrap();
        let (gateway, _worker) = harness.gateway().unwrap();

        let ack = gateway.accept(PayloadBuilder::e2e()).await.unwrap();
        assert_eq!(ack.agent_id, "a1");

        let batches = harness.wait_for_batches(1, 2000).await.unwrap();
        assert_eq!(batches[0].job, "edge_agent_temperature-sensor");
        assert_eq!(harness.sink.last_value("temperature_sensor_temperature"), Some(23.0));
        assert_eq!(harness.sink.last_value("temperature_sensor_temperature_fahrenheit"), Some(73.4));
    }

    #[tokio::test]
    async fn test_export_failure_does_not_fail_accept() {
        let harness = TestHarness::new().unwrap();
        harness.sink.set_failing(true);
        let (gateway, _worker) = harness.gateway().unwrap();

        assert!(gateway.accept(PayloadBuilder::e2e()).await.is_ok());
        assert!(harness.wait_for_batches(1, 200).await.is_err());
        assert_eq!(gateway.history("a1", 10).await.unwrap().len(), 1);
    }
}
