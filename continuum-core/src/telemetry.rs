//! Prometheus metrics exposed by each role on its own `/metrics` endpoint.
//!
//! Each role owns a private `Registry` so several instances can coexist in one process
//! (tests, in-memory harness).

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Metrics of the gateway role.
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    /// Total payloads received, by agent type and location.
    pub received: IntCounterVec,
    /// Time spent accepting one payload.
    pub processing_seconds: Histogram,
    /// Current bucket cardinality per agent type.
    pub active_agents: IntGaugeVec,
    /// Payloads dropped because the forward queue was full.
    pub forward_dropped: IntCounter,
    published_types: Arc<Mutex<BTreeSet<String>>>,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let received = IntCounterVec::new(
            Opts::new("middleware_metrics_received_total", "Total metrics received"),
            &["agent_type", "location"],
        )?;
        let processing_seconds = Histogram::with_opts(HistogramOpts::new(
            "middleware_processing_seconds",
            "Time spent processing metrics",
        ))?;
        let active_agents = IntGaugeVec::new(
            Opts::new("middleware_active_agents", "Number of active agents"),
            &["agent_type"],
        )?;
        let forward_dropped = IntCounter::new(
            "middleware_forward_dropped_total",
            "Payloads dropped because the processor queue was full",
        )?;

        registry.register(Box::new(received.clone()))?;
        registry.register(Box::new(processing_seconds.clone()))?;
        registry.register(Box::new(active_agents.clone()))?;
        registry.register(Box::new(forward_dropped.clone()))?;

        Ok(Self {
            registry,
            received,
            processing_seconds,
            active_agents,
            forward_dropped,
            published_types: Arc::default(),
        })
    }

    /// Publish the active-agent gauge for every known type. Types missing from `counts`
    /// lose their series.
    pub fn publish_active(&self, counts: &BTreeMap<String, usize>) {
        let mut published = self.published_types.lock();
        for agent_type in published.iter().filter(|t| !counts.contains_key(*t)) {
            let _ = self.active_agents.remove_label_values(&[agent_type.as_str()]);
        }
        for (agent_type, count) in counts {
            self.active_agents
                .with_label_values(&[agent_type.as_str()])
                .set(*count as i64);
        }
        *published = counts.keys().cloned().collect();
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        encode_registry(&self.registry)
    }
}

/// Metrics of the processor role.
#[derive(Clone)]
pub struct ProcessorMetrics {
    registry: Registry,
    /// Payloads handled, by outcome (processed, rejected, failed).
    pub payloads: IntCounterVec,
}

impl ProcessorMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let payloads = IntCounterVec::new(
            Opts::new("processor_payloads_total", "Payloads handled by the processing pipeline"),
            &["outcome"],
        )?;
        registry.register(Box::new(payloads.clone()))?;
        Ok(Self { registry, payloads })
    }

    pub fn record(&self, outcome: &str) {
        self.payloads.with_label_values(&[outcome]).inc();
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        encode_registry(&self.registry)
    }
}

fn encode_registry(registry: &Registry) -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
