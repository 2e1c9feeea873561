/*!
Construction de payloads producteur pour les tests
*/

use continuum_core::{MetricPayload, MetricValue, Metrics};

pub struct PayloadBuilder {
    agent_id: String,
    location: String,
    agent_type: String,
    timestamp: String,
    metrics: Metrics,
}

impl PayloadBuilder {
    /// Capteur de température en "room1", horodaté maintenant, sans métriques.
    pub fn new(agent_id: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            location: "room1".to_string(),
            agent_type: "temperature-sensor".to_string(),
            timestamp: continuum_core::now_iso(),
            metrics: Metrics::new(),
        }
    }

    /// Payload de référence : a1 / room1 / temperature-sensor, temperature = 23.
    pub fn e2e() -> MetricPayload {
        Self::new("a1")
            .timestamp("2024-01-01T00:00:00Z")
            .metric("temperature", 23i64)
            .build()
    }

    pub fn location(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }

    pub fn agent_type(mut self, agent_type: &str) -> Self {
        self.agent_type = agent_type.to_string();
        self
    }

    pub fn timestamp(mut self, timestamp: &str) -> Self {
        self.timestamp = timestamp.to_string();
        self
    }

    pub fn metric(mut self, key: &str, value: impl Into<MetricValue>) -> Self {
        self.metrics.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> MetricPayload {
        MetricPayload {
            agent_id: self.agent_id,
            location: self.location,
            agent_type: self.agent_type,
            timestamp: self.timestamp,
            metrics: self.metrics,
        }
    }

    /// Corps JSON tel qu'un agent edge l'enverrait.
    pub fn to_json(self) -> serde_json::Value {
        serde_json::to_value(self.build()).unwrap_or_default()
    }
}
