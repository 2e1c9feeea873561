//! Contrat de données des producteurs (edge devices).
//!
//! Les valeurs de métriques sont un enum étiqueté (nombre | texte | booléen) pour que
//! l'enrichissement et l'export filtrent explicitement les valeurs numériques.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Mapping nom de métrique -> valeur scalaire.
pub type Metrics = BTreeMap<String, MetricValue>;

/// Payload reçu d'un agent, immuable une fois reçu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPayload {
    pub agent_id: String,
    pub location: String,
    pub agent_type: String,
    pub timestamp: String,
    pub metrics: Metrics,
}

/// Valeur scalaire d'une métrique.
///
/// Les entiers restent entiers pour que le JSON renvoyé par l'historique soit identique à
/// celui envoyé par le producteur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Flag(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetricValue {
    /// Valeur numérique si la métrique est un nombre. Les booléens ne sont pas numériques.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Integer(i) => Some(*i as f64),
            MetricValue::Float(f) => Some(*f),
            MetricValue::Flag(_) | MetricValue::Text(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Flag(b) => write!(f, "{b}"),
            MetricValue::Integer(i) => write!(f, "{i}"),
            MetricValue::Float(x) => write!(f, "{x}"),
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Float(value)
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Integer(value)
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Flag(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_producer_payload() {
        let raw = r#"{
            "agent_id": "a1",
            "location": "room1",
            "agent_type": "temperature-sensor",
            "timestamp": "2024-01-01T00:00:00Z",
            "metrics": {"temperature": 23, "cpu": 12.5, "status": "ok", "online": true}
        }"#;
        let payload: MetricPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.metrics["temperature"], MetricValue::Integer(23));
        assert_eq!(payload.metrics["cpu"], MetricValue::Float(12.5));
        assert_eq!(payload.metrics["status"], MetricValue::Text("ok".into()));
        assert_eq!(payload.metrics["online"], MetricValue::Flag(true));
    }

    #[test]
    fn test_integer_survives_json() {
        let mut metrics = Metrics::new();
        metrics.insert("connections".into(), MetricValue::Integer(42));
        let json = serde_json::to_string(&metrics).unwrap();
        assert_eq!(json, r#"{"connections":42}"#);
    }

    #[test]
    fn test_numeric_filter() {
        assert_eq!(MetricValue::Integer(3).as_f64(), Some(3.0));
        assert_eq!(MetricValue::Float(2.5).as_f64(), Some(2.5));
        assert!(!MetricValue::Flag(true).is_numeric());
        assert!(!MetricValue::Text("12".into()).is_numeric());
    }

    #[test]
    fn test_nested_value_rejected() {
        let raw = r#"{"agent_id":"a","location":"l","agent_type":"t","timestamp":"x","metrics":{"m":{"x":1}}}"#;
        assert!(serde_json::from_str::<MetricPayload>(raw).is_err());
    }
}
