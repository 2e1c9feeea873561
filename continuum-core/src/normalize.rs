//! Normalisation : forme canonique avec des clés de métriques préfixées par le type d'agent.

use crate::payload::{MetricPayload, Metrics};
use serde::{Deserialize, Serialize};

/// Identité de la source d'un enregistrement normalisé.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub agent_id: String,
    pub location: String,
    #[serde(rename = "type")]
    pub agent_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub source: Source,
    pub timestamp: String,
    pub metrics: Metrics,
}

/// Clé canonique : `lower(agent_type + "_" + key)` avec chaque `-` remplacé par `_`.
///
/// Aucun cas particulier pour un type vide ou inconnu : le préfixe est concaténé tel quel.
pub fn metric_key(agent_type: &str, key: &str) -> String {
    format!("{agent_type}_{key}").to_lowercase().replace('-', "_")
}

/// Fonction pure : deux appels sur le même payload donnent une sortie identique.
/// En cas de collision de clés, la dernière écriture gagne.
pub fn normalize(payload: &MetricPayload) -> NormalizedRecord {
    let metrics = payload
        .metrics
        .iter()
        .map(|(key, value)| (metric_key(&payload.agent_type, key), value.clone()))
        .collect();

    NormalizedRecord {
        source: Source {
            agent_id: payload.agent_id.clone(),
            location: payload.location.clone(),
            agent_type: payload.agent_type.clone(),
        },
        timestamp: payload.timestamp.clone(),
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::MetricValue;

    fn gateway_payload() -> MetricPayload {
        let mut metrics = Metrics::new();
        metrics.insert("cpu_usage".into(), MetricValue::Float(42.5));
        metrics.insert("memory-mb".into(), MetricValue::Float(512.0));
        metrics.insert("connections".into(), MetricValue::Integer(12));
        MetricPayload {
            agent_id: "g1".into(),
            location: "rack-2".into(),
            agent_type: "gateway".into(),
            timestamp: "2024-01-01T00:00:00Z".into(),
            metrics,
        }
    }

    #[test]
    fn test_metric_key() {
        assert_eq!(metric_key("temperature-sensor", "temperature"), "temperature_sensor_temperature");
        assert_eq!(metric_key("Gateway", "CPU-Usage"), "gateway_cpu_usage");
        assert_eq!(metric_key("", "humidity"), "_humidity");
    }

    #[test]
    fn test_normalize_prefixes_every_metric() {
        let record = normalize(&gateway_payload());
        assert_eq!(record.source.agent_type, "gateway");
        assert_eq!(record.timestamp, "2024-01-01T00:00:00Z");
        let keys: Vec<_> = record.metrics.keys().cloned().collect();
        assert_eq!(keys, vec!["gateway_connections", "gateway_cpu_usage", "gateway_memory_mb"]);
        assert_eq!(record.metrics["gateway_connections"], MetricValue::Integer(12));
    }

    #[test]
    fn test_normalize_is_pure() {
        let payload = gateway_payload();
        let first = serde_json::to_vec(&normalize(&payload)).unwrap();
        let second = serde_json::to_vec(&normalize(&payload)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_colliding_keys_collapse() {
        let mut payload = gateway_payload();
        payload.metrics.clear();
        payload.metrics.insert("Mem-MB".into(), MetricValue::Integer(1));
        payload.metrics.insert("mem_mb".into(), MetricValue::Integer(2));
        let record = normalize(&payload);
        assert_eq!(record.metrics.len(), 1);
        assert!(record.metrics.contains_key("gateway_mem_mb"));
    }

    #[test]
    fn test_source_serializes_type_field() {
        let json = serde_json::to_value(normalize(&gateway_payload())).unwrap();
        assert_eq!(json["source"]["type"], "gateway");
    }
}
