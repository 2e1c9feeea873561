/**
 * ENRICHISSEMENT - Métadonnées de classification et métriques dérivées
 *
 * - Couche topologique (edge / fog / unknown) via une table extensible
 * - Bloc `processing` (processed_at, pipeline_version)
 * - Conversion Fahrenheit des métriques de température
 *
 * L'entrée normalisée n'est jamais modifiée : on construit un nouvel enregistrement dont
 * les métriques sont un sur-ensemble des métriques normalisées.
 */

use crate::normalize::{NormalizedRecord, Source};
use crate::payload::{MetricValue, Metrics};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const PIPELINE_VERSION: &str = "1.0.0";

const TEMPERATURE_MARKER: &str = "temperature";
const FAHRENHEIT_SUFFIX: &str = "_fahrenheit";

const DEFAULT_LAYERS: &[(&str, Layer)] = &[
    ("temperature-sensor", Layer::Edge),
    ("humidity-sensor", Layer::Edge),
    ("gateway", Layer::Fog),
];

/// Couche topologique d'un type d'agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Edge,
    Fog,
    Unknown,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Edge => "edge",
            Layer::Fog => "fog",
            Layer::Unknown => "unknown",
        }
    }
}

/// Table agent_type -> couche. Les types absents tombent sur `Layer::Unknown`.
#[derive(Debug, Clone)]
pub struct LayerTable {
    entries: HashMap<String, Layer>,
}

impl LayerTable {
    pub fn classify(&self, agent_type: &str) -> Layer {
        self.entries.get(agent_type).copied().unwrap_or(Layer::Unknown)
    }

    /// Ajoute ou remplace une entrée (nouveaux types d'agents venant de la config).
    pub fn with_entry(mut self, agent_type: impl Into<String>, layer: Layer) -> Self {
        self.entries.insert(agent_type.into(), layer);
        self
    }
}

impl Default for LayerTable {
    fn default() -> Self {
        Self {
            entries: DEFAULT_LAYERS
                .iter()
                .map(|(agent_type, layer)| (agent_type.to_string(), *layer))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedSource {
    #[serde(flatten)]
    pub source: Source,
    pub layer: Layer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Processing {
    pub processed_at: String,
    pub pipeline_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub source: EnrichedSource,
    pub timestamp: String,
    pub processing: Processing,
    pub metrics: Metrics,
}

#[derive(Debug, Clone)]
pub struct Enricher {
    layers: LayerTable,
    pipeline_version: String,
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new(LayerTable::default(), PIPELINE_VERSION)
    }
}

impl Enricher {
    pub fn new(layers: LayerTable, pipeline_version: impl Into<String>) -> Self {
        Self {
            layers,
            pipeline_version: pipeline_version.into(),
        }
    }

    pub fn pipeline_version(&self) -> &str {
        &self.pipeline_version
    }

    pub fn enrich(&self, normalized: &NormalizedRecord) -> EnrichedRecord {
        self.enrich_at(normalized, Utc::now())
    }

    /// Variante à horloge explicite de `enrich`.
    pub fn enrich_at(&self, normalized: &NormalizedRecord, now: DateTime<Utc>) -> EnrichedRecord {
        let mut metrics = normalized.metrics.clone();

        // Gate volontairement grossier : on cherche le mot dans tout le mapping (clés et
        // valeurs), pas clé par clé.
        if mentions_temperature(&normalized.metrics) {
            for (key, value) in &normalized.metrics {
                let Some(celsius) = value.as_f64() else { continue };
                if !key.contains(TEMPERATURE_MARKER) {
                    continue;
                }
                let derived = format!("{key}{FAHRENHEIT_SUFFIX}");
                // jamais d'écrasement d'une métrique existante
                metrics
                    .entry(derived)
                    .or_insert(MetricValue::Float(to_fahrenheit(celsius)));
            }
        }

        EnrichedRecord {
            source: EnrichedSource {
                source: normalized.source.clone(),
                layer: self.layers.classify(&normalized.source.agent_type),
            },
            timestamp: normalized.timestamp.clone(),
            processing: Processing {
                processed_at: now.to_rfc3339_opts(SecondsFormat::Micros, true),
                pipeline_version: self.pipeline_version.clone(),
            },
            metrics,
        }
    }
}

fn mentions_temperature(metrics: &Metrics) -> bool {
    metrics.iter().any(|(key, value)| {
        key.contains(TEMPERATURE_MARKER) || value.to_string().contains(TEMPERATURE_MARKER)
    })
}

/// `celsius * 9/5 + 32`, arrondi à 2 décimales.
pub fn to_fahrenheit(celsius: f64) -> f64 {
    round_2dp(celsius * 9.0 / 5.0 + 32.0)
}

/// Arrondi à 2 décimales sur la valeur binaire exacte, égalités au pair
/// (0.125 -> 0.12, 0.375 -> 0.38), comme le formatage décimal `{:.2}`.
pub fn round_2dp(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{value:.2}").parse().unwrap_or(value)
}
