use continuum_core::{Layer, LayerTable};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path, time::Duration};
use tokio::fs;
use tracing::warn;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ProcessorConfig {
    pub listen_addr: String,
    pub pushgateway_url: String,
    pub push_timeout_secs: u64,
    pub pipeline_version: String,
    /// Types d'agents supplémentaires -> couche (fusionnés sur la table fixe)
    pub layers: BTreeMap<String, Layer>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8001".into(),
            pushgateway_url: "http://pushgateway:9091".into(),
            push_timeout_secs: 5,
            pipeline_version: continuum_core::enrich::PIPELINE_VERSION.into(),
            layers: BTreeMap::new(),
        }
    }
}

impl ProcessorConfig {
    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs)
    }

    pub fn layer_table(&self) -> LayerTable {
        self.layers
            .iter()
            .fold(LayerTable::default(), |table, (agent_type, layer)| table.with_entry(agent_type.clone(), *layer))
    }

    fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var("PUSHGATEWAY_URL") {
            self.pushgateway_url = url;
        }
        if let Ok(addr) = std::env::var("LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        self
    }
}

pub fn parse_config(txt: &str) -> ProcessorConfig {
    if txt.trim().is_empty() {
        return ProcessorConfig::default();
    }
    serde_yaml::from_str(txt).unwrap_or_else(|e| {
        warn!("invalid processor config: {e}");
        ProcessorConfig::default()
    })
}

pub async fn load_config() -> ProcessorConfig {
    let path = std::env::var("CONTINUUM_PROCESSOR_CONFIG").unwrap_or_else(|_| "processor.yaml".into());
    let cfg = if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        parse_config(&txt)
    } else {
        warn!("no {path}, using default processor config");
        ProcessorConfig::default()
    };
    cfg.apply_env()
}
