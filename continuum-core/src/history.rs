/**
 * HISTORIQUE RÉCENT - Index borné des derniers payloads par agent
 *
 * - payload bufferisé sous `metrics:{agent_id}:{timestamp}` avec un TTL absolu (1h)
 * - index `agent_history:{agent_id}` : liste des clés, la plus récente en tête, 100 max
 *
 * L'appartenance à l'index et l'existence de l'entrée bufferisée ont des durées de vie
 * indépendantes : une clé sortie de l'index vit jusqu'à son TTL, une clé encore indexée
 * peut pointer vers une entrée expirée (ignorée à la lecture).
 */

use crate::payload::MetricPayload;
use crate::store::{KeyedStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_HISTORY_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

pub fn buffer_key(agent_id: &str, timestamp: &str) -> String {
    format!("metrics:{agent_id}:{timestamp}")
}

pub fn history_key(agent_id: &str) -> String {
    format!("agent_history:{agent_id}")
}

pub struct HistoryRing {
    store: Arc<dyn KeyedStore>,
    ttl: Duration,
    capacity: usize,
}

impl HistoryRing {
    pub fn new(store: Arc<dyn KeyedStore>, ttl: Duration, capacity: usize) -> Self {
        Self { store, ttl, capacity: capacity.max(1) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bufferise le payload puis l'indexe en tête de l'historique de l'agent.
    /// Renvoie la clé du buffer.
    pub async fn record(&self, payload: &MetricPayload) -> Result<String, StoreError> {
        let key = buffer_key(&payload.agent_id, &payload.timestamp);
        let body = serde_json::to_string(payload).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.store.set_ex(&key, &body, self.ttl).await?;

        let index = history_key(&payload.agent_id);
        self.store.lpush(&index, &key).await?;
        self.store.ltrim(&index, 0, self.capacity as isize - 1).await?;
        Ok(key)
    }

    /// Clés indexées pour l'agent, la plus récente en tête.
    pub async fn keys(&self, agent_id: &str) -> Result<Vec<String>, StoreError> {
        self.store.lrange(&history_key(agent_id), 0, -1).await
    }

    /// Jusqu'à `limit` payloads, du plus récent au plus ancien. Les entrées expirées ou
    /// illisibles sont ignorées silencieusement.
    pub async fn history(&self, agent_id: &str, limit: usize) -> Result<Vec<MetricPayload>, StoreError> {
        let limit = limit.min(self.capacity);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let keys = self.store.lrange(&history_key(agent_id), 0, limit as isize - 1).await?;
        let mut payloads = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(body) = self.store.get(&key).await? else { continue };
            match serde_json::from_str::<MetricPayload>(&body) {
                Ok(payload) => payloads.push(payload),
                Err(e) => warn!("skipping unreadable history entry {key}: {e}"),
            }
        }
        Ok(payloads)
    }
}
