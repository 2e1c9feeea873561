/**
 * PRÉSENCE - Agents actifs par type, sur une fenêtre de récence glissante
 *
 * Un bucket par agent_type (`active_agents:{type}`) : un set d'agent_id avec UNE seule
 * expiration pour tout le set, rafraîchie à chaque observation d'un agent de ce type.
 * Les agents n'expirent pas individuellement : une observation prolonge tout le bucket.
 */

use crate::store::{KeyedStore, StoreError};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PRESENCE_WINDOW: Duration = Duration::from_secs(300);

pub const DEFAULT_AGENT_TYPES: &[&str] = &["temperature-sensor", "humidity-sensor", "gateway"];

pub fn presence_key(agent_type: &str) -> String {
    format!("active_agents:{agent_type}")
}

pub struct PresenceTracker {
    store: Arc<dyn KeyedStore>,
    window: Duration,
    /// Types de la config : toujours rapportés, même à zéro.
    configured: BTreeSet<String>,
    /// Types vus hors config ; oubliés dès que leur bucket a expiré.
    observed: Mutex<BTreeSet<String>>,
}

impl PresenceTracker {
    pub fn new(store: Arc<dyn KeyedStore>, window: Duration) -> Self {
        Self {
            store,
            window,
            configured: DEFAULT_AGENT_TYPES.iter().map(|t| t.to_string()).collect(),
            observed: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn with_known_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.configured = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn known_types(&self) -> Vec<String> {
        let observed = self.observed.lock();
        self.configured.union(&observed).cloned().collect()
    }

    /// Ajoute l'agent au bucket de son type et repousse l'expiration du bucket entier.
    pub async fn observe(&self, agent_type: &str, agent_id: &str) -> Result<(), StoreError> {
        let key = presence_key(agent_type);
        self.store.sadd(&key, agent_id).await?;
        self.store.expire(&key, self.window).await?;
        if !self.configured.contains(agent_type) {
            self.observed.lock().insert(agent_type.to_string());
        }
        Ok(())
    }

    pub async fn active_agents(&self, agent_type: &str) -> Result<usize, StoreError> {
        self.store.scard(&presence_key(agent_type)).await
    }

    pub async fn list_active(&self, agent_type: &str) -> Result<BTreeSet<String>, StoreError> {
        self.store.smembers(&presence_key(agent_type)).await
    }

    /// Cardinalité courante de chaque type connu (pour les gauges). Les types observés
    /// dont le bucket a expiré sont oubliés et absents du résultat.
    pub async fn counts(&self) -> Result<BTreeMap<String, usize>, StoreError> {
        let mut counts = BTreeMap::new();
        let mut expired = Vec::new();
        for agent_type in self.known_types() {
            let count = self.active_agents(&agent_type).await?;
            if count == 0 && !self.configured.contains(&agent_type) {
                expired.push(agent_type);
            } else {
                counts.insert(agent_type, count);
            }
        }
        self.forget(expired);
        Ok(counts)
    }

    /// Agents actifs groupés par type connu.
    pub async fn snapshot(&self) -> Result<BTreeMap<String, BTreeSet<String>>, StoreError> {
        let mut agents = BTreeMap::new();
        let mut expired = Vec::new();
        for agent_type in self.known_types() {
            let members = self.list_active(&agent_type).await?;
            if members.is_empty() && !self.configured.contains(&agent_type) {
                expired.push(agent_type);
            } else {
                agents.insert(agent_type, members);
            }
        }
        self.forget(expired);
        Ok(agents)
    }

    fn forget(&self, expired: Vec<String>) {
        if expired.is_empty() {
            return;
        }
        let mut observed = self.observed.lock();
        for agent_type in expired {
            observed.remove(&agent_type);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn tracker() -> PresenceTracker {
        PresenceTracker::new(Arc::new(MemoryStore::new()), DEFAULT_PRESENCE_WINDOW)
    }

    #[tokio::test(start_paused = true)]
    async fn test_observe_then_expire() {
        let presence = tracker();
        presence.observe("gateway", "g1").await.unwrap();
        assert_eq!(presence.active_agents("gateway").await.unwrap(), 1);

        tokio::time::advance(DEFAULT_PRESENCE_WINDOW + Duration::from_secs(1)).await;
        assert_eq!(presence.active_agents("gateway").await.unwrap(), 0);
        assert!(presence.list_active("gateway").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bucket_shares_one_expiry() {
        let presence = tracker();
        presence.observe("temperature-sensor", "t1").await.unwrap();
        tokio::time::advance(Duration::from_secs(200)).await;
        presence.observe("temperature-sensor", "t2").await.unwrap();
        tokio::time::advance(Duration::from_secs(200)).await;

        // t1 n'a pas été revu depuis 400s mais reste actif : le bucket a été rafraîchi
        let active = presence.list_active("temperature-sensor").await.unwrap();
        assert_eq!(active.into_iter().collect::<Vec<_>>(), vec!["t1", "t2"]);

        tokio::time::advance(Duration::from_secs(101)).await;
        assert_eq!(presence.active_agents("temperature-sensor").await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_buckets_independent_per_type() {
        let presence = tracker();
        presence.observe("gateway", "g1").await.unwrap();
        tokio::time::advance(Duration::from_secs(250)).await;
        presence.observe("humidity-sensor", "h1").await.unwrap();
        tokio::time::advance(Duration::from_secs(100)).await;

        let counts = presence.counts().await.unwrap();
        assert_eq!(counts["gateway"], 0);
        assert_eq!(counts["humidity-sensor"], 1);
        assert_eq!(counts["temperature-sensor"], 0);
    }

    #[tokio::test]
    async fn test_observed_types_become_known() {
        let presence = tracker().with_known_types(["gateway"]);
        presence.observe("pressure-sensor", "p1").await.unwrap();
        assert_eq!(presence.known_types(), vec!["gateway", "pressure-sensor"]);

        let snapshot = presence.snapshot().await.unwrap();
        assert!(snapshot["pressure-sensor"].contains("p1"));
        assert!(snapshot["gateway"].is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_observed_types_are_forgotten() {
        let presence = tracker().with_known_types(["gateway"]);
        for i in 0..50 {
            presence.observe(&format!("sensor-v{i}"), "x").await.unwrap();
        }
        assert_eq!(presence.known_types().len(), 51);
        assert_eq!(presence.counts().await.unwrap().len(), 51);

        tokio::time::advance(DEFAULT_PRESENCE_WINDOW + Duration::from_secs(1)).await;
        presence.observe("sensor-v7", "y").await.unwrap();

        let counts = presence.counts().await.unwrap();
        assert_eq!(counts.keys().collect::<Vec<_>>(), vec!["gateway", "sensor-v7"]);
        assert_eq!(counts["gateway"], 0);
        assert_eq!(presence.known_types(), vec!["gateway", "sensor-v7"]);
    }
}
