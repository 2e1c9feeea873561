//! Keyed store en mémoire avec la sémantique Redis utile à la passerelle.
//!
//! Les expirations suivent `tokio::time::Instant`, ce qui permet aux tests d'avancer
//! l'horloge (`tokio::time::pause`) sans attendre.
//!
//! Une clé expirée est retirée dès qu'on la touche ; les autres sont balayées au plus
//! tard `SWEEP_INTERVAL` après leur expiration, à la prochaine opération sur le store.

use super::{resolve_range, KeyedStore, StoreError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    List(VecDeque<String>),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| now < deadline)
    }
}

#[derive(Default)]
struct Table {
    slots: HashMap<String, Slot>,
    next_sweep: Option<Instant>,
}

impl Table {
    /// Balaye toutes les clés expirées si le dernier balayage date de plus de `SWEEP_INTERVAL`.
    fn sweep_if_due(&mut self, now: Instant) {
        if self.next_sweep.is_some_and(|at| now < at) {
            return;
        }
        self.slots.retain(|_, slot| slot.is_live(now));
        self.next_sweep = Some(now + SWEEP_INTERVAL);
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    table: Arc<Mutex<Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nombre de clés encore vivantes.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.table.lock().slots.values().filter(|slot| slot.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.table.lock().slots.get(key).is_some_and(|slot| slot.is_live(now))
    }

    /// Clés réellement détenues, expirées mais pas encore balayées comprises.
    pub fn held(&self) -> usize {
        self.table.lock().slots.len()
    }

    /// Exécute `f` sur la table après purge de `key` si elle a expiré.
    fn with_key<R>(&self, key: &str, f: impl FnOnce(&mut HashMap<String, Slot>) -> R) -> R {
        let now = Instant::now();
        let mut table = self.table.lock();
        table.sweep_if_due(now);
        if table.slots.get(key).is_some_and(|slot| !slot.is_live(now)) {
            table.slots.remove(key);
        }
        f(&mut table.slots)
    }
}

#[async_trait]
impl KeyedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_key(key, |slots| match slots.get(key) {
            None => Ok(None),
            Some(Slot { value: Value::Text(text), .. }) => Ok(Some(text.clone())),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        })
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let slot = Slot {
            value: Value::Text(value.to_string()),
            expires_at: Some(Instant::now() + ttl),
        };
        self.with_key(key, |slots| slots.insert(key.to_string(), slot));
        Ok(())
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        self.with_key(key, |slots| {
            let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
                value: Value::List(VecDeque::new()),
                expires_at: None,
            });
            match &mut slot.value {
                Value::List(list) => {
                    list.push_front(value.to_string());
                    Ok(list.len())
                }
                _ => Err(StoreError::WrongType(key.to_string())),
            }
        })
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), StoreError> {
        self.with_key(key, |slots| {
            let Some(slot) = slots.get_mut(key) else { return Ok(()) };
            let Value::List(list) = &mut slot.value else {
                return Err(StoreError::WrongType(key.to_string()));
            };
            match resolve_range(list.len(), start, stop) {
                Some((from, to)) => {
                    list.truncate(to);
                    list.drain(..from);
                }
                None => list.clear(),
            }
            if list.is_empty() {
                slots.remove(key);
            }
            Ok(())
        })
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StoreError> {
        self.with_key(key, |slots| match slots.get(key) {
            None => Ok(Vec::new()),
            Some(Slot { value: Value::List(list), .. }) => Ok(resolve_range(list.len(), start, stop)
                .map(|(from, to)| list.range(from..to).cloned().collect())
                .unwrap_or_default()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        })
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.with_key(key, |slots| {
            let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
                value: Value::Set(BTreeSet::new()),
                expires_at: None,
            });
            match &mut slot.value {
                Value::Set(set) => Ok(set.insert(member.to_string())),
                _ => Err(StoreError::WrongType(key.to_string())),
            }
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.with_key(key, |slots| match slots.get_mut(key) {
            Some(slot) => {
                slot.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        })
    }

    async fn scard(&self, key: &str) -> Result<usize, StoreError> {
        self.smembers(key).await.map(|members| members.len())
    }

    async fn smembers(&self, key: &str) -> Result<BTreeSet<String>, StoreError> {
        self.with_key(key, |slots| match slots.get(key) {
            None => Ok(BTreeSet::new()),
            Some(Slot { value: Value::Set(set), .. }) => Ok(set.clone()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_set_ex_expires() {
        let store = MemoryStore::new();
        store.set_ex("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_untouched_expired_keys_are_swept() {
        let store = MemoryStore::new();
        for i in 0..1000 {
            store
                .set_ex(&format!("metrics:a1:{i}"), "{}", Duration::from_secs(3600))
                .await
                .unwrap();
        }
        assert_eq!(store.held(), 1000);

        tokio::time::advance(Duration::from_secs(7200)).await;
        store.set_ex("metrics:a1:fresh", "{}", Duration::from_secs(3600)).await.unwrap();

        assert_eq!(store.held(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_live_and_persistent_keys() {
        let store = MemoryStore::new();
        store.set_ex("short", "v", Duration::from_secs(10)).await.unwrap();
        store.set_ex("long", "v", Duration::from_secs(600)).await.unwrap();
        store.lpush("index", "short").await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        store.lrange("index", 0, -1).await.unwrap();

        assert_eq!(store.held(), 2);
        assert!(store.contains_key("long"));
        assert!(store.contains_key("index"));
    }

    #[tokio::test]
    async fn test_list_push_trim_range() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.lpush("l", &i.to_string()).await.unwrap();
        }
        assert_eq!(store.lrange("l", 0, 1).await.unwrap(), vec!["4", "3"]);

        store.ltrim("l", 0, 2).await.unwrap();
        assert_eq!(store.lrange("l", 0, -1).await.unwrap(), vec!["4", "3", "2"]);

        store.ltrim("l", 5, 9).await.unwrap();
        assert!(!store.contains_key("l"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_expiry_refresh() {
        let store = MemoryStore::new();
        store.sadd("s", "a").await.unwrap();
        assert!(store.expire("s", Duration::from_secs(5)).await.unwrap());

        tokio::time::advance(Duration::from_secs(4)).await;
        store.sadd("s", "b").await.unwrap();
        store.expire("s", Duration::from_secs(5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(store.scard("s").await.unwrap(), 2);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.scard("s").await.unwrap(), 0);
        assert!(!store.expire("s", Duration::from_secs(5)).await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let store = MemoryStore::new();
        store.sadd("s", "a").await.unwrap();
        assert!(matches!(store.get("s").await, Err(StoreError::WrongType(_))));
        assert!(matches!(store.lpush("s", "x").await, Err(StoreError::WrongType(_))));
    }
}
