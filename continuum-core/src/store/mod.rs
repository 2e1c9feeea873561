/**
 * KEYED STORE - Capacité de stockage court terme (buffer, présence, historique)
 *
 * RÔLE : Abstraction minimale du sous-ensemble Redis dont la passerelle a besoin :
 * get / set-with-expiry, push/trim/range de listes, add/members/card/expire de sets.
 *
 * IMPLÉMENTATIONS :
 * - MemoryStore : en mémoire, TTL sur l'horloge tokio (utilisée en dev et en tests)
 * - RedisStore : connexion Redis multiplexée, chaque commande bornée par un timeout
 *
 * Aucune transaction inter-payload : chaque unité de travail applique sa séquence
 * documentée, les lectures qui suivent peuvent être légèrement périmées.
 */

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;

/// Erreurs possibles lors des opérations sur le keyed store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unavailable(String),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("wrong type for key {0}")]
    WrongType(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait KeyedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Écrit une valeur avec une expiration absolue.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Pousse en tête de liste, renvoie la nouvelle longueur.
    async fn lpush(&self, key: &str, value: &str) -> Result<usize, StoreError>;

    /// Ne garde que `[start, stop]` (indices inclusifs, négatifs depuis la fin).
    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), StoreError>;

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StoreError>;

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Pose une expiration sur une clé existante. `false` si la clé n'existe pas.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    async fn scard(&self, key: &str) -> Result<usize, StoreError>;

    async fn smembers(&self, key: &str) -> Result<BTreeSet<String>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Résout une plage inclusive façon Redis en bornes `[from, to)` sur une liste de `len`.
pub(crate) fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve_range(5, 0, 2), Some((0, 3)));
        assert_eq!(resolve_range(5, 0, 99), Some((0, 5)));
        assert_eq!(resolve_range(5, 0, -1), Some((0, 5)));
        assert_eq!(resolve_range(5, -2, -1), Some((3, 5)));
        assert_eq!(resolve_range(5, 4, 2), None);
        assert_eq!(resolve_range(5, 7, 9), None);
        assert_eq!(resolve_range(0, 0, -1), None);
        assert_eq!(resolve_range(3, -10, 0), Some((0, 1)));
    }
}
