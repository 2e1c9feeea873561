//! Adaptateur Redis du keyed store.

use super::{KeyedStore, StoreError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

/// Connexion Redis partagée ; chaque commande est bornée par `op_timeout`.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    op_timeout: Duration,
}

impl RedisStore {
    pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(from_redis)?;
        let conn = tokio::time::timeout(op_timeout, client.get_connection_manager())
            .await
            .map_err(|_| StoreError::Timeout(op_timeout))?
            .map_err(from_redis)?;
        tracing::info!("connected to redis at {url}");
        Ok(Self { conn, op_timeout })
    }

    async fn run<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        tokio::time::timeout(self.op_timeout, op(self.conn.clone()))
            .await
            .map_err(|_| StoreError::Timeout(self.op_timeout))?
            .map_err(from_redis)
    }
}

fn from_redis(err: redis::RedisError) -> StoreError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        StoreError::Unavailable(err.to_string())
    } else if err.kind() == redis::ErrorKind::TypeError {
        StoreError::WrongType(err.to_string())
    } else {
        StoreError::Backend(err.to_string())
    }
}

#[async_trait]
impl KeyedStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.run(|mut conn| async move { conn.get(key).await }).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.run(|mut conn| async move { conn.set_ex(key, value, ttl.as_secs()).await })
            .await
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        self.run(|mut conn| async move { conn.lpush(key, value).await }).await
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), StoreError> {
        self.run(|mut conn| async move { conn.ltrim(key, start, stop).await })
            .await
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StoreError> {
        self.run(|mut conn| async move { conn.lrange(key, start, stop).await })
            .await
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.run(|mut conn| async move { conn.sadd(key, member).await }).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let secs = ttl.as_secs() as i64;
        self.run(|mut conn| async move { conn.expire(key, secs).await }).await
    }

    async fn scard(&self, key: &str) -> Result<usize, StoreError> {
        self.run(|mut conn| async move { conn.scard(key).await }).await
    }

    async fn smembers(&self, key: &str) -> Result<BTreeSet<String>, StoreError> {
        self.run(|mut conn| async move { conn.smembers(key).await }).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.run(|mut conn| async move { redis::cmd("PING").query_async::<String>(&mut conn).await })
            .await
            .map(|_| ())
    }
}
