//! Redis-backed governance store.
//!
//! Lets several application instances share rate limit counters and
//! idempotency entries.
//!
//! ## Architecture
//!
//! - Keys: the governance key layout with a configurable prefix (`sms:` by default)
//! - Values: plain integers, so counters can use `INCR`
//! - Expiry: absolute, via `EXPIREAT` / `SET ... EXAT`; Redis drops expired
//!   keys itself, so [`purge_expired`](GovernanceStore::purge_expired) is a no-op
//!
//! Atomicity per key comes from Redis itself: `INCR` and its `EXPIREAT` run in
//! one `MULTI` pipeline, and insert-if-absent is a single `SET NX`.
//!
//! `EXAT` requires Redis 6.2 or later.
//!
//! ## Error Handling
//!
//! Every Redis failure is returned as [`StoreError::Backend`]. The send path
//! turns it into a `ClientError`, rejecting the request.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sms_guard::{RedisStore, RedisStoreConfig, SendOrchestrator};
//! use std::sync::Arc;
//!
//! let store = RedisStore::connect_with_config(
//!     "redis://127.0.0.1/",
//!     RedisStoreConfig { key_prefix: "sms:".to_string() },
//! )
//! .await?;
//!
//! let orchestrator = SendOrchestrator::builder(registry, dispatcher)
//!     .with_store(Arc::new(store))
//!     .build();
//! ```

use crate::application::ports::{GovernanceStore, StoreError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use std::fmt;

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        StoreError::backend(err)
    }
}

/// Configuration for Redis storage.
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Key prefix for Redis keys (default: "sms:")
    pub key_prefix: String,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: "sms:".to_string(),
        }
    }
}

/// Redis-backed store for distributed governance state.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    config: RedisStoreConfig,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to Redis with default configuration.
    ///
    /// # Errors
    /// Returns error if connection fails.
    pub async fn connect(url: &str) -> Result<Self, RedisError> {
        Self::connect_with_config(url, RedisStoreConfig::default()).await
    }

    /// Connect to Redis with custom configuration.
    ///
    /// # Errors
    /// Returns error if connection fails.
    pub async fn connect_with_config(
        url: &str,
        config: RedisStoreConfig,
    ) -> Result<Self, RedisError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        Ok(Self { connection, config })
    }

    pub fn config(&self) -> &RedisStoreConfig {
        &self.config
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }
}

fn parse_value(raw: Option<String>) -> Result<Option<i64>, StoreError> {
    raw.map(|value| value.parse::<i64>().map_err(|_| StoreError::CorruptValue))
        .transpose()
}

#[async_trait]
impl GovernanceStore for RedisStore {
    async fn get(&self, key: &str, _now: i64) -> Result<Option<i64>, StoreError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await?;
        parse_value(raw)
    }

    async fn put_with_expiry(
        &self,
        key: &str,
        value: i64,
        expires_at: i64,
        _now: i64,
    ) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("SET")
            .arg(self.key(key))
            .arg(value)
            .arg("EXAT")
            .arg(expires_at)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn increment_with_expiry(
        &self,
        key: &str,
        expires_at: i64,
        _now: i64,
    ) -> Result<i64, StoreError> {
        let key = self.key(key);
        let mut conn = self.connection.clone();

        // Callers derive expires_at from the bucket, so it is the same on every call.
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(&key)
            .cmd("EXPIREAT")
            .arg(&key)
            .arg(expires_at)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn insert_if_absent_with_expiry(
        &self,
        key: &str,
        value: i64,
        expires_at: i64,
        _now: i64,
    ) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key(key))
            .arg(value)
            .arg("NX")
            .arg("EXAT")
            .arg(expires_at)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self, _now: i64) -> Result<usize, StoreError> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefix() {
        assert_eq!(RedisStoreConfig::default().key_prefix, "sms:");
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value(None).unwrap(), None);
        assert_eq!(parse_value(Some("42".to_string())).unwrap(), Some(42));
        assert!(matches!(
            parse_value(Some("x".to_string())),
            Err(StoreError::CorruptValue)
        ));
    }
}
