//! Redis member store
//!
//! Uses `redis::aio::ConnectionManager` for async multiplexed connections.
//! Requires the `redis-store` feature flag.

use crate::config::loader::redact_url;
use crate::constants::MAX_MEMBER_TTL_SECONDS;
use crate::store::errors::{StoreError, StoreResult};
use crate::store::traits::{MemberRemoval, MemberStore};
use std::time::Duration;
use tracing::debug;

/// Redis-backed member sets
///
/// Membership changes run inside `MULTI`/`EXEC` so the cardinality read and
/// the mutation cannot interleave with another worker's removal.
#[derive(Clone)]
pub struct RedisMemberStore {
    connection_manager: redis::aio::ConnectionManager,
}

impl std::fmt::Debug for RedisMemberStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisMemberStore")
            .field("connection_manager", &"ConnectionManager")
            .finish()
    }
}

impl RedisMemberStore {
    /// Connect to the Redis server at `url`
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            StoreError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let connection_manager = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| {
                StoreError::ConnectionError(format!("Failed to connect to Redis: {}", e))
            })?;

        debug!(url = %redact_url(url), "Redis member store connected");

        Ok(Self { connection_manager })
    }
}

fn backend_error(command: &str, error: redis::RedisError) -> StoreError {
    if error.is_connection_dropped() || error.is_connection_refusal() || error.is_timeout() {
        StoreError::ConnectionError(format!("Redis {command} failed: {error}"))
    } else {
        StoreError::BackendError(format!("Redis {command} failed: {error}"))
    }
}

impl MemberStore for RedisMemberStore {
    async fn add_member(&self, key: &str, token: &str, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.connection_manager.clone();
        let ttl_seconds = ttl.as_secs().clamp(1, MAX_MEMBER_TTL_SECONDS);

        redis::pipe()
            .atomic()
            .cmd("SADD")
            .arg(key)
            .arg(token)
            .ignore()
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl_seconds)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| backend_error("SADD/EXPIRE", e))?;

        debug!(key = key, token = token, ttl_seconds = ttl_seconds, "Member SADD");
        Ok(())
    }

    async fn remove_member(&self, key: &str, token: &str) -> StoreResult<MemberRemoval> {
        let mut conn = self.connection_manager.clone();

        let (before, removed): (u64, u64) = redis::pipe()
            .atomic()
            .cmd("SCARD")
            .arg(key)
            .cmd("SREM")
            .arg(key)
            .arg(token)
            .query_async(&mut conn)
            .await
            .map_err(|e| backend_error("SCARD/SREM", e))?;

        let removal = MemberRemoval {
            removed: removed > 0,
            remaining: before.saturating_sub(removed),
        };

        debug!(key = key, token = token, removed = removal.removed, remaining = removal.remaining, "Member SREM");
        Ok(removal)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.connection_manager.clone();

        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| backend_error("DEL", e))?;

        debug!(key = key, "Member set DEL");
        Ok(())
    }

    async fn member_count(&self, key: &str) -> StoreResult<u64> {
        let mut conn = self.connection_manager.clone();

        redis::cmd("SCARD")
            .arg(key)
            .query_async::<u64>(&mut conn)
            .await
            .map_err(|e| backend_error("SCARD", e))
    }

    async fn health_check(&self) -> StoreResult<bool> {
        let mut conn = self.connection_manager.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| backend_error("PING", e))?;

        Ok(pong == "PONG")
    }

    fn provider_name(&self) -> &'static str {
        "redis"
    }

    fn is_distributed(&self) -> bool {
        true
    }
}

// Integration tests require a running Redis instance (behind test-services feature)
#[cfg(all(test, feature = "test-services"))]
mod tests {
    use super::*;
    use tracing::warn;

    async fn connect() -> Option<RedisMemberStore> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        match RedisMemberStore::connect(&url).await {
            Ok(store) => Some(store),
            Err(e) => {
                warn!("Skipping Redis test (not available): {}", e);
                None
            }
        }
    }

    #[tokio::test]
    async fn test_redis_membership_cycle() {
        let Some(store) = connect().await else {
            return;
        };
        let key = format!("test:batch:{}", uuid::Uuid::new_v4());
        let ttl = Duration::from_secs(60);

        store.add_member(&key, "batch_x", ttl).await.unwrap();
        store.add_member(&key, "job_1", ttl).await.unwrap();
        store.add_member(&key, "job_1", ttl).await.unwrap();
        assert_eq!(store.member_count(&key).await.unwrap(), 2);

        let first = store.remove_member(&key, "job_1").await.unwrap();
        assert_eq!(first, MemberRemoval { removed: true, remaining: 1 });

        let last = store.remove_member(&key, "batch_x").await.unwrap();
        assert!(last.completes_batch());

        store.delete(&key).await.unwrap();
        assert_eq!(store.member_count(&key).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_redis_health_check() {
        let Some(store) = connect().await else {
            return;
        };
        assert!(store.health_check().await.unwrap());
    }
}
