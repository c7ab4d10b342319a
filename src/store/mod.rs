//! # Shared Counter Store
//!
//! Tracks, per batch id, the set of outstanding member tokens.
//!
//! ## Architecture
//!
//! ```text
//! CounterStore                      <- namespace + TTL, builds keys
//!   └── StoreBackend (enum)
//!         ├── Redis(RedisMemberStore)         <- MULTI SADD/EXPIRE, MULTI SCARD/SREM
//!         ├── Memory(InMemoryMemberStore)     <- DashMap, process-local
//!         └── Unavailable(UnavailableMemberStore) <- startup connection failed
//! ```
//!
//! Members are set elements rather than a raw integer, so duplicate adds of
//! the same token do not inflate the count.

pub mod errors;
pub mod providers;
pub mod traits;

pub use errors::{StoreError, StoreResult};
pub use providers::{InMemoryMemberStore, UnavailableMemberStore};
pub use traits::{MemberRemoval, MemberStore};

#[cfg(feature = "redis-store")]
pub use providers::RedisMemberStore;

use crate::config::{StoreBackend as BackendKind, StoreConfig};
use crate::constants::{DEFAULT_MEMBER_TTL_SECONDS, DEFAULT_NAMESPACE};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
enum StoreBackend {
    #[cfg(feature = "redis-store")]
    Redis(Box<RedisMemberStore>),
    Memory(InMemoryMemberStore),
    Unavailable(UnavailableMemberStore),
}

impl StoreBackend {
    fn provider_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "redis-store")]
            Self::Redis(s) => s.provider_name(),
            Self::Memory(s) => s.provider_name(),
            Self::Unavailable(s) => s.provider_name(),
        }
    }

    fn is_distributed(&self) -> bool {
        match self {
            #[cfg(feature = "redis-store")]
            Self::Redis(s) => s.is_distributed(),
            Self::Memory(s) => s.is_distributed(),
            Self::Unavailable(s) => s.is_distributed(),
        }
    }

    async fn add_member(&self, key: &str, token: &str, ttl: Duration) -> StoreResult<()> {
        match self {
            #[cfg(feature = "redis-store")]
            Self::Redis(s) => s.add_member(key, token, ttl).await,
            Self::Memory(s) => s.add_member(key, token, ttl).await,
            Self::Unavailable(s) => s.add_member(key, token, ttl).await,
        }
    }

    async fn remove_member(&self, key: &str, token: &str) -> StoreResult<MemberRemoval> {
        match self {
            #[cfg(feature = "redis-store")]
            Self::Redis(s) => s.remove_member(key, token).await,
            Self::Memory(s) => s.remove_member(key, token).await,
            Self::Unavailable(s) => s.remove_member(key, token).await,
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        match self {
            #[cfg(feature = "redis-store")]
            Self::Redis(s) => s.delete(key).await,
            Self::Memory(s) => s.delete(key).await,
            Self::Unavailable(s) => s.delete(key).await,
        }
    }

    async fn member_count(&self, key: &str) -> StoreResult<u64> {
        match self {
            #[cfg(feature = "redis-store")]
            Self::Redis(s) => s.member_count(key).await,
            Self::Memory(s) => s.member_count(key).await,
            Self::Unavailable(s) => s.member_count(key).await,
        }
    }

    async fn health_check(&self) -> StoreResult<bool> {
        match self {
            #[cfg(feature = "redis-store")]
            Self::Redis(s) => s.health_check().await,
            Self::Memory(s) => s.health_check().await,
            Self::Unavailable(s) => s.health_check().await,
        }
    }
}

/// Batch-keyed facade over the configured member store backend
#[derive(Debug, Clone)]
pub struct CounterStore {
    backend: StoreBackend,
    namespace: String,
    member_ttl: Duration,
}

impl CounterStore {
    /// Create a counter store from configuration with graceful degradation
    ///
    /// If Redis is configured but cannot be reached, logs a warning and returns
    /// an unavailable store instead. Construction never fails.
    pub async fn from_config_graceful(config: &StoreConfig, environment: &str) -> Self {
        let backend = match config.backend {
            BackendKind::Memory => {
                info!(backend = "memory", "In-memory counter store initialized");
                StoreBackend::Memory(InMemoryMemberStore::new())
            }
            BackendKind::Redis => Self::create_redis_backend(config, environment).await,
        };

        Self {
            backend,
            namespace: config.namespace.clone(),
            member_ttl: config.member_ttl(),
        }
    }

    #[cfg(feature = "redis-store")]
    async fn create_redis_backend(config: &StoreConfig, environment: &str) -> StoreBackend {
        let Some(url) = config.redis_url.resolve(environment) else {
            warn!(
                environment = environment,
                "No counter store URL for environment, batch completion will not be tracked"
            );
            return StoreBackend::Unavailable(UnavailableMemberStore::new(format!(
                "no redis_url configured for {environment}"
            )));
        };

        match RedisMemberStore::connect(&url).await {
            Ok(store) => {
                info!(backend = "redis", "Counter store initialized successfully");
                StoreBackend::Redis(Box::new(store))
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Failed to connect to Redis, batch completion will not be tracked (graceful degradation)"
                );
                StoreBackend::Unavailable(UnavailableMemberStore::new(e.to_string()))
            }
        }
    }

    #[cfg(not(feature = "redis-store"))]
    async fn create_redis_backend(_config: &StoreConfig, _environment: &str) -> StoreBackend {
        warn!("Redis counter store requested but 'redis-store' feature not enabled");
        StoreBackend::Unavailable(UnavailableMemberStore::new(
            "redis-store feature not enabled",
        ))
    }

    /// In-memory store with default namespace and TTL
    pub fn in_memory() -> Self {
        Self::with_memory(InMemoryMemberStore::new())
    }

    /// Wrap an existing in-memory store, keeping a handle for inspection
    pub fn with_memory(store: InMemoryMemberStore) -> Self {
        Self {
            backend: StoreBackend::Memory(store),
            namespace: DEFAULT_NAMESPACE.to_string(),
            member_ttl: Duration::from_secs(DEFAULT_MEMBER_TTL_SECONDS),
        }
    }

    /// Store whose every operation fails with a connection error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            backend: StoreBackend::Unavailable(UnavailableMemberStore::new(reason)),
            namespace: DEFAULT_NAMESPACE.to_string(),
            member_ttl: Duration::from_secs(DEFAULT_MEMBER_TTL_SECONDS),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_member_ttl(mut self, ttl: Duration) -> Self {
        self.member_ttl = ttl;
        self
    }

    /// Key of the member set for a batch
    pub fn key(&self, batch_id: &str) -> String {
        format!("{}:batch:{}", self.namespace, batch_id)
    }

    pub fn provider_name(&self) -> &'static str {
        self.backend.provider_name()
    }

    pub fn is_distributed(&self) -> bool {
        self.backend.is_distributed()
    }

    pub fn member_ttl(&self) -> Duration {
        self.member_ttl
    }

    pub async fn add_member(&self, batch_id: &str, token: &str) -> StoreResult<()> {
        self.backend
            .add_member(&self.key(batch_id), token, self.member_ttl)
            .await
    }

    pub async fn remove_member(&self, batch_id: &str, token: &str) -> StoreResult<MemberRemoval> {
        self.backend.remove_member(&self.key(batch_id), token).await
    }

    pub async fn delete(&self, batch_id: &str) -> StoreResult<()> {
        self.backend.delete(&self.key(batch_id)).await
    }

    pub async fn member_count(&self, batch_id: &str) -> StoreResult<u64> {
        self.backend.member_count(&self.key(batch_id)).await
    }

    pub async fn health_check(&self) -> StoreResult<bool> {
        self.backend.health_check().await
    }
}
