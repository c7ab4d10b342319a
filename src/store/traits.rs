//! Member store trait definition

use super::errors::StoreResult;
use std::time::Duration;

/// Outcome of removing one member token from a batch's member set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRemoval {
    /// Whether the token was present before removal
    pub removed: bool,
    /// Cardinality of the set after removal
    pub remaining: u64,
}

impl MemberRemoval {
    /// True only for the removal that emptied the set.
    ///
    /// A token that was already gone (a retried job, an expired set) never
    /// completes the batch.
    pub fn completes_batch(&self) -> bool {
        self.removed && self.remaining == 0
    }
}

/// Set-cardinality operations backing batch membership
///
/// Each method must be atomic with respect to the others for the same key.
/// Keys arrive fully namespaced (`<namespace>:batch:<id>`).
pub trait MemberStore: Send + Sync {
    /// Idempotently insert `token` and (re)set the TTL on the set
    fn add_member(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = StoreResult<()>> + Send;

    /// Remove `token` and report the resulting cardinality in one exchange
    fn remove_member(
        &self,
        key: &str,
        token: &str,
    ) -> impl std::future::Future<Output = StoreResult<MemberRemoval>> + Send;

    /// Delete the whole set
    fn delete(&self, key: &str) -> impl std::future::Future<Output = StoreResult<()>> + Send;

    /// Current cardinality of the set (0 when absent)
    fn member_count(&self, key: &str)
        -> impl std::future::Future<Output = StoreResult<u64>> + Send;

    /// Check if the store backend is reachable
    fn health_check(&self) -> impl std::future::Future<Output = StoreResult<bool>> + Send;

    /// Get the name of the store provider
    fn provider_name(&self) -> &'static str;

    /// Whether state is shared across processes
    fn is_distributed(&self) -> bool {
        false
    }
}
