//! Unavailable member store
//!
//! Stands in for a counter store that could not be reached at startup. Every
//! operation fails with a connection error, so dispatch refuses to enqueue
//! untracked members and removals degrade to "completion not observed".

use crate::store::errors::{StoreError, StoreResult};
use crate::store::traits::{MemberRemoval, MemberStore};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct UnavailableMemberStore {
    reason: String,
}

impl UnavailableMemberStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> StoreError {
        StoreError::ConnectionError(self.reason.clone())
    }
}

impl MemberStore for UnavailableMemberStore {
    async fn add_member(&self, _key: &str, _token: &str, _ttl: Duration) -> StoreResult<()> {
        Err(self.error())
    }

    async fn remove_member(&self, _key: &str, _token: &str) -> StoreResult<MemberRemoval> {
        Err(self.error())
    }

    async fn delete(&self, _key: &str) -> StoreResult<()> {
        Err(self.error())
    }

    async fn member_count(&self, _key: &str) -> StoreResult<u64> {
        Err(self.error())
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(false)
    }

    fn provider_name(&self) -> &'static str {
        "unavailable"
    }
}
