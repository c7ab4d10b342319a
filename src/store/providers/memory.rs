//! In-memory member store
//!
//! Keeps member sets in a `DashMap`. Every operation runs under the shard lock
//! for its key, which gives the same add/remove/count atomicity as a Redis
//! `MULTI` block.
//!
//! **Important**: state lives in this process only. Use it for tests and for
//! deployments where every worker shares one process.

use crate::constants::MAX_MEMBER_TTL_SECONDS;
use crate::store::errors::StoreResult;
use crate::store::traits::{MemberRemoval, MemberStore};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct MemberSet {
    members: HashSet<String>,
    expires_at: Instant,
}

impl MemberSet {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local member store with per-set expiry
#[derive(Debug, Clone, Default)]
pub struct InMemoryMemberStore {
    sets: Arc<DashMap<String, MemberSet>>,
}

impl InMemoryMemberStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Members currently in a set, sorted, ignoring expired sets
    pub fn members(&self, key: &str) -> Vec<String> {
        let now = Instant::now();
        let mut members: Vec<String> = self
            .sets
            .get(key)
            .filter(|set| !set.is_expired(now))
            .map(|set| set.members.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    /// Number of live (non-empty, unexpired) sets
    pub fn live_sets(&self) -> usize {
        let now = Instant::now();
        self.sets
            .iter()
            .filter(|entry| !entry.is_expired(now) && !entry.members.is_empty())
            .count()
    }

    /// Drop every expired set
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sets.len();
        self.sets.retain(|_, set| !set.is_expired(now));
        before - self.sets.len()
    }
}

impl MemberStore for InMemoryMemberStore {
    async fn add_member(&self, key: &str, token: &str, ttl: Duration) -> StoreResult<()> {
        let now = Instant::now();
        let expires_at = now + ttl.min(Duration::from_secs(MAX_MEMBER_TTL_SECONDS));

        let mut set = self
            .sets
            .entry(key.to_string())
            .or_insert_with(|| MemberSet {
                members: HashSet::new(),
                expires_at,
            });

        if set.is_expired(now) {
            set.members.clear();
        }
        set.members.insert(token.to_string());
        set.expires_at = expires_at;

        debug!(key = key, token = token, size = set.members.len(), "Member SADD (memory)");
        Ok(())
    }

    async fn remove_member(&self, key: &str, token: &str) -> StoreResult<MemberRemoval> {
        let now = Instant::now();

        let Some(mut set) = self.sets.get_mut(key) else {
            return Ok(MemberRemoval {
                removed: false,
                remaining: 0,
            });
        };

        if set.is_expired(now) {
            set.members.clear();
        }

        let before = set.members.len() as u64;
        let removed = set.members.remove(token);
        let remaining = before - u64::from(removed);

        debug!(key = key, token = token, removed = removed, remaining = remaining, "Member SREM (memory)");
        Ok(MemberRemoval { removed, remaining })
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.sets.remove(key);
        debug!(key = key, "Member set DEL (memory)");
        Ok(())
    }

    async fn member_count(&self, key: &str) -> StoreResult<u64> {
        let now = Instant::now();
        Ok(self
            .sets
            .get(key)
            .filter(|set| !set.is_expired(now))
            .map(|set| set.members.len() as u64)
            .unwrap_or(0))
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}
