//! # System Constants
//!
//! Wire-level constants shared by every process that participates in a batch.
//! Changing any of these breaks compatibility with batches that are already in
//! flight, so they are fixed here rather than configured.

use serde::{Deserialize, Serialize};
use std::fmt;

/// First element of the two-element tuple that carries a datastore inside job arguments
pub const DATASTORE_MARKER: &str = "$datastore_marker";

/// Reserved datastore key holding the active batch's metadata
pub const BATCH_INFO_KEY: &str = "batch_info";

/// Default key namespace for member sets (`<namespace>:batch:<id>`)
pub const DEFAULT_NAMESPACE: &str = "servitium";

/// Number of seconds in one day
pub const SECONDS_IN_DAY: u64 = 86_400;

/// Member sets expire after 30 days so abandoned batches do not live forever
pub const DEFAULT_MEMBER_TTL_SECONDS: u64 = SECONDS_IN_DAY * 30;

/// Longest TTL a member set may be given (ten years)
pub const MAX_MEMBER_TTL_SECONDS: u64 = SECONDS_IN_DAY * 3_650;

/// Number of random bytes in a batch id
pub const BATCH_ID_BYTES: usize = 16;

/// Fallback counter-store URL when neither configuration nor environment supply one
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379/1";

/// Member token prefixes
pub mod members {
    pub const BATCH_PREFIX: &str = "batch_";
    pub const JOB_PREFIX: &str = "job_";

    /// Token representing the batch session itself
    pub fn batch_token(batch_id: &str) -> String {
        format!("{BATCH_PREFIX}{batch_id}")
    }

    /// Token representing one dispatched job
    pub fn job_token(job_id: &str) -> String {
        format!("{JOB_PREFIX}{job_id}")
    }
}

/// Callback events raised by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackEvent {
    /// The last member of a batch has finished
    Complete,
    /// A single tracked job has finished, whether or not its batch is done
    JobComplete,
}

impl CallbackEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackEvent::Complete => "complete",
            CallbackEvent::JobComplete => "job_complete",
        }
    }
}

impl fmt::Display for CallbackEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_tokens() {
        assert_eq!(members::batch_token("abc"), "batch_abc");
        assert_eq!(members::job_token("123"), "job_123");
    }

    #[test]
    fn test_callback_event_names() {
        assert_eq!(CallbackEvent::Complete.to_string(), "complete");
        assert_eq!(CallbackEvent::JobComplete.as_str(), "job_complete");
        assert_eq!(
            serde_json::to_string(&CallbackEvent::JobComplete).unwrap(),
            "\"job_complete\""
        );
    }

    #[test]
    fn test_default_ttl_is_thirty_days() {
        assert_eq!(DEFAULT_MEMBER_TTL_SECONDS, 2_592_000);
        assert!(DEFAULT_MEMBER_TTL_SECONDS < MAX_MEMBER_TTL_SECONDS);
    }
}
