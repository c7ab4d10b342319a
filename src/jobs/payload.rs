//! Job payloads and the datastore marker codec
//!
//! A datastore crosses a job boundary as the first positional argument,
//! wrapped in a two-element tuple `["$datastore_marker", {...}]`. Anything
//! that does not match that shape exactly is an ordinary argument.

use crate::config::JobPlatform;
use crate::constants::DATASTORE_MARKER;
use crate::context::Datastore;
use crate::error::{BatchError, BatchResult};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// A job as handed to and received from a queue
#[derive(Debug, Clone, PartialEq)]
pub struct JobPayload {
    pub class: String,
    pub jid: String,
    pub queue: String,
    pub args: Vec<Value>,
    pub enqueued_at: DateTime<Utc>,
}

impl JobPayload {
    /// New payload with a fresh job id
    pub fn new(class: impl Into<String>, queue: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            class: class.into(),
            jid: Uuid::new_v4().to_string(),
            queue: queue.into(),
            args,
            enqueued_at: Utc::now(),
        }
    }

    /// Serialize in the layout of `platform`
    pub fn to_wire(&self, platform: JobPlatform) -> Value {
        match platform {
            JobPlatform::ActiveJob => json!({
                "job_class": self.class,
                "job_id": self.jid,
                "queue_name": self.queue,
                "arguments": self.args,
                "enqueued_at": self.enqueued_at.to_rfc3339(),
            }),
            JobPlatform::Sidekiq => json!({
                "class": self.class,
                "jid": self.jid,
                "queue": self.queue,
                "args": self.args,
                "enqueued_at": self.enqueued_at.timestamp_micros() as f64 / 1_000_000.0,
            }),
        }
    }

    /// Parse either wire layout
    pub fn from_wire(value: &Value) -> BatchResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| BatchError::InvalidPayload("job payload must be an object".to_string()))?;

        let platform = detect_platform(object)
            .ok_or_else(|| BatchError::InvalidPayload("job payload has no job class".to_string()))?;

        let (class_key, id_key, queue_key, args_key) = match platform {
            JobPlatform::ActiveJob => ("job_class", "job_id", "queue_name", "arguments"),
            JobPlatform::Sidekiq => ("class", "jid", "queue", "args"),
        };

        let class = string_field(object, class_key)?;
        let jid = string_field(object, id_key)?;
        let queue = object
            .get(queue_key)
            .and_then(Value::as_str)
            .unwrap_or("default")
            .to_string();
        let args = match object.get(args_key) {
            Some(Value::Array(args)) => args.clone(),
            None | Some(Value::Null) => Vec::new(),
            Some(_) => {
                return Err(BatchError::InvalidPayload(format!(
                    "{args_key} must be an array"
                )))
            }
        };
        let enqueued_at = object
            .get("enqueued_at")
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);

        Ok(Self {
            class,
            jid,
            queue,
            args,
            enqueued_at,
        })
    }
}

fn detect_platform(object: &Map<String, Value>) -> Option<JobPlatform> {
    if object.contains_key("job_class") {
        Some(JobPlatform::ActiveJob)
    } else if object.contains_key("class") {
        Some(JobPlatform::Sidekiq)
    } else {
        None
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> BatchResult<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| BatchError::InvalidPayload(format!("missing {key}")))
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => {
            let seconds = n.as_f64()?;
            let whole = seconds.trunc();
            let nanos = ((seconds - whole) * 1_000_000_000.0).round() as u32;
            DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
        }
        _ => None,
    }
}

/// Prepend the marker tuple carrying `datastore`
pub fn embed_datastore(args: &mut Vec<Value>, datastore: &Datastore) {
    args.insert(0, json!([DATASTORE_MARKER, datastore.to_value()]));
}

/// Remove a leading marker tuple and return its datastore
///
/// Returns `None` and leaves `args` untouched when the first argument is not a
/// well-formed marker.
pub fn extract_datastore(args: &mut Vec<Value>) -> Option<Datastore> {
    let well_formed = match args.first() {
        Some(Value::Array(pair)) => {
            pair.len() == 2
                && pair[0].as_str() == Some(DATASTORE_MARKER)
                && pair[1].is_object()
        }
        _ => false,
    };
    if !well_formed {
        return None;
    }

    match args.remove(0) {
        Value::Array(mut pair) => Datastore::try_from(pair.remove(1)).ok(),
        _ => None,
    }
}

fn wire_args_mut(wire: &mut Value) -> Option<&mut Vec<Value>> {
    let object = wire.as_object_mut()?;
    let key = if object.contains_key("arguments") {
        "arguments"
    } else {
        "args"
    };
    object.get_mut(key)?.as_array_mut()
}

/// Embed `datastore` into an already serialized payload
pub fn splice_datastore(wire: &mut Value, datastore: &Datastore) -> bool {
    match wire_args_mut(wire) {
        Some(args) => {
            embed_datastore(args, datastore);
            true
        }
        None => false,
    }
}

/// Strip and return the datastore of a serialized payload
pub fn strip_datastore(wire: &mut Value) -> Option<Datastore> {
    extract_datastore(wire_args_mut(wire)?)
}
