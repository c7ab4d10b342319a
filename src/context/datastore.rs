//! Datastore and batch metadata types
//!
//! The datastore is a JSON object shared by everything that runs inside a
//! batch. It travels between processes by value, embedded in job arguments.

use crate::constants::BATCH_INFO_KEY;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Shared mutable mapping carried across job boundaries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Datastore(Map<String, Value>);

impl Datastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Follow `keys` through nested objects (and arrays, by numeric index)
    pub fn dig(&self, keys: &[&str]) -> Option<&Value> {
        let (first, rest) = keys.split_first()?;
        let mut current = self.0.get(*first)?;
        for key in rest {
            current = match current {
                Value::Object(map) => map.get(*key)?,
                Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    fn dig_mut(&mut self, keys: &[&str]) -> Option<&mut Map<String, Value>> {
        let mut current = &mut self.0;
        for key in keys {
            current = match current.get_mut(*key)? {
                Value::Object(map) => map,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Store `value` under the last key, inside the object the leading keys address
    ///
    /// Returns `false` when `keys` is empty or the parent path does not exist
    /// or is not an object.
    pub fn set_path(&mut self, keys: &[&str], value: Value) -> bool {
        let Some((last, parents)) = keys.split_last() else {
            return false;
        };
        match self.dig_mut(parents) {
            Some(parent) => {
                parent.insert((*last).to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Shallow merge, incoming keys win
    pub fn merge(&mut self, values: Map<String, Value>) {
        self.0.extend(values);
    }

    /// Batch metadata, when present and carrying a non-empty id
    pub fn batch_info(&self) -> Option<BatchInfo> {
        let value = self.0.get(BATCH_INFO_KEY)?;
        serde_json::from_value::<BatchInfo>(value.clone())
            .ok()
            .filter(BatchInfo::is_valid)
    }

    pub fn set_batch_info(&mut self, info: &BatchInfo) -> serde_json::Result<()> {
        self.0
            .insert(BATCH_INFO_KEY.to_string(), serde_json::to_value(info)?);
        Ok(())
    }

    /// Append a callback name to the batch metadata in place
    pub fn add_callback(&mut self, name: &str) -> bool {
        let callbacks = self
            .0
            .get_mut(BATCH_INFO_KEY)
            .and_then(Value::as_object_mut)
            .map(|info| {
                info.entry("callbacks")
                    .or_insert_with(|| Value::Array(Vec::new()))
            })
            .and_then(Value::as_array_mut);

        match callbacks {
            Some(callbacks) => {
                callbacks.push(Value::String(name.to_string()));
                true
            }
            None => false,
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for Datastore {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Datastore {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

/// Originating code of a batch: enclosing type and method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct Caller {
    pub type_name: String,
    pub method: String,
}

impl Caller {
    pub fn new(type_name: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            method: method.into(),
        }
    }

    /// Caller named after `T`'s unqualified type name
    pub fn of<T: ?Sized>(method: impl Into<String>) -> Self {
        let full = std::any::type_name::<T>();
        let base = full.split('<').next().unwrap_or(full);
        let short = base.rsplit("::").next().unwrap_or(base);
        Self::new(short, method)
    }

    pub fn anonymous() -> Self {
        Self::new("", "")
    }
}

impl From<(String, String)> for Caller {
    fn from((type_name, method): (String, String)) -> Self {
        Self { type_name, method }
    }
}

impl From<Caller> for (String, String) {
    fn from(caller: Caller) -> Self {
        (caller.type_name, caller.method)
    }
}

/// Metadata of the active batch, stored under `batch_info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchInfo {
    pub id: String,
    /// Callback names, resolved through the callback registry at dispatch time
    #[serde(default)]
    pub callbacks: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub caller: Caller,
}

impl BatchInfo {
    pub fn new(id: impl Into<String>, caller: Caller) -> Self {
        Self {
            id: id.into(),
            callbacks: Vec::new(),
            started_at: Utc::now(),
            caller,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn datastore(value: Value) -> Datastore {
        Datastore::try_from(value).unwrap()
    }

    #[test]
    fn test_dig_nested_values() {
        let ds = datastore(json!({"a": {"b": [10, {"c": "deep"}]}, "x": 1}));

        assert_eq!(ds.dig(&["x"]), Some(&json!(1)));
        assert_eq!(ds.dig(&["a", "b", "1", "c"]), Some(&json!("deep")));
        assert_eq!(ds.dig(&["a", "missing"]), None);
        assert_eq!(ds.dig(&["x", "y"]), None);
        assert_eq!(ds.dig(&[]), None);
    }

    #[test]
    fn test_set_path() {
        let mut ds = datastore(json!({"report": {"rows": 0}}));

        assert!(ds.set_path(&["report", "rows"], json!(5)));
        assert!(ds.set_path(&["top"], json!("level")));
        assert!(!ds.set_path(&["missing", "rows"], json!(1)));
        assert!(!ds.set_path(&[], json!(1)));

        assert_eq!(ds.dig(&["report", "rows"]), Some(&json!(5)));
        assert_eq!(ds.get("top"), Some(&json!("level")));
    }

    #[test]
    fn test_merge_overwrites() {
        let mut ds = datastore(json!({"a": 1, "b": 2}));
        let incoming = json!({"b": 3, "c": 4});
        ds.merge(incoming.as_object().unwrap().clone());
        assert_eq!(ds.to_value(), json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn test_batch_info_round_trips_through_datastore() {
        let mut ds = Datastore::new();
        let info = BatchInfo::new("abc", Caller::new("ReportJob", "perform"));
        ds.set_batch_info(&info).unwrap();

        let stored = ds.get("batch_info").unwrap();
        assert_eq!(stored["caller"], json!(["ReportJob", "perform"]));
        assert_eq!(stored["callbacks"], json!([]));
        assert_eq!(ds.batch_info(), Some(info));
    }

    #[test]
    fn test_batch_info_requires_id() {
        let ds = datastore(json!({"batch_info": {
            "id": "",
            "callbacks": [],
            "started_at": "2024-01-01T00:00:00Z",
            "caller": ["", ""]
        }}));
        assert_eq!(ds.batch_info(), None);

        let ds = datastore(json!({"batch_info": "not an object"}));
        assert_eq!(ds.batch_info(), None);
    }

    #[test]
    fn test_add_callback() {
        let mut ds = Datastore::new();
        assert!(!ds.add_callback("Recorder"));

        ds.set_batch_info(&BatchInfo::new("id", Caller::anonymous()))
            .unwrap();
        assert!(ds.add_callback("Recorder"));
        assert!(ds.add_callback("Notifier"));
        assert_eq!(ds.batch_info().unwrap().callbacks, vec!["Recorder", "Notifier"]);
    }

    #[test]
    fn test_caller_of_type() {
        struct ImportJob;
        assert_eq!(Caller::of::<ImportJob>("perform"), Caller::new("ImportJob", "perform"));
        assert_eq!(Caller::of::<Vec<u8>>("call").type_name, "Vec");
    }
}
