//! Proptest strategies

use proptest::prelude::*;
use serde_json::{json, Value};

/// Removal order over `n` member tokens, `n` in `1..max`
pub fn removal_order_strategy(max: usize) -> impl Strategy<Value = Vec<usize>> {
    (1..max).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
}

/// Plain job arguments that never form a datastore marker
pub fn job_args_strategy() -> impl Strategy<Value = Vec<Value>> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z_]{0,18}".prop_map(Value::from),
    ];
    let value = leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Value::from),
            inner.prop_map(|v| json!({ "nested": v })),
        ]
    });
    prop::collection::vec(value, 0..5)
}
