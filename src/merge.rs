//! Deep-merge semantics for the persisted cache blob
//!
//! Object keys merge recursively. Arrays merge by deep-equality dedup rather
//! than by index, so repeated fetches of overlapping list windows (paginated
//! news) accumulate instead of overwriting each other.

use serde_json::Value;

/// Merge `incoming` into `base` and return the result.
///
/// - object + object: keys merge recursively
/// - array + array: element-equality dedup merge (see [`merge_arrays`])
/// - anything else: `incoming` wins
pub fn deep_merge(base: Value, incoming: Value) -> Value {
    match (base, incoming) {
        (Value::Object(mut base), Value::Object(incoming)) => {
            for (key, new_value) in incoming {
                let merged = match base.remove(&key) {
                    Some(prior) => deep_merge(prior, new_value),
                    None => new_value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (Value::Array(base), Value::Array(incoming)) => Value::Array(merge_arrays(base, incoming)),
        (_, incoming) => incoming,
    }
}

/// Append each incoming element unless a deep-equal element already exists.
///
/// Equal object elements are merged recursively rather than replaced, which
/// keeps the operation idempotent for repeated identical writes.
pub fn merge_arrays(mut merged: Vec<Value>, incoming: Vec<Value>) -> Vec<Value> {
    for item in incoming {
        // serde_json::Value equality is structural, which matches the
        // deep-equality the dedup rule requires.
        let existing = merged.iter_mut().find(|element| **element == item);
        match existing {
            Some(element) if element.is_object() && item.is_object() => {
                let prior = std::mem::take(element);
                *element = deep_merge(prior, item);
            }
            Some(_) => {}
            None => merged.push(item),
        }
    }
    merged
}
