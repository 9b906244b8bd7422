//! Context Resolver - dotted/indexed expressions over a JSON context
//!
//! Supported segments, left to right over the working value:
//! - plain key: `subject`
//! - keyed array index: `media[0]`, `media[*]` (`*` = current iteration index)
//! - bare `[*]`: index the working array by the iteration index
//! - positional literal: `token=2` yields the literal `token` when the
//!   iteration index is 2
//! - reserved: `block_id`, `required`, `*`
//!
//! Resolution fails soft: any missing intermediate yields `None`, never an
//! error. The context is read-only for the whole pass.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// `key` or `key[n]` or `key[*]`
static KEYED_INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^\[\]]+)(?:\[(\d+|\*)\])?$").expect("keyed index pattern"));

/// Resolve `expression` against `context` for one expansion pass.
///
/// `index` is the current iteration index, `block_id` the pass's generated
/// identifier. Returns `None` for any unresolvable path.
pub fn resolve(expression: &str, context: &Value, index: usize, block_id: &str) -> Option<Value> {
    let mut value = Some(context.clone());

    for part in expression.split('.') {
        let part = part.trim();

        // positional literal: `token=position`
        if let Some((token, position)) = split_positional(part) {
            if position == index {
                value = Some(Value::String(token.to_string()));
                continue;
            }
            // position mismatch falls through to a plain lookup
        }

        match part {
            "block_id" => {
                value = Some(Value::String(block_id.to_string()));
                continue;
            }
            "required" => {
                // emits a marker against the root context, not the working value
                let truthy = context
                    .get("required")
                    .map(is_truthy)
                    .unwrap_or(false);
                value = Some(Value::String(if truthy { "*" } else { "" }.to_string()));
                continue;
            }
            "*" => {
                value = Some(Value::from(index as u64));
                continue;
            }
            "[*]" => {
                value = value.and_then(|v| match v {
                    Value::Array(items) => items.into_iter().nth(index),
                    _ => None,
                });
                continue;
            }
            _ => {}
        }

        let (key, bracket) = match KEYED_INDEX.captures(part) {
            Some(caps) => (
                caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
                caps.get(2).map(|m| m.as_str().to_string()),
            ),
            None => (part.to_string(), None),
        };

        value = value.and_then(|v| lookup(&v, &key));
        if let Some(bracket) = bracket {
            value = value.and_then(|v| match v {
                Value::Array(items) => {
                    let i = if bracket == "*" {
                        index
                    } else {
                        bracket.parse().ok()?
                    };
                    items.into_iter().nth(i)
                }
                _ => None,
            });
        }
    }

    value
}

/// Descend one key. Numeric keys index arrays; any lookup on a scalar aborts
/// the chain.
fn lookup(value: &Value, key: &str) -> Option<Value> {
    match value {
        Value::Object(map) => map.get(key).cloned(),
        Value::Array(items) => key
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i))
            .cloned(),
        _ => None,
    }
}

/// `token=position` with a numeric position. The token itself may contain
/// `=`; the position is the part after the last one.
fn split_positional(part: &str) -> Option<(&str, usize)> {
    let (token, position) = part.rsplit_once('=')?;
    let position = position.trim().parse::<usize>().ok()?;
    Some((token.trim(), position))
}

/// Falsy values: null, false, 0, empty string. Arrays and objects are always
/// truthy, empty or not.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Render a resolved value for interpolation. Missing and null both emit the
/// empty string; containers emit compact JSON.
pub fn value_to_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => serde_json::to_string(other).unwrap_or_default(),
    }
}
