//! Modifier Pipeline - one optional post-processing stage per placeholder
//!
//! The grammar is fixed to five known modifiers plus a bare fallback
//! expression; parsing is pattern matching, not a general parser.

use chrono::{TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::context::{is_truthy, resolve, value_to_string};

static IS_SPEC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^is\((.+)\)$").expect("is pattern"));
static FALLBACK_SPEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^fallback\(['"](.*)['"]\)$"#).expect("fallback pattern"));
static JOIN_SPEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^join\(['"](.*)['"]\)$"#).expect("join pattern"));

/// Parsed modifier stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modifier {
    /// `is(expr)`: re-emit the placeholder expression text iff `expr`
    /// resolves truthy. Used for conditional boolean-attribute emission.
    Is(String),
    /// `fallback('text')`: substitute when the value is falsy.
    Fallback(String),
    /// `join('sep')`: array to string; non-arrays yield empty.
    Join(String),
    /// Value is epoch seconds; long locale date.
    FormatDate,
    /// Value is epoch seconds; numeric time.
    FormatTime,
    /// Anything else: a secondary expression, resolved when the primary
    /// value is falsy.
    Expression(String),
}

impl Modifier {
    pub fn parse(spec: &str) -> Modifier {
        let spec = spec.trim();
        if let Some(caps) = IS_SPEC.captures(spec) {
            return Modifier::Is(caps[1].trim().to_string());
        }
        if let Some(caps) = FALLBACK_SPEC.captures(spec) {
            return Modifier::Fallback(caps[1].to_string());
        }
        if let Some(caps) = JOIN_SPEC.captures(spec) {
            return Modifier::Join(caps[1].to_string());
        }
        match spec {
            "formatDate" => Modifier::FormatDate,
            "formatTime" => Modifier::FormatTime,
            _ => Modifier::Expression(spec.to_string()),
        }
    }
}

/// Apply a modifier to a resolved value and produce the replacement text.
///
/// `expression` is the placeholder's own expression text, re-emitted by the
/// `is` modifier.
pub fn apply(
    modifier: &Modifier,
    raw: Option<&Value>,
    expression: &str,
    context: &Value,
    index: usize,
    block_id: &str,
) -> String {
    match modifier {
        Modifier::Is(condition) => {
            let resolved = resolve(condition, context, index, block_id);
            if resolved.as_ref().map(is_truthy).unwrap_or(false) {
                expression.to_string()
            } else {
                String::new()
            }
        }
        Modifier::Fallback(text) => {
            if raw.map(is_truthy).unwrap_or(false) {
                value_to_string(raw)
            } else {
                text.clone()
            }
        }
        Modifier::Join(separator) => match raw {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| value_to_string(Some(item)))
                .collect::<Vec<_>>()
                .join(separator),
            _ => String::new(),
        },
        Modifier::FormatDate => format_epoch(raw, "%B %d, %Y"),
        Modifier::FormatTime => format_epoch(raw, "%-I:%M:%S %p"),
        Modifier::Expression(secondary) => {
            if raw.map(is_truthy).unwrap_or(false) {
                return value_to_string(raw);
            }
            let alternate = resolve(secondary, context, index, block_id);
            if alternate.as_ref().map(is_truthy).unwrap_or(false) {
                value_to_string(alternate.as_ref())
            } else {
                String::new()
            }
        }
    }
}

/// Interpret the value as epoch seconds (number or numeric string); falsy
/// values and unparseable input emit empty.
fn format_epoch(raw: Option<&Value>, pattern: &str) -> String {
    let Some(raw) = raw else {
        return String::new();
    };
    if !is_truthy(raw) {
        return String::new();
    }
    let seconds = match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match seconds.and_then(|s| Utc.timestamp_opt(s, 0).single()) {
        Some(datetime) => datetime.format(pattern).to_string(),
        None => String::new(),
    }
}
