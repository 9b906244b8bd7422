//! Markup helpers for fragment construction
//!
//! The core treats templates as opaque markup strings; this module supplies
//! the minimal structure fragment assembly needs: top-level node splitting,
//! slot substitution, repeat-node expansion, and block-id generation. It is
//! a tag scanner, not an HTML parser.

use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::template;

/// Attribute designating the repeat node of an iterable container template.
pub const ITERABLE_ATTR: &str = "data-weft-iterable";

/// Elements that never take a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

static SLOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<slot\b[^>]*>.*?</slot>|<slot\b[^>]*/>").expect("slot pattern"));

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

/// Per-pass generated identifier: base36 epoch millis (with sub-millisecond
/// jitter) suffixed with the iteration index.
pub fn block_id(index: usize) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let stamp = now.as_millis() as u64 + u64::from(now.subsec_nanos() % 997);
    format!("{}.{}", to_base36(stamp), index)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Undo entity mutations the host content model applies to placeholder
/// markers in header/paragraph/hr field templates. First occurrence each.
pub fn fix_entity_markers(markup: &str) -> String {
    markup
        .replacen("&lt;", "<", 1)
        .replacen("&gt;", ">", 1)
        .replacen("<!--", "<", 1)
        .replacen("-->", ">", 1)
}

/// Does `pos` start an element tag (`<` followed by a letter)?
fn is_element_start(markup: &str, pos: usize) -> bool {
    markup[pos..].starts_with('<')
        && markup[pos + 1..]
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic())
            .unwrap_or(false)
}

/// Find the `>` ending the tag that starts at `from` (first char after `<`
/// or `</`). Honors quoted attribute values. Returns (index, self_closing).
fn tag_close(markup: &str, from: usize) -> (usize, bool) {
    let bytes = markup.as_bytes();
    let mut quote: Option<u8> = None;
    let mut last_meaningful = 0u8;
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return (i, last_meaningful == b'/'),
                _ => {
                    if !b.is_ascii_whitespace() {
                        last_meaningful = b;
                    }
                }
            },
        }
        i += 1;
    }
    (bytes.len().saturating_sub(1), false)
}

fn tag_name(markup: &str, from: usize) -> String {
    markup[from..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

/// End offset (exclusive) of the element whose opening `<` is at `start`.
/// Unbalanced markup degrades to the end of the string.
fn element_end(markup: &str, start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < markup.len() {
        let Some(lt) = markup[i..].find('<') else {
            break;
        };
        let lt = i + lt;
        if markup[lt..].starts_with("<!--") {
            i = markup[lt..]
                .find("-->")
                .map(|p| lt + p + 3)
                .unwrap_or(markup.len());
            continue;
        }
        if markup[lt..].starts_with("</") {
            let (gt, _) = tag_close(markup, lt + 2);
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return gt + 1;
            }
            i = gt + 1;
            continue;
        }
        if !is_element_start(markup, lt) {
            i = lt + 1;
            continue;
        }
        let name = tag_name(markup, lt + 1);
        let (gt, self_closing) = tag_close(markup, lt + 1);
        if self_closing || is_void(&name) {
            if depth == 0 {
                return gt + 1;
            }
        } else {
            depth += 1;
        }
        i = gt + 1;
    }
    markup.len()
}

/// Split markup into its top-level nodes: elements and non-blank text runs,
/// in document order. Comments are dropped, matching the splice behavior.
pub fn split_top_level(markup: &str) -> Vec<String> {
    let mut nodes = Vec::new();
    let mut i = 0;
    while i < markup.len() {
        if markup[i..].starts_with("<!--") {
            i = markup[i..]
                .find("-->")
                .map(|p| i + p + 3)
                .unwrap_or(markup.len());
            continue;
        }
        if is_element_start(markup, i) {
            let end = element_end(markup, i);
            nodes.push(markup[i..end].to_string());
            i = end;
            continue;
        }
        // text run up to the next element or comment
        let mut end = i;
        loop {
            end += markup[end..].chars().next().map(char::len_utf8).unwrap_or(1);
            if end >= markup.len()
                || is_element_start(markup, end)
                || markup[end..].starts_with("<!--")
            {
                break;
            }
        }
        let text = &markup[i..end];
        if !text.trim().is_empty() {
            nodes.push(text.to_string());
        }
        i = end;
    }
    nodes
}

/// Replace the first slot element with `replacement`. `None` when the
/// markup has no slot.
pub fn replace_slot(markup: &str, replacement: &str) -> Option<String> {
    let found = SLOT.find(markup)?;
    let mut out = String::with_capacity(markup.len() + replacement.len());
    out.push_str(&markup[..found.start()]);
    out.push_str(replacement);
    out.push_str(&markup[found.end()..]);
    Some(out)
}

/// Insert `insertion` right after the first slot element, keeping the slot.
pub fn insert_after_slot(markup: &str, insertion: &str) -> Option<String> {
    let found = SLOT.find(markup)?;
    let mut out = String::with_capacity(markup.len() + insertion.len());
    out.push_str(&markup[..found.end()]);
    out.push_str(insertion);
    out.push_str(&markup[found.end()..]);
    Some(out)
}

/// Insert `insertion` just before the last closing tag of `tag`.
pub fn insert_before_close(markup: &str, tag: &str, insertion: &str) -> Option<String> {
    let closing = format!("</{tag}");
    let pos = markup.rfind(&closing)?;
    let mut out = String::with_capacity(markup.len() + insertion.len());
    out.push_str(&markup[..pos]);
    out.push_str(insertion);
    out.push_str(&markup[pos..]);
    Some(out)
}

/// Expand every repeat node in `markup` against `items`.
///
/// Each item is expanded against a clone of the node (attributes and inner
/// markup both pass through the expander) with its own iteration index and
/// block id; the node is replaced by the concatenation of its clones in
/// context order.
pub fn expand_repeats(markup: &str, items: &[Value]) -> String {
    let mut out = markup.to_string();
    while let Some(attr_pos) = out.find(ITERABLE_ATTR) {
        let Some(lt) = out[..attr_pos].rfind('<') else {
            break;
        };
        if !is_element_start(&out, lt) {
            break;
        }
        let end = element_end(&out, lt);
        let clone_template = remove_iterable_attr(&out[lt..end]);
        let mut expanded = String::new();
        for (index, item) in items.iter().enumerate() {
            expanded.push_str(&template::expand(
                &clone_template,
                item,
                index,
                &block_id(index),
            ));
        }
        out.replace_range(lt..end, &expanded);
    }
    out
}

/// Strip the repeat marker (and any `="..."` payload) from a node's markup.
fn remove_iterable_attr(node: &str) -> String {
    let Some(pos) = node.find(ITERABLE_ATTR) else {
        return node.to_string();
    };
    let mut end = pos + ITERABLE_ATTR.len();
    let rest = &node[end..];
    if let Some(stripped) = rest.strip_prefix('=') {
        if let Some(q) = stripped.chars().next().filter(|c| *c == '"' || *c == '\'') {
            if let Some(close) = stripped[1..].find(q) {
                end += 1 + 1 + close + 1;
            }
        }
    }
    let start = if pos > 0 && node.as_bytes()[pos - 1] == b' ' {
        pos - 1
    } else {
        pos
    };
    format!("{}{}", &node[..start], &node[end..])
}
