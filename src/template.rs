//! Template Expander - single-pass placeholder rewriting with caching
//!
//! Templates are tokenized once and cached; expansion walks the token list
//! and replaces each `{{ expression [| modifier] }}` independently. No
//! nested placeholders; the only escaping is a fixed pre-pass stripping
//! empty-attribute artifacts (`=""`) left behind by the host markup parser.

use std::ops::Range;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::context::{resolve, value_to_string};
use crate::modifier::{self, Modifier};

/// Token representing a parsed template fragment
#[derive(Debug, Clone)]
pub enum Token {
    /// Literal text (stores range in the cleaned template string)
    Literal(Range<usize>),
    /// `{{ expression }}` or `{{ expression | modifier }}`
    Placeholder {
        expression: String,
        modifier: Option<Modifier>,
    },
}

/// Template expander with a concurrent token cache
pub struct TemplateExpander {
    cache: DashMap<String, Arc<Vec<Token>>>,
}

impl Default for TemplateExpander {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateExpander {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Strip boolean-attribute artifacts the host markup parser introduces.
    pub fn clean(template: &str) -> String {
        template.replace("=\"\"", "")
    }

    /// Parse a cleaned template into tokens (with caching).
    pub fn tokenize(&self, template: &str) -> Arc<Vec<Token>> {
        if let Some(cached) = self.cache.get(template) {
            return Arc::clone(&cached);
        }

        let mut tokens = Vec::new();
        let mut literal_start = 0;
        let mut search_from = 0;

        while let Some(open) = template[search_from..].find("{{") {
            let open = search_from + open;
            let Some(close) = template[open + 2..].find("}}") else {
                // unterminated placeholder, rest is literal
                break;
            };
            let close = open + 2 + close;

            if open > literal_start {
                tokens.push(Token::Literal(literal_start..open));
            }

            let content = template[open + 2..close].trim();
            let mut parts = content.splitn(2, '|');
            let expression = parts.next().unwrap_or_default().trim().to_string();
            let modifier = parts
                .next()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(Modifier::parse);
            tokens.push(Token::Placeholder {
                expression,
                modifier,
            });

            literal_start = close + 2;
            search_from = close + 2;
        }

        if literal_start < template.len() {
            tokens.push(Token::Literal(literal_start..template.len()));
        }

        let tokens = Arc::new(tokens);
        self.cache.insert(template.to_string(), tokens.clone());
        tokens
    }

    /// Rewrite all placeholders in `template` against `context`.
    ///
    /// Idempotent on placeholder-free input; unresolvable placeholders
    /// expand to the empty string, never an error.
    pub fn expand(&self, template: &str, context: &Value, index: usize, block_id: &str) -> String {
        let cleaned = Self::clean(template);
        let tokens = self.tokenize(&cleaned);

        let mut result = String::with_capacity(cleaned.len());
        for token in tokens.iter() {
            match token {
                Token::Literal(range) => result.push_str(&cleaned[range.clone()]),
                Token::Placeholder {
                    expression,
                    modifier,
                } => {
                    let value = resolve(expression, context, index, block_id);
                    match modifier {
                        Some(modifier) => result.push_str(&modifier::apply(
                            modifier,
                            value.as_ref(),
                            expression,
                            context,
                            index,
                            block_id,
                        )),
                        None => result.push_str(&value_to_string(value.as_ref())),
                    }
                }
            }
        }
        result
    }
}

/// Global expander instance sharing one token cache
static EXPANDER: Lazy<TemplateExpander> = Lazy::new(TemplateExpander::new);

/// Convenience wrapper over the global expander
pub fn expand(template: &str, context: &Value, index: usize, block_id: &str) -> String {
    EXPANDER.expand(template, context, index, block_id)
}
