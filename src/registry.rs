//! Tagged operation registry
//!
//! Declarative hosts select a logical query by name (attributes or URL
//! parameters). Names map to a closed enum validated up front; dispatch is
//! an exhaustive match on the client, so an unregistered operation cannot
//! slip through to a method lookup at runtime.

use std::fmt;

use crate::error::WeftError;

/// Logical read queries of the data access layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    App,
    Model,
    Pages,
    Page,
    PageRelated,
    SearchResults,
    News,
    NewsArticle,
    NewsRelated,
    FormToken,
}

impl Operation {
    pub const ALL: [Operation; 10] = [
        Operation::App,
        Operation::Model,
        Operation::Pages,
        Operation::Page,
        Operation::PageRelated,
        Operation::SearchResults,
        Operation::News,
        Operation::NewsArticle,
        Operation::NewsRelated,
        Operation::FormToken,
    ];

    /// Kebab-case name as written in host attributes.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::App => "app",
            Operation::Model => "model",
            Operation::Pages => "pages",
            Operation::Page => "page",
            Operation::PageRelated => "page-related",
            Operation::SearchResults => "search-results",
            Operation::News => "news",
            Operation::NewsArticle => "news-article",
            Operation::NewsRelated => "news-related",
            Operation::FormToken => "form-token",
        }
    }

    pub fn parse(name: &str) -> Result<Operation, WeftError> {
        Operation::ALL
            .into_iter()
            .find(|operation| operation.name() == name)
            .ok_or_else(|| WeftError::UnknownOperation {
                name: name.to_string(),
            })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalized parameters a host extracts from attributes/URL before
/// dispatching. Unused fields stay at their defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationParams {
    pub key: String,
    pub start_key: String,
    pub model: String,
    pub keyword: String,
    pub timestamp: i64,
    pub start_date: i64,
    pub limit: u32,
}
