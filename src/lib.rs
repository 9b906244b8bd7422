//! Weft - template expansion and cache-coordinated content access

pub mod blocks;
pub mod client;
pub mod context;
pub mod error;
pub mod markup;
pub mod merge;
pub mod modifier;
pub mod poll;
pub mod registry;
pub mod render;
pub mod store;
pub mod template;
pub mod templates;
pub mod transport;

pub use client::{ApiStatus, ContentClient};
pub use error::WeftError;
pub use merge::deep_merge;
pub use poll::{wait_for, CompletionCoordinator, RetryPolicy};
pub use registry::{Operation, OperationParams};
pub use render::{Fragment, RenderPolicy, Renderer};
pub use store::{MergeStore, StorageMedium};
pub use template::{expand, TemplateExpander};
pub use templates::{NavTemplates, TemplateSet};
pub use transport::{ApiRequest, HttpTransport, MockTransport, Transport, TransportConfig};
