//! Remote content API boundary
//!
//! Each logical query maps to one or more aliased operation calls batched
//! into a single round trip. The API signals failures by returning a bare
//! string (or a falsy value) in place of data; transports themselves only
//! fail on transport-level problems.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::WeftError;

/// One aliased operation call within a batch.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ApiRequest {
    pub alias: String,
    pub method: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl ApiRequest {
    pub fn new(alias: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            method: method.into(),
            params: Map::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add the parameter only when the string is non-empty. The remote API
    /// treats absent and empty parameters differently.
    pub fn param_if(self, key: impl Into<String>, value: &str) -> Self {
        if value.is_empty() {
            self
        } else {
            self.param(key, value)
        }
    }
}

/// A connection to the remote content API.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    /// Execute a batch of aliased reads in one round trip. The result is an
    /// object keyed by alias; per-alias values may be the API's string/falsy
    /// error signal.
    async fn batch(&self, requests: &[ApiRequest]) -> Result<Value, WeftError>;

    /// Execute one write operation (form submissions).
    async fn post(&self, request: ApiRequest) -> Result<Value, WeftError>;
}

/// Connection settings for the HTTP transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub endpoint: String,
    pub api_key: String,
    /// Optional preview key for unpublished content.
    pub sandbox_key: Option<String>,
    pub domain: String,
    /// Two-letter language code; region subtags are dropped by the caller.
    pub lang: String,
}

/// JSON-over-HTTP transport.
pub struct HttpTransport {
    client: reqwest::Client,
    config: TransportConfig,
    endpoint: url::Url,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Result<Self, WeftError> {
        let endpoint =
            url::Url::parse(&config.endpoint).map_err(|_| WeftError::InvalidEndpoint {
                endpoint: config.endpoint.clone(),
            })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(WeftError::InvalidEndpoint {
                endpoint: config.endpoint.clone(),
            });
        }
        Ok(Self {
            client: reqwest::Client::new(),
            config,
            endpoint,
        })
    }

    fn envelope(&self, requests: &[ApiRequest]) -> Value {
        let mut body = Map::new();
        body.insert("api_key".into(), Value::String(self.config.api_key.clone()));
        if let Some(sandbox_key) = &self.config.sandbox_key {
            body.insert("sandbox_key".into(), Value::String(sandbox_key.clone()));
        }
        body.insert("domain".into(), Value::String(self.config.domain.clone()));
        body.insert("lang".into(), Value::String(self.config.lang.clone()));
        body.insert(
            "requests".into(),
            serde_json::to_value(requests).unwrap_or(Value::Array(vec![])),
        );
        Value::Object(body)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn batch(&self, requests: &[ApiRequest]) -> Result<Value, WeftError> {
        debug!(count = requests.len(), "dispatching API batch");
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&self.envelope(requests))
            .send()
            .await?;
        let body = response.json::<Value>().await?;
        Ok(body)
    }

    async fn post(&self, request: ApiRequest) -> Result<Value, WeftError> {
        debug!(method = %request.method, "dispatching API post");
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&self.envelope(std::slice::from_ref(&request)))
            .send()
            .await?;
        let body = response.json::<Value>().await?;
        Ok(body)
    }
}

/// Mock transport that returns queued responses without a network.
///
/// Records every batch for assertions, the counterpart of testing against
/// the live API.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<Vec<Value>>,
    default_response: Value,
    batches: Arc<Mutex<Vec<Vec<ApiRequest>>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue of responses, returned FIFO.
    pub fn with_responses(responses: Vec<Value>) -> Self {
        Self {
            responses: Mutex::new(responses),
            ..Self::default()
        }
    }

    pub fn with_default(mut self, response: Value) -> Self {
        self.default_response = response;
        self
    }

    pub fn queue_response(&self, response: Value) {
        self.responses.lock().expect("mock lock").push(response);
    }

    /// All batches dispatched so far.
    pub fn batches(&self) -> Vec<Vec<ApiRequest>> {
        self.batches.lock().expect("mock lock").clone()
    }

    /// Number of round trips made.
    pub fn call_count(&self) -> usize {
        self.batches.lock().expect("mock lock").len()
    }

    fn next_response(&self) -> Value {
        let mut responses = self.responses.lock().expect("mock lock");
        if responses.is_empty() {
            self.default_response.clone()
        } else {
            responses.remove(0)
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn batch(&self, requests: &[ApiRequest]) -> Result<Value, WeftError> {
        self.batches
            .lock()
            .expect("mock lock")
            .push(requests.to_vec());
        Ok(self.next_response())
    }

    async fn post(&self, request: ApiRequest) -> Result<Value, WeftError> {
        self.batches.lock().expect("mock lock").push(vec![request]);
        Ok(self.next_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_builder_skips_empty_optionals() {
        let request = ApiRequest::new("page", "get.page")
            .param("key", "about")
            .param_if("model", "");
        assert_eq!(request.params.get("key"), Some(&json!("about")));
        assert!(!request.params.contains_key("model"));
    }

    #[test]
    fn request_serializes_flat() {
        let request = ApiRequest::new("news", "get.news").param("limit", 4);
        let serialized = serde_json::to_value(&request).unwrap();
        assert_eq!(
            serialized,
            json!({"alias": "news", "method": "get.news", "limit": 4})
        );
    }

    #[test]
    fn http_transport_rejects_bad_endpoints() {
        let config = TransportConfig {
            endpoint: "not a url".to_string(),
            api_key: "k".to_string(),
            sandbox_key: None,
            domain: "example.org".to_string(),
            lang: "en".to_string(),
        };
        assert!(matches!(
            HttpTransport::new(config),
            Err(WeftError::InvalidEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn mock_transport_replays_queue_and_records_batches() {
        let transport = MockTransport::with_responses(vec![json!({"a": 1})])
            .with_default(json!("fallback error"));
        let first = transport
            .batch(&[ApiRequest::new("a", "get.a")])
            .await
            .unwrap();
        assert_eq!(first, json!({"a": 1}));
        let second = transport.batch(&[]).await.unwrap();
        assert_eq!(second, json!("fallback error"));
        assert_eq!(transport.call_count(), 2);
        assert_eq!(transport.batches()[0][0].method, "get.a");
    }
}
