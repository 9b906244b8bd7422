//! Data Access Layer - cache-coordinated logical queries
//!
//! Each logical query derives a deterministic cache key from its normalized
//! parameters, probes the Merge Store first (zero retries), and only then
//! goes to the transport. Successful results are deep-merged back into the
//! store; list-shaped news results also maintain the pagination index.
//!
//! The status/error pair is single-flight: overlapping calls on one client
//! share and overwrite the same fields. This is a documented status model,
//! not a queue.

use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::context::is_truthy;
use crate::error::WeftError;
use crate::merge::merge_arrays;
use crate::poll::RetryPolicy;
use crate::registry::{Operation, OperationParams};
use crate::store::MergeStore;
use crate::transport::{ApiRequest, Transport};

/// Side-store key holding the ordered news timestamp index.
const NEWS_INDEX_KEY: &str = "news.index";

/// Fields selected for list-shaped page/news summaries.
const SUMMARY_SELECT: &str = "timestamp,subject,header,cover,tags";

/// Per-call lifecycle of the shared status field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStatus {
    Idle,
    Pending,
    Success,
    Error,
}

struct ClientState {
    status: ApiStatus,
    error: String,
}

/// Client over the remote content API and the Merge Store.
pub struct ContentClient {
    transport: Arc<dyn Transport>,
    store: MergeStore,
    state: Mutex<ClientState>,
}

impl ContentClient {
    pub fn new(transport: Arc<dyn Transport>, store: MergeStore) -> Self {
        Self {
            transport,
            store,
            state: Mutex::new(ClientState {
                status: ApiStatus::Idle,
                error: String::new(),
            }),
        }
    }

    pub fn store(&self) -> &MergeStore {
        &self.store
    }

    pub fn status(&self) -> ApiStatus {
        self.state.lock().expect("client state lock").status
    }

    /// Human-readable message of the most recent failure.
    pub fn last_error(&self) -> String {
        self.state.lock().expect("client state lock").error.clone()
    }

    /// Dispatch a registered operation with normalized host parameters.
    pub async fn dispatch(
        &self,
        operation: Operation,
        params: &OperationParams,
    ) -> Result<Value, WeftError> {
        match operation {
            Operation::App => self.get_app().await,
            Operation::Model => self.get_model(&params.model, &params.start_key).await,
            Operation::Pages => self.get_pages(&params.start_key, params.limit).await,
            Operation::Page => self.get_page(&params.key, &params.model).await,
            Operation::PageRelated => self.get_page_related(&params.key).await,
            Operation::SearchResults => self.get_search_results(&params.keyword).await,
            Operation::News => self.get_news(params.start_date, params.limit).await,
            Operation::NewsArticle => self.get_news_article(params.start_date).await,
            Operation::NewsRelated => {
                self.get_news_related(params.timestamp, params.limit).await
            }
            Operation::FormToken => self.get_form_token(&params.key).await,
        }
    }

    /// App shell: title/meta, navigation tree, slider albums, contacts,
    /// locations, and the latest news window, in one round trip.
    pub async fn get_app(&self) -> Result<Value, WeftError> {
        if let Some(hit) = self.cache_hit("app").await {
            return Ok(hit);
        }
        self.set_pending();
        let requests = [
            ApiRequest::new("app", "get.app").param("select", "title,languages,meta,social"),
            ApiRequest::new("nav", "get.pages"),
            ApiRequest::new("slider", "get.albums.schedule")
                .param("active_only", true)
                .param("select", "caption,maximum,tags"),
            ApiRequest::new("contacts", "get.contacts").param("select", "name,email"),
            ApiRequest::new("locations", "get.locations")
                .param("select", "title,address,zone,phone,fax,latitude,longitude"),
            ApiRequest::new("news", "get.news")
                .param("limit", 4)
                .param("select", SUMMARY_SELECT),
        ];
        let mut data = self.run_batch("app", &requests).await?;

        // slider renders through the iterable path, which expects a list shape
        if let Some(map) = data.as_object_mut() {
            let slider = map.remove("slider").unwrap_or(Value::Null);
            map.insert("slider".to_string(), json!({ "list": slider }));
        }
        if let Some(news) = data.get("news").and_then(Value::as_array) {
            self.merge_news_index(news).await;
        }

        self.store.set("app", data.clone()).await;
        self.succeed();
        Ok(data)
    }

    /// A model landing page plus all pages instantiating the model.
    pub async fn get_model(&self, model: &str, start_key: &str) -> Result<Value, WeftError> {
        if model.is_empty() {
            return Err(self.missing_param("model", "model"));
        }
        let cache_key = format!("model.{model}.{start_key}");
        if let Some(hit) = self.cache_hit(&cache_key).await {
            return Ok(hit);
        }
        self.set_pending();

        let mut result = Map::new();
        if !start_key.is_empty() {
            let page = self
                .run_single(
                    "model",
                    ApiRequest::new("page", "get.page")
                        .param("key", start_key)
                        .param("select", "key,subject,header,cover,blocks"),
                )
                .await?;
            result.insert("page".to_string(), page);
        }
        let pages = self
            .run_single(
                "model",
                ApiRequest::new("model", "get.pages")
                    .param("model", model)
                    .param("only_models", true)
                    .param_if("start_key", start_key)
                    .param("select", "key,subject,header,cover,blocks"),
            )
            .await?;
        result.insert("model".to_string(), pages);

        let result = Value::Object(result);
        self.store.set(&cache_key, result.clone()).await;
        self.succeed();
        Ok(result)
    }

    /// Page listing, optionally scoped under a parent key.
    pub async fn get_pages(&self, start_key: &str, limit: u32) -> Result<Value, WeftError> {
        let cache_key = format!("pages.{start_key}.{limit}");
        if let Some(hit) = self.cache_hit(&cache_key).await {
            return Ok(hit);
        }
        self.set_pending();
        let list = self
            .run_single(
                "pages",
                ApiRequest::new("pages", "get.pages")
                    .param_if("start_key", start_key)
                    .param("limit", limit)
                    .param("select", SUMMARY_SELECT),
            )
            .await?;
        let result = json!({ "list": list });
        self.store.set(&cache_key, result.clone()).await;
        self.succeed();
        Ok(result)
    }

    /// One page with its rich-text children merged in as `childs`.
    pub async fn get_page(&self, key: &str, model: &str) -> Result<Value, WeftError> {
        if key.is_empty() {
            return Err(self.missing_param("page", "key"));
        }
        let cache_key = format!("page.{key}.{model}");
        if let Some(hit) = self.cache_hit(&cache_key).await {
            return Ok(hit);
        }
        self.set_pending();

        let requests = [
            ApiRequest::new(key, "get.page")
                .param("key", key)
                .param_if("model", model)
                .param("select", "key,subject,header,cover,tags,blocks"),
            ApiRequest::new("childs", "get.pages")
                .param("start_key", key)
                .param("block_type", "rte")
                .param("select", "key,subject,header,cover,tags,blocks"),
        ];
        let mut data = self.run_batch("page", &requests).await?;
        let page = self.check_signal("page", take_alias(&mut data, key))?;
        let childs = self.check_signal("page", take_alias(&mut data, "childs"))?;

        let mut result = match page {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("page".to_string(), other);
                map
            }
        };
        result.insert("childs".to_string(), childs);

        let result = Value::Object(result);
        self.store.set(&cache_key, result.clone()).await;
        self.succeed();
        Ok(result)
    }

    /// Pages related to `key` by shared tags.
    pub async fn get_page_related(&self, key: &str) -> Result<Value, WeftError> {
        if key.is_empty() {
            return Err(self.missing_param("page-related", "key"));
        }
        let cache_key = format!("page.related.{key}");
        if let Some(hit) = self.cache_hit(&cache_key).await {
            return Ok(hit);
        }
        self.set_pending();
        let list = self
            .run_single(
                "page-related",
                ApiRequest::new("related", "get.page.related")
                    .param("key", key)
                    .param("limit", 4)
                    .param("select", SUMMARY_SELECT),
            )
            .await?;
        let result = json!({ "list": list });
        self.store.set(&cache_key, result.clone()).await;
        self.succeed();
        Ok(result)
    }

    /// Full-text search over pages and news, flattened across targets.
    pub async fn get_search_results(&self, keyword: &str) -> Result<Value, WeftError> {
        if keyword.is_empty() {
            return Err(self.missing_param("search-results", "keyword"));
        }
        let cache_key = format!("search.{keyword}");
        if let Some(hit) = self.cache_hit(&cache_key).await {
            return Ok(hit);
        }
        self.set_pending();
        let output = self
            .run_single(
                "search-results",
                ApiRequest::new("search", "get.search.results")
                    .param("keyword", keyword)
                    .param("target", "pages,news"),
            )
            .await?;

        let flattened: Vec<Value> = output
            .as_array()
            .map(|groups| {
                groups
                    .iter()
                    .filter_map(|group| group.get("items").and_then(Value::as_array))
                    .flatten()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let result = Value::Array(flattened);
        self.store.set(&cache_key, result.clone()).await;
        self.succeed();
        Ok(result)
    }

    /// A news window with `previous`/`next` cursors computed against the
    /// pagination index, so paging backwards needs no re-fetch.
    pub async fn get_news(&self, start_date: i64, limit: u32) -> Result<Value, WeftError> {
        let cache_key = news_cache_key(start_date, limit);
        if let Some(hit) = self.cache_hit(&cache_key).await {
            return Ok(hit);
        }
        self.set_pending();

        let index = self.news_index().await;
        let start = if start_date != 0 {
            index.iter().position(|t| *t == start_date).unwrap_or(0)
        } else {
            0
        };

        let mut request = ApiRequest::new("news", "get.news")
            .param("limit", limit)
            .param("select", SUMMARY_SELECT);
        if start_date != 0 {
            request = request.param("start_date", start_date);
        }
        let list = self.run_single("news", request).await?;
        let items = list.as_array().cloned().unwrap_or_default();

        let updated_index = self.merge_news_index(&items).await;
        let previous = start
            .checked_sub(limit as usize)
            .and_then(|i| updated_index.get(i).copied());
        let next = items
            .last()
            .and_then(|article| article.get("timestamp"))
            .and_then(Value::as_i64);

        let result = json!({ "list": items, "previous": previous, "next": next });
        self.store.set(&cache_key, result.clone()).await;
        self.succeed();
        Ok(result)
    }

    /// One article located by its timestamp.
    pub async fn get_news_article(&self, start_date: i64) -> Result<Value, WeftError> {
        if start_date == 0 {
            return Err(self.missing_param("news-article", "start-date"));
        }
        let cache_key = format!("news.article.{start_date}");
        if let Some(hit) = self.cache_hit(&cache_key).await {
            return Ok(hit);
        }
        self.set_pending();
        let output = self
            .run_single(
                "news-article",
                ApiRequest::new("article", "get.news")
                    .param("start_date", start_date)
                    .param("limit", 1)
                    .param("select", "timestamp,subject,header,cover,blocks,tags"),
            )
            .await?;

        let article = output
            .as_array()
            .and_then(|articles| {
                articles
                    .iter()
                    .find(|a| a.get("timestamp").and_then(Value::as_i64) == Some(start_date))
            })
            .cloned();
        let Some(article) = article else {
            let message = format!("no article at timestamp {start_date}");
            self.fail(&message);
            return Err(WeftError::RemoteSignal {
                operation: "news-article".to_string(),
                message,
            });
        };

        self.store.set(&cache_key, article.clone()).await;
        self.succeed();
        Ok(article)
    }

    /// News related to an article; defaults to the newest cached article,
    /// else the start of the current year.
    pub async fn get_news_related(&self, timestamp: i64, limit: u32) -> Result<Value, WeftError> {
        let timestamp = if timestamp != 0 {
            timestamp
        } else {
            self.news_index()
                .await
                .first()
                .copied()
                .unwrap_or_else(default_timestamp)
        };
        let cache_key = format!("news.related.{timestamp}.{limit}");
        if let Some(hit) = self.cache_hit(&cache_key).await {
            return Ok(hit);
        }
        self.set_pending();
        let list = self
            .run_single(
                "news-related",
                ApiRequest::new("related", "get.news.related")
                    .param("timestamp", timestamp)
                    .param("limit", limit)
                    .param("select", SUMMARY_SELECT),
            )
            .await?;
        let result = json!({ "list": list });
        self.store.set(&cache_key, result.clone()).await;
        self.succeed();
        Ok(result)
    }

    /// Single-use submission token for a form page. Never cached, and a
    /// bare string here is the token itself, not an error signal.
    pub async fn get_form_token(&self, key: &str) -> Result<Value, WeftError> {
        self.set_pending();
        let requests = [ApiRequest::new("token", "get.form.token").param("key", key)];
        let mut data = match self.transport.batch(&requests).await {
            Ok(data) => data,
            Err(error) => return Err(self.fold_transport(error)),
        };
        let token = if data.is_object() {
            take_alias(&mut data, "token")
        } else {
            data
        };
        self.succeed();
        Ok(token)
    }

    /// Fetch and attach a submission token when the context carries a form
    /// page key.
    pub async fn attach_form_token(&self, data: &mut Value) -> Result<(), WeftError> {
        let Some(key) = data.get("key").and_then(Value::as_str).map(str::to_string) else {
            return Ok(());
        };
        if key.is_empty() {
            return Ok(());
        }
        let token = self.get_form_token(&key).await?;
        if let Some(map) = data.as_object_mut() {
            map.insert("token".to_string(), token);
        }
        Ok(())
    }

    pub async fn submit_contact_form(
        &self,
        fields: &Map<String, Value>,
    ) -> Result<Value, WeftError> {
        self.submit_form(
            ApiRequest::new("contact-form", "post.contact.form").param("key", "contact"),
            fields,
        )
        .await
    }

    pub async fn submit_page_form(&self, fields: &Map<String, Value>) -> Result<Value, WeftError> {
        self.submit_form(ApiRequest::new("page-form", "post.page.form"), fields)
            .await
    }

    async fn submit_form(
        &self,
        mut request: ApiRequest,
        fields: &Map<String, Value>,
    ) -> Result<Value, WeftError> {
        self.set_pending();
        for (key, value) in fields {
            request = request.param(key.clone(), value.clone());
        }
        let output = match self.transport.post(request).await {
            Ok(output) => output,
            Err(error) => return Err(self.fold_transport(error)),
        };
        self.succeed();
        Ok(output)
    }

    // ─────────────────────────────────────────────────────────────
    // shared plumbing
    // ─────────────────────────────────────────────────────────────

    /// Non-blocking cache probe; a hit completes the call without a network
    /// round trip.
    async fn cache_hit(&self, cache_key: &str) -> Option<Value> {
        let hit = self.store.get(cache_key, RetryPolicy::none()).await?;
        debug!(key = cache_key, "cache hit");
        self.succeed();
        Some(hit)
    }

    async fn run_batch(
        &self,
        operation: &str,
        requests: &[ApiRequest],
    ) -> Result<Value, WeftError> {
        let data = match self.transport.batch(requests).await {
            Ok(data) => data,
            Err(error) => return Err(self.fold_transport(error)),
        };
        self.check_signal(operation, data)
    }

    async fn run_single(
        &self,
        operation: &str,
        request: ApiRequest,
    ) -> Result<Value, WeftError> {
        let alias = request.alias.clone();
        let mut data = self.run_batch(operation, std::slice::from_ref(&request)).await?;
        self.check_signal(operation, take_alias(&mut data, &alias))
    }

    /// The API surfaces failures as a bare string (or falsy value) in place
    /// of data; fold that convention into the status+error contract.
    fn check_signal(&self, operation: &str, value: Value) -> Result<Value, WeftError> {
        if let Value::String(message) = &value {
            let message = message.clone();
            self.fail(&message);
            return Err(WeftError::RemoteSignal {
                operation: operation.to_string(),
                message,
            });
        }
        if !is_truthy(&value) {
            let message = "empty response".to_string();
            self.fail(&message);
            return Err(WeftError::RemoteSignal {
                operation: operation.to_string(),
                message,
            });
        }
        Ok(value)
    }

    /// Ordered timestamp list accumulated across news windows.
    async fn news_index(&self) -> Vec<i64> {
        self.store
            .get(NEWS_INDEX_KEY, RetryPolicy::none())
            .await
            .and_then(|v| {
                v.as_array()
                    .map(|items| items.iter().filter_map(Value::as_i64).collect())
            })
            .unwrap_or_default()
    }

    /// Merge the timestamps of a fetched window into the index and return
    /// the updated ordering.
    async fn merge_news_index(&self, articles: &[Value]) -> Vec<i64> {
        let incoming: Vec<Value> = articles
            .iter()
            .filter_map(|article| article.get("timestamp"))
            .filter(|t| t.is_i64() || t.is_u64())
            .cloned()
            .collect();
        if incoming.is_empty() {
            return self.news_index().await;
        }
        let current: Vec<Value> = self.news_index().await.into_iter().map(Value::from).collect();
        let merged = merge_arrays(current, incoming.clone());
        self.store
            .set(NEWS_INDEX_KEY, Value::Array(incoming))
            .await;
        merged.iter().filter_map(Value::as_i64).collect()
    }

    fn set_pending(&self) {
        let mut state = self.state.lock().expect("client state lock");
        state.status = ApiStatus::Pending;
        state.error.clear();
    }

    fn succeed(&self) {
        let mut state = self.state.lock().expect("client state lock");
        state.status = ApiStatus::Success;
        state.error.clear();
    }

    fn fail(&self, message: &str) {
        let mut state = self.state.lock().expect("client state lock");
        state.status = ApiStatus::Error;
        state.error = message.to_string();
    }

    fn fold_transport(&self, error: WeftError) -> WeftError {
        self.fail(&error.to_string());
        error
    }

    fn missing_param(&self, operation: &str, param: &str) -> WeftError {
        WeftError::MissingParameter {
            operation: operation.to_string(),
            param: param.to_string(),
        }
    }
}

/// Normalized news cache key; a zero start date collapses to the empty
/// segment (`news..2`).
fn news_cache_key(start_date: i64, limit: u32) -> String {
    if start_date == 0 {
        format!("news..{limit}")
    } else {
        format!("news.{start_date}.{limit}")
    }
}

fn take_alias(data: &mut Value, alias: &str) -> Value {
    data.as_object_mut()
        .and_then(|map| map.remove(alias))
        .unwrap_or(Value::Null)
}

/// Midnight of January 1st of the current year, in epoch seconds.
fn default_timestamp() -> i64 {
    use chrono::{Datelike, TimeZone, Utc};
    let now = Utc::now();
    Utc.with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
        .single()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| now.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use serde_json::json;

    fn client_with(responses: Vec<Value>) -> (ContentClient, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::with_responses(responses));
        let client = ContentClient::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            MergeStore::in_memory(),
        );
        (client, transport)
    }

    #[tokio::test]
    async fn news_is_fetched_once_then_served_from_cache() {
        let window = json!({"news": [
            {"timestamp": 100, "subject": "first"},
            {"timestamp": 90, "subject": "second"},
        ]});
        let (client, transport) = client_with(vec![window]);

        let first = client.get_news(0, 2).await.unwrap();
        assert_eq!(first["list"][0]["subject"], "first");
        assert_eq!(first["next"], json!(90));
        assert_eq!(transport.call_count(), 1);

        let second = client.get_news(0, 2).await.unwrap();
        assert_eq!(second, first);
        // identical parameters never reach the transport again
        assert_eq!(transport.call_count(), 1);
        assert_eq!(client.status(), ApiStatus::Success);
        assert!(client.store().probe("news..2").is_some());
    }

    #[tokio::test]
    async fn news_cursors_come_from_the_pagination_index() {
        let (client, _transport) = client_with(vec![
            json!({"news": [{"timestamp": 100}, {"timestamp": 90}]}),
            json!({"news": [{"timestamp": 80}, {"timestamp": 70}]}),
            json!({"news": [{"timestamp": 60}]}),
        ]);
        client.get_news(0, 2).await.unwrap();

        // paging forward with the previous window's next cursor
        let second = client.get_news(90, 2).await.unwrap();
        assert_eq!(second["previous"], Value::Null);
        assert_eq!(second["next"], json!(70));

        // index is now 100, 90, 80, 70; start(70)=3, previous=index[1]
        let third = client.get_news(70, 2).await.unwrap();
        assert_eq!(third["previous"], json!(90));
        assert_eq!(third["next"], json!(60));
    }

    #[tokio::test]
    async fn string_response_is_an_error_signal() {
        let (client, _transport) = client_with(vec![json!("Invalid API key")]);
        let result = client.get_pages("", 4).await;
        assert!(matches!(
            result,
            Err(WeftError::RemoteSignal { ref message, .. }) if message == "Invalid API key"
        ));
        assert_eq!(client.status(), ApiStatus::Error);
        assert_eq!(client.last_error(), "Invalid API key");
    }

    #[tokio::test]
    async fn falsy_response_is_an_error_signal() {
        let (client, _transport) = client_with(vec![json!(null)]);
        let result = client.get_pages("", 4).await;
        assert!(matches!(result, Err(WeftError::RemoteSignal { .. })));
        assert_eq!(client.status(), ApiStatus::Error);
    }

    #[tokio::test]
    async fn page_merges_children_and_caches_under_derived_key() {
        let response = json!({
            "about": {"key": "about", "subject": "About", "blocks": []},
            "childs": [{"key": "team", "subject": "Team"}],
        });
        let (client, transport) = client_with(vec![response]);
        let page = client.get_page("about", "").await.unwrap();
        assert_eq!(page["subject"], "About");
        assert_eq!(page["childs"][0]["key"], "team");
        assert!(client.store().probe("page.about.").is_some());

        let again = client.get_page("about", "").await.unwrap();
        assert_eq!(again, page);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn page_requires_a_key() {
        let (client, transport) = client_with(vec![]);
        assert!(matches!(
            client.get_page("", "").await,
            Err(WeftError::MissingParameter { ref param, .. }) if param == "key"
        ));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn app_wraps_slider_as_a_list() {
        let response = json!({
            "app": {"title": "Site", "meta": {}},
            "nav": [{"key": "home"}],
            "slider": [{"caption": "one"}],
            "contacts": [],
            "locations": [],
            "news": [{"timestamp": 5}],
        });
        let (client, _transport) = client_with(vec![response]);
        let app = client.get_app().await.unwrap();
        assert_eq!(app["slider"]["list"][0]["caption"], "one");
        assert_eq!(client.store().probe("news.index"), Some(json!([5])));
    }

    #[tokio::test]
    async fn search_results_flatten_grouped_items() {
        let response = json!({"search": [
            {"target": "pages", "items": [{"key": "a"}]},
            {"target": "news", "items": [{"timestamp": 1}]},
        ]});
        let (client, _transport) = client_with(vec![response]);
        let results = client.get_search_results("term").await.unwrap();
        assert_eq!(results, json!([{"key": "a"}, {"timestamp": 1}]));
    }

    #[tokio::test]
    async fn news_article_matches_exact_timestamp() {
        let (client, _transport) = client_with(vec![
            json!({"article": [{"timestamp": 42, "subject": "hit"}]}),
            json!({"article": [{"timestamp": 7, "subject": "miss"}]}),
        ]);
        let article = client.get_news_article(42).await.unwrap();
        assert_eq!(article["subject"], "hit");

        let missing = client.get_news_article(9).await;
        assert!(matches!(missing, Err(WeftError::RemoteSignal { .. })));
    }

    #[tokio::test]
    async fn form_token_accepts_a_bare_string() {
        let (client, _transport) = client_with(vec![json!({"token": "t0k3n"})]);
        let token = client.get_form_token("contact").await.unwrap();
        assert_eq!(token, json!("t0k3n"));
        assert_eq!(client.status(), ApiStatus::Success);
    }

    #[tokio::test]
    async fn attach_form_token_decorates_keyed_contexts() {
        let (client, transport) = client_with(vec![json!({"token": "abc"})]);
        let mut data = json!({"key": "contact", "blocks": []});
        client.attach_form_token(&mut data).await.unwrap();
        assert_eq!(data["token"], json!("abc"));

        let mut keyless = json!({"blocks": []});
        client.attach_form_token(&mut keyless).await.unwrap();
        assert!(keyless.get("token").is_none());
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn dispatch_routes_registered_operations() {
        let (client, transport) = client_with(vec![json!({"pages": [{"key": "a"}]})]);
        let params = OperationParams {
            limit: 4,
            ..OperationParams::default()
        };
        let result = client.dispatch(Operation::Pages, &params).await.unwrap();
        assert_eq!(result["list"][0]["key"], "a");
        assert_eq!(transport.batches()[0][0].method, "get.pages");
    }

    #[tokio::test]
    async fn submit_page_form_posts_fields() {
        let (client, transport) = client_with(vec![json!({"ok": true})]);
        let mut fields = Map::new();
        fields.insert("email".to_string(), json!("a@b.c"));
        let output = client.submit_page_form(&fields).await.unwrap();
        assert_eq!(output["ok"], json!(true));
        let batch = &transport.batches()[0];
        assert_eq!(batch[0].method, "post.page.form");
        assert_eq!(batch[0].params.get("email"), Some(&json!("a@b.c")));
    }
}
