use crate::config::MeilisearchConfig;
use crate::error::SearchError;
use crate::models::{EngineQuery, EngineSearchResponse, IndexSettings, IndexedDocument};
use crate::traits::SearchIndex;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};
use url::Url;

const BACKEND: &str = "meilisearch";
const PRIMARY_KEY: &str = "id";
const TASK_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub const HIGHLIGHTED_ATTRIBUTES: [&str; 4] = ["name", "title", "form_no", "content"];
pub const CROPPED_ATTRIBUTES: [&str; 1] = ["content"];

pub struct MeilisearchStore {
    client: Client,
    base: Url,
    index: String,
    api_key: Option<String>,
    wait_for_tasks: bool,
    task_timeout: Duration,
}

impl MeilisearchStore {
    pub fn new(config: &MeilisearchConfig) -> Result<Self, SearchError> {
        let mut host = config.host.trim().to_string();
        if !host.ends_with('/') {
            host.push('/');
        }

        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            base: Url::parse(&host)?,
            index: config.index.clone(),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            wait_for_tasks: config.wait_for_tasks,
            task_timeout: config.task_timeout,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, SearchError> {
        Ok(self.base.join(path)?)
    }

    fn index_endpoint(&self, suffix: &str) -> Result<Url, SearchError> {
        self.endpoint(&format!("indexes/{}{}", self.index, suffix))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SearchError> {
        let response = self.authorized(request).send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(SearchError::BackendResponse {
            backend: BACKEND.to_string(),
            details: format!("{status}: {}", error_message(&body)),
        })
    }

    async fn enqueue(&self, request: RequestBuilder) -> Result<(), SearchError> {
        let task: Value = self.send(request).await?.json().await?;
        let uid = task_uid(&task).ok_or_else(|| SearchError::BackendResponse {
            backend: BACKEND.to_string(),
            details: format!("response carries no task uid: {task}"),
        })?;

        if self.wait_for_tasks {
            self.wait_for_task(uid).await?;
        }
        Ok(())
    }

    pub async fn wait_for_task(&self, uid: u64) -> Result<(), SearchError> {
        let deadline = Instant::now() + self.task_timeout;
        let url = self.endpoint(&format!("tasks/{uid}"))?;

        loop {
            let task: Value = self.send(self.client.get(url.clone())).await?.json().await?;
            let status = task.get("status").and_then(Value::as_str).unwrap_or_default();

            match status {
                "succeeded" => {
                    debug!(task = uid, "engine task succeeded");
                    return Ok(());
                }
                "failed" | "canceled" => {
                    return Err(SearchError::Task {
                        uid,
                        status: status.to_string(),
                        details: task
                            .pointer("/error/message")
                            .and_then(Value::as_str)
                            .unwrap_or("no details")
                            .to_string(),
                    });
                }
                _ => {}
            }

            if Instant::now() >= deadline {
                return Err(SearchError::TaskTimeout(uid));
            }
            sleep(TASK_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl SearchIndex for MeilisearchStore {
    async fn ensure_index(&self) -> Result<(), SearchError> {
        let response = self
            .authorized(self.client.get(self.index_endpoint("")?))
            .send()
            .await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        info!(index = %self.index, "creating search index");
        self.enqueue(
            self.client
                .post(self.endpoint("indexes")?)
                .json(&json!({"uid": self.index, "primaryKey": PRIMARY_KEY})),
        )
        .await
    }

    async fn update_settings(&self, settings: &IndexSettings) -> Result<(), SearchError> {
        self.enqueue(self.client.patch(self.index_endpoint("/settings")?).json(settings))
            .await
    }

    async fn add_documents(&self, documents: &[IndexedDocument]) -> Result<(), SearchError> {
        if documents.is_empty() {
            return Ok(());
        }

        let mut url = self.index_endpoint("/documents")?;
        url.query_pairs_mut().append_pair("primaryKey", PRIMARY_KEY);
        self.enqueue(self.client.post(url).json(documents)).await
    }

    async fn search(&self, query: &EngineQuery) -> Result<EngineSearchResponse, SearchError> {
        let response = self
            .send(
                self.client
                    .post(self.index_endpoint("/search")?)
                    .json(&search_body(query)),
            )
            .await?;
        Ok(response.json().await?)
    }

    async fn stats(&self) -> Result<Value, SearchError> {
        let response = self.send(self.client.get(self.index_endpoint("/stats")?)).await?;
        Ok(response.json().await?)
    }

    async fn delete_all_documents(&self) -> Result<(), SearchError> {
        self.enqueue(self.client.delete(self.index_endpoint("/documents")?))
            .await
    }

    async fn health(&self) -> Result<bool, SearchError> {
        let response = self.send(self.client.get(self.endpoint("health")?)).await?;
        let body: Value = response.json().await?;
        Ok(body.get("status").and_then(Value::as_str) == Some("available"))
    }
}

fn search_body(query: &EngineQuery) -> Value {
    let mut body = json!({
        "q": query.query,
        "limit": query.limit,
        "offset": query.offset,
        "attributesToHighlight": HIGHLIGHTED_ATTRIBUTES,
        "attributesToCrop": CROPPED_ATTRIBUTES,
        "cropLength": query.crop_length,
        "showMatchesPosition": true,
    });

    if let Some(filter) = query.filter.as_deref().filter(|filter| !filter.trim().is_empty()) {
        body["filter"] = Value::String(filter.to_string());
    }
    body
}

// Newer engines report `taskUid`, older ones `uid`.
fn task_uid(task: &Value) -> Option<u64> {
    task.get("taskUid")
        .or_else(|| task.get("uid"))
        .and_then(Value::as_u64)
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
