//! HTTP client for the remote task service.
//!
//! Each operation is a single request/response cycle against `/todos`.
//! Retry and fallback policy lives in the reconciliation engine.
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Response, StatusCode};
use serde_json::Value;

use crate::{Config, RemoteTask, Result, ServerStatus, Task, TaskChanges, TaskId, TodoError};

/// Result of a delete request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The server answered 404; the task is already gone.
    AlreadyGone,
}

/// CRUD operations of the task service.
#[async_trait]
pub trait TaskService: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<RemoteTask>>;

    async fn create_task(&self, task: &Task) -> Result<Task>;

    async fn update_task(&self, id: TaskId, changes: &TaskChanges) -> Result<Task>;

    async fn delete_task(&self, id: TaskId) -> Result<DeleteOutcome>;

    /// Lightweight reachability probe.
    async fn ping(&self) -> ServerStatus {
        match self.list_tasks().await {
            Ok(_) => ServerStatus::Online,
            Err(e) => {
                debug!("Server status check failed: {}", e);
                ServerStatus::Offline
            }
        }
    }
}

/// `TaskService` over plain HTTP with JSON bodies.
#[derive(Clone)]
pub struct HttpTaskService {
    base_url: String,
    http: reqwest::Client,
}

impl HttpTaskService {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, None)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_timeout(&config.api_url, config.request_timeout())
    }

    pub fn with_timeout(base_url: &str, timeout: Option<std::time::Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| TodoError::ConfigError {
            message: format!("Failed to build HTTP client: {}", e),
        })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        format!("{}/todos", self.base_url)
    }

    fn item_url(&self, id: TaskId) -> String {
        format!("{}/todos/{}", self.base_url, id)
    }
}

#[async_trait]
impl TaskService for HttpTaskService {
    async fn list_tasks(&self) -> Result<Vec<RemoteTask>> {
        let url = self.collection_url();
        debug!("GET {}", url);
        let resp = self.http.get(&url).send().await?;
        let resp = ensure_success(resp).await?;
        let tasks: Vec<RemoteTask> = resp.json().await?;
        debug!("Fetched {} tasks from server", tasks.len());
        Ok(tasks)
    }

    async fn create_task(&self, task: &Task) -> Result<Task> {
        let url = self.collection_url();
        debug!("POST {} (provisional id {})", url, task.id);
        let resp = self.http.post(&url).json(task).send().await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json().await?)
    }

    async fn update_task(&self, id: TaskId, changes: &TaskChanges) -> Result<Task> {
        let url = self.item_url(id);
        debug!("PUT {}", url);
        let resp = self.http.put(&url).json(changes).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(TodoError::NotFound { id });
        }
        let resp = ensure_success(resp).await?;
        Ok(resp.json().await?)
    }

    async fn delete_task(&self, id: TaskId) -> Result<DeleteOutcome> {
        let url = self.item_url(id);
        debug!("DELETE {}", url);
        let resp = self.http.delete(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            warn!("Server has no task {}, treating as already deleted", id);
            return Ok(DeleteOutcome::AlreadyGone);
        }
        ensure_success(resp).await?;
        Ok(DeleteOutcome::Deleted)
    }
}

async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = server_error_detail(&body);
    warn!("Server answered {}: {}", status, message);
    Err(TodoError::Server {
        status: status.as_u16(),
        message,
    })
}

/// Picks a readable message out of an error body: a JSON `message` or
/// `error` field, else the raw text when it is short.
fn server_error_detail(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        for field in ["message", "error"] {
            if let Some(text) = json.get(field).and_then(Value::as_str) {
                return text.to_string();
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.len() < 100 {
        trimmed.to_string()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_detail_prefers_json_fields() {
        assert_eq!(server_error_detail(r#"{"message":"boom"}"#), "boom");
        assert_eq!(server_error_detail(r#"{"error":"nope"}"#), "nope");
        assert_eq!(server_error_detail("Bad Gateway"), "Bad Gateway");
        assert_eq!(server_error_detail(&"x".repeat(150)), "");
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let service = HttpTaskService::new("http://localhost:3000/").unwrap();
        assert_eq!(service.collection_url(), "http://localhost:3000/todos");
        assert_eq!(service.item_url(12), "http://localhost:3000/todos/12");
    }
}
