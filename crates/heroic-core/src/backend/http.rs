//! REST remote store.
//!
//! Layout under the configured base URL:
//!
//! - `GET/POST /users/{owner}/tasks`
//! - `PUT/DELETE /users/{owner}/tasks/{id}`
//! - `GET/PUT /users/{owner}/progress`
//!
//! Requests carry `Authorization: Bearer <token>` when a token is configured.
//! HTTP has no push channel, so live updates come from [`RemoteStore::sync`]
//! re-listing the collection and publishing it when it changed.

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use url::Url;

use super::remote::{RemoteStore, SnapshotFeeds, Subscription};
use crate::error::StoreError;
use crate::progress::Progress;
use crate::storage::RemoteConfig;
use crate::task::{sort_newest_first, Task, TaskDraft};

/// Body of a create request. The server fills in `id` and `createdAt`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewTask<'a> {
    #[serde(flatten)]
    draft: &'a TaskDraft,
    completed: bool,
    xp_earned: u32,
    xp_awarded_at: Option<DateTime<Utc>>,
}

pub struct HttpRemoteStore {
    base_url: Url,
    token: Option<String>,
    client: Client,
    runtime: tokio::runtime::Runtime,
    feeds: SnapshotFeeds,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::NotConfigured(format!("invalid base url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::NotConfigured(format!(
                "base url {base_url} cannot hold paths"
            )));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            base_url,
            token,
            client: Client::new(),
            runtime,
            feeds: SnapshotFeeds::new(),
        })
    }

    pub fn from_config(config: &RemoteConfig) -> Result<Self, StoreError> {
        let base_url = config
            .base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| StoreError::NotConfigured("remote.base_url is not set".into()))?;
        Self::new(base_url, config.api_token.clone())
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let request = self.authorize(request);
        self.runtime
            .block_on(request.send())
            .map_err(|e| StoreError::Unreachable(e.to_string()))
    }

    fn fetch_tasks(&self, owner: &str) -> Result<Vec<Task>, StoreError> {
        let response = check(self.send(self.client.get(self.url(&["users", owner, "tasks"])))?)?;
        let mut tasks: Vec<Task> = self.runtime.block_on(response.json())?;
        sort_newest_first(&mut tasks);
        Ok(tasks)
    }

    /// Re-list for listeners after a mutation. Failures only cost freshness.
    fn refresh_feed(&self, owner: &str) {
        if !self.feeds.has_subscribers(owner) {
            return;
        }
        match self.fetch_tasks(owner) {
            Ok(tasks) => self.feeds.publish(owner, tasks),
            Err(e) => tracing::warn!(error = %e, owner, "failed to refresh task feed"),
        }
    }
}

/// Map non-success statuses onto store errors.
fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    Err(match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(url),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StoreError::Rejected(format!("{status} for {url}"))
        }
        s if s.is_server_error() => StoreError::Unreachable(format!("{status} for {url}")),
        _ => StoreError::Rejected(format!("{status} for {url}")),
    })
}

impl RemoteStore for HttpRemoteStore {
    fn name(&self) -> &str {
        "http"
    }

    fn list_tasks(&self, owner: &str) -> Result<Vec<Task>, StoreError> {
        self.fetch_tasks(owner)
    }

    fn add_task(&self, owner: &str, draft: &TaskDraft) -> Result<Task, StoreError> {
        let body = NewTask {
            draft,
            completed: false,
            xp_earned: draft.priority.xp_reward(),
            xp_awarded_at: None,
        };
        let request = self.client.post(self.url(&["users", owner, "tasks"])).json(&body);
        let response = check(self.send(request)?)?;
        let task: Task = self.runtime.block_on(response.json())?;
        tracing::debug!(owner, task_id = task.id(), "created remote task");
        self.refresh_feed(owner);
        Ok(task)
    }

    fn update_task(&self, owner: &str, task: &Task) -> Result<(), StoreError> {
        let request = self
            .client
            .put(self.url(&["users", owner, "tasks", task.id()]))
            .json(task);
        check(self.send(request)?)?;
        self.refresh_feed(owner);
        Ok(())
    }

    fn delete_task(&self, owner: &str, id: &str) -> Result<(), StoreError> {
        let request = self.client.delete(self.url(&["users", owner, "tasks", id]));
        check(self.send(request)?)?;
        self.refresh_feed(owner);
        Ok(())
    }

    fn get_progress(&self, owner: &str) -> Result<Option<Progress>, StoreError> {
        let response = self.send(self.client.get(self.url(&["users", owner, "progress"])))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check(response)?;
        Ok(Some(self.runtime.block_on(response.json())?))
    }

    fn set_progress(&self, owner: &str, progress: &Progress) -> Result<(), StoreError> {
        let request = self
            .client
            .put(self.url(&["users", owner, "progress"]))
            .json(progress);
        check(self.send(request)?)?;
        Ok(())
    }

    fn subscribe(&self, owner: &str) -> Result<Subscription, StoreError> {
        let current = self.fetch_tasks(owner)?;
        Ok(self.feeds.subscribe(owner, current))
    }

    fn sync(&self, owner: &str) -> Result<(), StoreError> {
        if self.feeds.has_subscribers(owner) {
            let tasks = self.fetch_tasks(owner)?;
            self.feeds.publish(owner, tasks);
        }
        Ok(())
    }
}
