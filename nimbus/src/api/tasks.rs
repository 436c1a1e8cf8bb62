//! Asynchronous task records

use crate::api::{client::Client, error::ApiError, types::TaskStatus};
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

pub struct TasksApi<'a> {
    client: &'a Client,
}

impl<'a> TasksApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v1/tasks/{id}
    pub async fn get(&self, task_id: &str) -> Result<Task, ApiError> {
        let path = format!("/tasks/{}", task_id);
        self.client
            .get(&path)
            .await
            .map_err(|e| e.for_resource("task", task_id))
    }
}
