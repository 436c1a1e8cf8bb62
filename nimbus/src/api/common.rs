//! Common types and utilities for the Nimbus API

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// Returned by every task-based mutation
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TaskRef {
    pub task_id: String,
    #[serde(default)]
    pub resource_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ApiQueryParams {
    params: Vec<(String, String)>,
}

impl ApiQueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.push((key.into(), v.to_string()));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        if self.params.is_empty() {
            String::new()
        } else {
            format!(
                "?{}",
                self.params
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_encodes_values() {
        let params = ApiQueryParams::new()
            .add("name", "web tier")
            .add_optional("vpc_id", None::<String>)
            .add_optional("os", Some("ubuntu"));

        assert_eq!(params.to_query_string(), "?name=web%20tier&os=ubuntu");
        assert_eq!(ApiQueryParams::new().to_query_string(), "");
    }

    #[test]
    fn task_ref_tolerates_missing_resource_id() {
        let task: TaskRef = serde_json::from_str(r#"{"task_id":"t-1"}"#).unwrap();
        assert_eq!(task.task_id, "t-1");
        assert!(task.resource_id.is_none());
    }
}
