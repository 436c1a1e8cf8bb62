//! Key/value tags on any resource. Tag calls complete synchronously.

use crate::api::{client::Client, common::ApiQueryParams, error::ApiError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Tag {
    pub resource_id: String,
    pub key: String,
    pub value: String,
}

pub struct TagsApi<'a> {
    client: &'a Client,
}

impl<'a> TagsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(&self, resource_id: &str) -> Result<Vec<Tag>, ApiError> {
        let params = ApiQueryParams::new().add("resource_id", resource_id);
        self.client.get_with_params("/tags", &params).await
    }

    /// Reads one tag; a missing key is reported as NotFound
    pub async fn get(&self, resource_id: &str, key: &str) -> Result<Tag, ApiError> {
        self.list(resource_id)
            .await
            .map_err(|e| e.for_resource("resource", resource_id))?
            .into_iter()
            .find(|tag| tag.key == key)
            .ok_or_else(|| ApiError::NotFound {
                kind: "tag".to_string(),
                id: format!("{}/{}", resource_id, key),
            })
    }

    /// POST /v1/tags, creating the tag or replacing its value
    pub async fn set(&self, tag: &Tag) -> Result<Tag, ApiError> {
        self.client
            .post("/tags", tag)
            .await
            .map_err(|e| e.for_resource("resource", &tag.resource_id))
    }

    pub async fn delete(&self, resource_id: &str, key: &str) -> Result<(), ApiError> {
        let params = ApiQueryParams::new()
            .add("resource_id", resource_id)
            .add("key", key);
        self.client
            .delete_empty(&format!("/tags{}", params.to_query_string()))
            .await
            .map_err(|e| e.for_resource("tag", &format!("{}/{}", resource_id, key)))
    }
}
