//! Virtual private clouds

use crate::api::{
    client::Client,
    common::{ApiQueryParams, TaskRef},
    error::ApiError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Vpc {
    pub id: String,
    pub name: String,
    pub cidr_block: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateVpcRequest {
    pub name: String,
    pub cidr_block: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateVpcRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub struct VpcsApi<'a> {
    client: &'a Client,
}

impl<'a> VpcsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v1/vpcs
    pub async fn list(&self, name: Option<&str>) -> Result<Vec<Vpc>, ApiError> {
        let params = ApiQueryParams::new().add_optional("name", name);
        self.client.get_with_params("/vpcs", &params).await
    }

    /// GET /v1/vpcs/{id}
    pub async fn get(&self, id: &str) -> Result<Vpc, ApiError> {
        self.client
            .get(&format!("/vpcs/{}", id))
            .await
            .map_err(|e| e.for_resource("vpc", id))
    }

    /// POST /v1/vpcs
    pub async fn create(&self, request: &CreateVpcRequest) -> Result<TaskRef, ApiError> {
        self.client.post("/vpcs", request).await
    }

    /// PATCH /v1/vpcs/{id}
    pub async fn update(&self, id: &str, request: &UpdateVpcRequest) -> Result<TaskRef, ApiError> {
        self.client
            .patch(&format!("/vpcs/{}", id), request)
            .await
            .map_err(|e| e.for_resource("vpc", id))
    }

    /// DELETE /v1/vpcs/{id}
    pub async fn delete(&self, id: &str) -> Result<TaskRef, ApiError> {
        self.client
            .delete(&format!("/vpcs/{}", id))
            .await
            .map_err(|e| e.for_resource("vpc", id))
    }
}
