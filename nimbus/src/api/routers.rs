//! Routers, which converge in the background and report `sync_status`

use crate::api::{client::Client, error::ApiError, types::SyncStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Router {
    pub id: String,
    pub name: String,
    pub vpc_id: String,
    #[serde(default)]
    pub external_gateway: bool,
    #[serde(default)]
    pub external_ip: Option<String>,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRouterRequest {
    pub name: String,
    pub vpc_id: String,
    pub external_gateway: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateRouterRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_gateway: Option<bool>,
}

pub struct RoutersApi<'a> {
    client: &'a Client,
}

impl<'a> RoutersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str) -> Result<Router, ApiError> {
        self.client
            .get(&format!("/routers/{}", id))
            .await
            .map_err(|e| e.for_resource("router", id))
    }

    pub async fn create(&self, request: &CreateRouterRequest) -> Result<Router, ApiError> {
        self.client.post("/routers", request).await
    }

    pub async fn update(&self, id: &str, request: &UpdateRouterRequest) -> Result<Router, ApiError> {
        self.client
            .patch(&format!("/routers/{}", id), request)
            .await
            .map_err(|e| e.for_resource("router", id))
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .delete_empty(&format!("/routers/{}", id))
            .await
            .map_err(|e| e.for_resource("router", id))
    }
}
