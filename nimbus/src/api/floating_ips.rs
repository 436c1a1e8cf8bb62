//! Floating (public) IP addresses

use crate::api::{client::Client, error::ApiError, types::SyncStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct FloatingIp {
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instance_id: Option<String>,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateFloatingIpRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateFloatingIpRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct AssignRequest<'r> {
    instance_id: &'r str,
}

pub struct FloatingIpsApi<'a> {
    client: &'a Client,
}

impl<'a> FloatingIpsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str) -> Result<FloatingIp, ApiError> {
        self.client
            .get(&format!("/floating_ips/{}", id))
            .await
            .map_err(|e| e.for_resource("floating IP", id))
    }

    pub async fn create(&self, request: &CreateFloatingIpRequest) -> Result<FloatingIp, ApiError> {
        self.client.post("/floating_ips", request).await
    }

    pub async fn update(
        &self,
        id: &str,
        request: &UpdateFloatingIpRequest,
    ) -> Result<FloatingIp, ApiError> {
        self.client
            .patch(&format!("/floating_ips/{}", id), request)
            .await
            .map_err(|e| e.for_resource("floating IP", id))
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .delete_empty(&format!("/floating_ips/{}", id))
            .await
            .map_err(|e| e.for_resource("floating IP", id))
    }

    /// POST /v1/floating_ips/{id}/assign
    pub async fn assign(&self, id: &str, instance_id: &str) -> Result<FloatingIp, ApiError> {
        self.client
            .post(
                &format!("/floating_ips/{}/assign", id),
                &AssignRequest { instance_id },
            )
            .await
            .map_err(|e| e.for_resource("floating IP", id))
    }

    /// POST /v1/floating_ips/{id}/unassign
    pub async fn unassign(&self, id: &str) -> Result<FloatingIp, ApiError> {
        self.client
            .post(&format!("/floating_ips/{}/unassign", id), &serde_json::json!({}))
            .await
            .map_err(|e| e.for_resource("floating IP", id))
    }
}
