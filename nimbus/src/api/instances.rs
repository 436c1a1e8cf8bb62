//! Compute instances and their volume attachments

use crate::api::{client::Client, common::TaskRef, error::ApiError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub flavor_id: String,
    pub image_id: String,
    pub network_id: String,
    #[serde(default)]
    pub private_ip: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub volume_ids: Vec<String>,
    #[serde(default)]
    pub floating_ip_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateInstanceRequest {
    pub name: String,
    pub flavor_id: String,
    pub image_id: String,
    pub network_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateInstanceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Changing the flavor resizes the instance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct AttachVolumeRequest<'r> {
    volume_id: &'r str,
}

pub struct InstancesApi<'a> {
    client: &'a Client,
}

impl<'a> InstancesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str) -> Result<Instance, ApiError> {
        self.client
            .get(&format!("/instances/{}", id))
            .await
            .map_err(|e| e.for_resource("instance", id))
    }

    pub async fn create(&self, request: &CreateInstanceRequest) -> Result<TaskRef, ApiError> {
        self.client.post("/instances", request).await
    }

    pub async fn update(&self, id: &str, request: &UpdateInstanceRequest) -> Result<TaskRef, ApiError> {
        self.client
            .patch(&format!("/instances/{}", id), request)
            .await
            .map_err(|e| e.for_resource("instance", id))
    }

    pub async fn delete(&self, id: &str) -> Result<TaskRef, ApiError> {
        self.client
            .delete(&format!("/instances/{}", id))
            .await
            .map_err(|e| e.for_resource("instance", id))
    }

    /// POST /v1/instances/{id}/volumes
    pub async fn attach_volume(&self, id: &str, volume_id: &str) -> Result<TaskRef, ApiError> {
        self.client
            .post(
                &format!("/instances/{}/volumes", id),
                &AttachVolumeRequest { volume_id },
            )
            .await
            .map_err(|e| e.for_resource("instance", id))
    }

    /// DELETE /v1/instances/{id}/volumes/{volume_id}
    pub async fn detach_volume(&self, id: &str, volume_id: &str) -> Result<TaskRef, ApiError> {
        self.client
            .delete(&format!("/instances/{}/volumes/{}", id, volume_id))
            .await
            .map_err(|e| e.for_resource("volume attachment", &format!("{}/{}", id, volume_id)))
    }
}
