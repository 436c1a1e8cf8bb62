//! Block storage volumes

use crate::api::{client::Client, common::TaskRef, error::ApiError, types::VolumeType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Volume {
    pub id: String,
    pub name: String,
    pub size_gb: u32,
    pub volume_type: VolumeType,
    #[serde(default)]
    pub status: Option<String>,
    /// Instance the volume is attached to
    #[serde(default)]
    pub attached_to: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateVolumeRequest {
    pub name: String,
    pub size_gb: u32,
    pub volume_type: VolumeType,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateVolumeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Volumes can only grow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_gb: Option<u32>,
}

pub struct VolumesApi<'a> {
    client: &'a Client,
}

impl<'a> VolumesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str) -> Result<Volume, ApiError> {
        self.client
            .get(&format!("/volumes/{}", id))
            .await
            .map_err(|e| e.for_resource("volume", id))
    }

    pub async fn create(&self, request: &CreateVolumeRequest) -> Result<TaskRef, ApiError> {
        self.client.post("/volumes", request).await
    }

    pub async fn update(&self, id: &str, request: &UpdateVolumeRequest) -> Result<TaskRef, ApiError> {
        self.client
            .patch(&format!("/volumes/{}", id), request)
            .await
            .map_err(|e| e.for_resource("volume", id))
    }

    pub async fn delete(&self, id: &str) -> Result<TaskRef, ApiError> {
        self.client
            .delete(&format!("/volumes/{}", id))
            .await
            .map_err(|e| e.for_resource("volume", id))
    }
}
