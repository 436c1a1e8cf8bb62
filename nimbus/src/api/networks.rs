//! Networks (subnets) inside a VPC

use crate::api::{
    client::Client,
    common::ApiQueryParams,
    error::ApiError,
    types::SyncStatus,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub vpc_id: String,
    #[serde(default)]
    pub router_id: Option<String>,
    pub cidr_block: String,
    #[serde(default)]
    pub gateway_ip: Option<String>,
    #[serde(default)]
    pub dns_servers: Vec<String>,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateNetworkRequest {
    pub name: String,
    pub vpc_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router_id: Option<String>,
    pub cidr_block: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_servers: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateNetworkRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_servers: Option<Vec<String>>,
}

pub struct NetworksApi<'a> {
    client: &'a Client,
}

impl<'a> NetworksApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(&self, vpc_id: Option<&str>, name: Option<&str>) -> Result<Vec<Network>, ApiError> {
        let params = ApiQueryParams::new()
            .add_optional("vpc_id", vpc_id)
            .add_optional("name", name);
        self.client.get_with_params("/networks", &params).await
    }

    pub async fn get(&self, id: &str) -> Result<Network, ApiError> {
        self.client
            .get(&format!("/networks/{}", id))
            .await
            .map_err(|e| e.for_resource("network", id))
    }

    pub async fn create(&self, request: &CreateNetworkRequest) -> Result<Network, ApiError> {
        self.client.post("/networks", request).await
    }

    pub async fn update(&self, id: &str, request: &UpdateNetworkRequest) -> Result<Network, ApiError> {
        self.client
            .patch(&format!("/networks/{}", id), request)
            .await
            .map_err(|e| e.for_resource("network", id))
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .delete_empty(&format!("/networks/{}", id))
            .await
            .map_err(|e| e.for_resource("network", id))
    }
}
