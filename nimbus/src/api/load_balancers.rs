//! Load balancers

use crate::api::{
    client::Client,
    common::TaskRef,
    error::ApiError,
    types::{Algorithm, Protocol},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Listener {
    pub protocol: Protocol,
    pub port: u16,
    pub target_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadBalancer {
    pub id: String,
    pub name: String,
    pub network_id: String,
    pub algorithm: Algorithm,
    #[serde(default)]
    pub vip_address: Option<String>,
    #[serde(default)]
    pub listeners: Vec<Listener>,
    #[serde(default)]
    pub member_ids: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateLoadBalancerRequest {
    pub name: String,
    pub network_id: String,
    pub algorithm: Algorithm,
    pub listeners: Vec<Listener>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateLoadBalancerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<Algorithm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listeners: Option<Vec<Listener>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_ids: Option<Vec<String>>,
}

pub struct LoadBalancersApi<'a> {
    client: &'a Client,
}

impl<'a> LoadBalancersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str) -> Result<LoadBalancer, ApiError> {
        self.client
            .get(&format!("/load_balancers/{}", id))
            .await
            .map_err(|e| e.for_resource("load balancer", id))
    }

    pub async fn create(&self, request: &CreateLoadBalancerRequest) -> Result<TaskRef, ApiError> {
        self.client.post("/load_balancers", request).await
    }

    pub async fn update(
        &self,
        id: &str,
        request: &UpdateLoadBalancerRequest,
    ) -> Result<TaskRef, ApiError> {
        self.client
            .patch(&format!("/load_balancers/{}", id), request)
            .await
            .map_err(|e| e.for_resource("load balancer", id))
    }

    pub async fn delete(&self, id: &str) -> Result<TaskRef, ApiError> {
        self.client
            .delete(&format!("/load_balancers/{}", id))
            .await
            .map_err(|e| e.for_resource("load balancer", id))
    }
}
