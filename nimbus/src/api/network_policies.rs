//! Network policies, which bind a default action and an optional firewall
//! policy to a network

use crate::api::{client::Client, common::TaskRef, error::ApiError, types::DefaultAction};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkPolicy {
    pub id: String,
    pub name: String,
    pub network_id: String,
    pub default_action: DefaultAction,
    #[serde(default)]
    pub firewall_policy_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateNetworkPolicyRequest {
    pub name: String,
    pub network_id: String,
    pub default_action: DefaultAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firewall_policy_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateNetworkPolicyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_action: Option<DefaultAction>,
    /// `Some(None)` detaches the firewall policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firewall_policy_id: Option<Option<String>>,
}

pub struct NetworkPoliciesApi<'a> {
    client: &'a Client,
}

impl<'a> NetworkPoliciesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str) -> Result<NetworkPolicy, ApiError> {
        self.client
            .get(&format!("/network_policies/{}", id))
            .await
            .map_err(|e| e.for_resource("network policy", id))
    }

    pub async fn create(&self, request: &CreateNetworkPolicyRequest) -> Result<TaskRef, ApiError> {
        self.client.post("/network_policies", request).await
    }

    pub async fn update(
        &self,
        id: &str,
        request: &UpdateNetworkPolicyRequest,
    ) -> Result<TaskRef, ApiError> {
        self.client
            .patch(&format!("/network_policies/{}", id), request)
            .await
            .map_err(|e| e.for_resource("network policy", id))
    }

    pub async fn delete(&self, id: &str) -> Result<TaskRef, ApiError> {
        self.client
            .delete(&format!("/network_policies/{}", id))
            .await
            .map_err(|e| e.for_resource("network policy", id))
    }
}
