//! Firewall policies and the rules inside them
//!
//! Rule changes are applied to the parent policy in the background, so the
//! policy's `sync_status` is what callers wait on after touching a rule.

use crate::api::{
    client::Client,
    error::ApiError,
    types::{Action, Direction, Protocol, SyncStatus},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct FirewallPolicy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: Vec<FirewallRule>,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirewallRule {
    pub id: String,
    pub direction: Direction,
    pub action: Action,
    pub protocol: Protocol,
    #[serde(default)]
    pub port_range_min: Option<u16>,
    #[serde(default)]
    pub port_range_max: Option<u16>,
    #[serde(default)]
    pub remote_cidr: Option<String>,
    pub priority: u32,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateFirewallPolicyRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateFirewallPolicyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FirewallRuleRequest {
    pub direction: Direction,
    pub action: Action,
    pub protocol: Protocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range_min: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range_max: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_cidr: Option<String>,
    pub priority: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub struct FirewallApi<'a> {
    client: &'a Client,
}

impl<'a> FirewallApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get_policy(&self, id: &str) -> Result<FirewallPolicy, ApiError> {
        self.client
            .get(&format!("/firewall_policies/{}", id))
            .await
            .map_err(|e| e.for_resource("firewall policy", id))
    }

    pub async fn create_policy(
        &self,
        request: &CreateFirewallPolicyRequest,
    ) -> Result<FirewallPolicy, ApiError> {
        self.client.post("/firewall_policies", request).await
    }

    pub async fn update_policy(
        &self,
        id: &str,
        request: &UpdateFirewallPolicyRequest,
    ) -> Result<FirewallPolicy, ApiError> {
        self.client
            .patch(&format!("/firewall_policies/{}", id), request)
            .await
            .map_err(|e| e.for_resource("firewall policy", id))
    }

    pub async fn delete_policy(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .delete_empty(&format!("/firewall_policies/{}", id))
            .await
            .map_err(|e| e.for_resource("firewall policy", id))
    }

    pub async fn get_rule(&self, policy_id: &str, rule_id: &str) -> Result<FirewallRule, ApiError> {
        self.client
            .get(&format!("/firewall_policies/{}/rules/{}", policy_id, rule_id))
            .await
            .map_err(|e| e.for_resource("firewall rule", &format!("{}/{}", policy_id, rule_id)))
    }

    pub async fn create_rule(
        &self,
        policy_id: &str,
        request: &FirewallRuleRequest,
    ) -> Result<FirewallRule, ApiError> {
        self.client
            .post(&format!("/firewall_policies/{}/rules", policy_id), request)
            .await
            .map_err(|e| e.for_resource("firewall policy", policy_id))
    }

    pub async fn update_rule(
        &self,
        policy_id: &str,
        rule_id: &str,
        request: &FirewallRuleRequest,
    ) -> Result<FirewallRule, ApiError> {
        self.client
            .patch(
                &format!("/firewall_policies/{}/rules/{}", policy_id, rule_id),
                request,
            )
            .await
            .map_err(|e| e.for_resource("firewall rule", &format!("{}/{}", policy_id, rule_id)))
    }

    pub async fn delete_rule(&self, policy_id: &str, rule_id: &str) -> Result<(), ApiError> {
        self.client
            .delete_empty(&format!("/firewall_policies/{}/rules/{}", policy_id, rule_id))
            .await
            .map_err(|e| e.for_resource("firewall rule", &format!("{}/{}", policy_id, rule_id)))
    }
}
