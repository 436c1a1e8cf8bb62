//! VPN gateways and their site-to-site connections

use crate::api::{
    client::Client,
    error::ApiError,
    types::{IkeVersion, SyncStatus},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct VpnGateway {
    pub id: String,
    pub name: String,
    pub vpc_id: String,
    #[serde(default)]
    pub public_ip: Option<String>,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VpnConnection {
    pub id: String,
    pub gateway_id: String,
    pub name: String,
    pub peer_address: String,
    #[serde(default)]
    pub peer_cidrs: Vec<String>,
    pub ike_version: IkeVersion,
    #[serde(default)]
    pub tunnel_status: Option<String>,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateVpnGatewayRequest {
    pub name: String,
    pub vpc_id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateVpnGatewayRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateVpnConnectionRequest {
    pub name: String,
    pub peer_address: String,
    pub peer_cidrs: Vec<String>,
    pub pre_shared_key: String,
    pub ike_version: IkeVersion,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateVpnConnectionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_cidrs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_shared_key: Option<String>,
}

pub struct VpnApi<'a> {
    client: &'a Client,
}

impl<'a> VpnApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get_gateway(&self, id: &str) -> Result<VpnGateway, ApiError> {
        self.client
            .get(&format!("/vpn_gateways/{}", id))
            .await
            .map_err(|e| e.for_resource("VPN gateway", id))
    }

    pub async fn create_gateway(
        &self,
        request: &CreateVpnGatewayRequest,
    ) -> Result<VpnGateway, ApiError> {
        self.client.post("/vpn_gateways", request).await
    }

    pub async fn update_gateway(
        &self,
        id: &str,
        request: &UpdateVpnGatewayRequest,
    ) -> Result<VpnGateway, ApiError> {
        self.client
            .patch(&format!("/vpn_gateways/{}", id), request)
            .await
            .map_err(|e| e.for_resource("VPN gateway", id))
    }

    pub async fn delete_gateway(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .delete_empty(&format!("/vpn_gateways/{}", id))
            .await
            .map_err(|e| e.for_resource("VPN gateway", id))
    }

    pub async fn get_connection(
        &self,
        gateway_id: &str,
        id: &str,
    ) -> Result<VpnConnection, ApiError> {
        self.client
            .get(&format!("/vpn_gateways/{}/connections/{}", gateway_id, id))
            .await
            .map_err(|e| e.for_resource("VPN connection", &format!("{}/{}", gateway_id, id)))
    }

    pub async fn create_connection(
        &self,
        gateway_id: &str,
        request: &CreateVpnConnectionRequest,
    ) -> Result<VpnConnection, ApiError> {
        self.client
            .post(&format!("/vpn_gateways/{}/connections", gateway_id), request)
            .await
            .map_err(|e| e.for_resource("VPN gateway", gateway_id))
    }

    pub async fn update_connection(
        &self,
        gateway_id: &str,
        id: &str,
        request: &UpdateVpnConnectionRequest,
    ) -> Result<VpnConnection, ApiError> {
        self.client
            .patch(
                &format!("/vpn_gateways/{}/connections/{}", gateway_id, id),
                request,
            )
            .await
            .map_err(|e| e.for_resource("VPN connection", &format!("{}/{}", gateway_id, id)))
    }

    pub async fn delete_connection(&self, gateway_id: &str, id: &str) -> Result<(), ApiError> {
        self.client
            .delete_empty(&format!("/vpn_gateways/{}/connections/{}", gateway_id, id))
            .await
            .map_err(|e| e.for_resource("VPN connection", &format!("{}/{}", gateway_id, id)))
    }
}
