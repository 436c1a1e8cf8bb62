//! VPN connection resource implementation
//!
//! Connections belong to a gateway and are serialized on the gateway's ID,
//! since the gateway rebuilds its tunnel configuration on every change.
//! The pre-shared key is never returned by the API and is carried over
//! from the configuration.

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::import::import_state_parts;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::timeouts::Timeouts;
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::{CidrBlock, StringLength, StringMatches};

use super::{
    attr, configure_slot, create_response, delete_response, deleted, found, id_from_state,
    not_configured, partial_state, read_response, timeouts_from, update_response, ConfigReader,
    Failure, OpResult, StateBuilder, DEFAULT_TIMEOUTS, MUTATING_TIMEOUTS,
};
use crate::api::vpn::{CreateVpnConnectionRequest, UpdateVpnConnectionRequest, VpnConnection};
use crate::api::IkeVersion;
use crate::provider_data::NimbusProviderData;
use crate::wait::{wait_for_deleted, wait_for_sync, PollSpec};

const CREATE_POLL: PollSpec = PollSpec::new(5, 3);
const UPDATE_POLL: PollSpec = PollSpec::new(3, 2);
const DELETE_POLL: PollSpec = PollSpec::new(3, 2);

const IPV4_PATTERN: &str = r"^((25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)$";

#[derive(Default)]
pub struct VpnConnectionResource {
    provider_data: Option<NimbusProviderData>,
}

#[derive(Debug, Clone, PartialEq)]
struct VpnConnectionModel {
    gateway_id: String,
    name: String,
    peer_address: String,
    peer_cidrs: Vec<String>,
    pre_shared_key: Option<String>,
    ike_version: IkeVersion,
    timeouts: Timeouts,
}

impl VpnConnectionModel {
    fn read(reader: &mut ConfigReader<'_>) -> Self {
        let peer_cidrs = reader.strings("peer_cidrs");
        for cidr in &peer_cidrs {
            if !CidrBlock::is_valid(cidr) {
                reader.error(
                    "peer_cidrs",
                    "Invalid peer_cidrs",
                    format!("'{}' is not a valid IPv4 CIDR block", cidr),
                );
            }
        }

        Self {
            gateway_id: reader.string("gateway_id"),
            name: reader.string("name"),
            peer_address: reader.string("peer_address"),
            peer_cidrs,
            // Absent from imported state; the schema requires it in config.
            pre_shared_key: reader.optional_string("pre_shared_key"),
            ike_version: reader.enum_or("ike_version", IkeVersion::V2),
            timeouts: reader.timeouts(DEFAULT_TIMEOUTS),
        }
    }

    fn from_value(value: &DynamicValue) -> OpResult<Self> {
        let mut reader = ConfigReader::new(value);
        let model = Self::read(&mut reader);
        reader.finish()?;
        Ok(model)
    }
}

impl VpnConnectionResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> OpResult<&NimbusProviderData> {
        self.provider_data
            .as_ref()
            .ok_or_else(|| not_configured().into())
    }

    fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages an IPsec connection on a VPN gateway")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .use_state_for_unknown()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("gateway_id", AttributeType::String)
                    .required()
                    .requires_replace()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(StringLength::between(1, 63))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("peer_address", AttributeType::String)
                    .description("Public IPv4 address of the remote peer")
                    .required()
                    .requires_replace()
                    .validator(StringMatches::new(IPV4_PATTERN, "must be an IPv4 address"))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("peer_cidrs", AttributeType::List(Box::new(AttributeType::String)))
                    .description("Address ranges reachable through the peer")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("pre_shared_key", AttributeType::String)
                    .required()
                    .sensitive()
                    .validator(StringLength::at_least(8))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ike_version", AttributeType::String)
                    .description("ikev1 or ikev2")
                    .optional()
                    .computed()
                    .requires_replace()
                    .default(StaticDefault::string(IkeVersion::V2.as_str()))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tunnel_status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .block(Timeouts::block(MUTATING_TIMEOUTS))
            .build()
    }

    fn write_state(base: &DynamicValue, connection: &VpnConnection) -> OpResult<DynamicValue> {
        StateBuilder::new(base)
            .string("id", &connection.id)
            .string("gateway_id", &connection.gateway_id)
            .string("name", &connection.name)
            .string("peer_address", &connection.peer_address)
            .strings("peer_cidrs", &connection.peer_cidrs)
            .string("ike_version", connection.ike_version.as_str())
            .optional_string("tunnel_status", connection.tunnel_status.clone())
            .build()
    }

    fn gateway_id_from_state(state: &DynamicValue) -> OpResult<String> {
        match state.get_string_opt(&attr("gateway_id")) {
            Ok(Some(id)) if !id.is_empty() => Ok(id),
            _ => Err(Diagnostic::error(
                "Missing gateway ID",
                "The 'gateway_id' attribute is not set in state",
            )
            .with_attribute(attr("gateway_id"))
            .into()),
        }
    }

    async fn wait_synced(
        ctx: &Context,
        data: &NimbusProviderData,
        gateway_id: &str,
        id: &str,
        spec: PollSpec,
        timeout: std::time::Duration,
    ) -> Result<(), crate::wait::OperationError> {
        let gateway_id = gateway_id.to_string();
        wait_for_sync(ctx, data, id, spec, timeout, move |client, id| {
            let gateway_id = gateway_id.clone();
            async move {
                client
                    .vpn()
                    .get_connection(&gateway_id, &id)
                    .await
                    .map(|c| c.sync_status)
            }
        })
        .await
    }

    async fn create_connection(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
    ) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let model = VpnConnectionModel::from_value(planned)?;
        let gateway_id = model.gateway_id.as_str();

        let _lock = data.locks.lock(gateway_id).await;

        let connection = data
            .client
            .vpn()
            .create_connection(
                gateway_id,
                &CreateVpnConnectionRequest {
                    name: model.name.clone(),
                    peer_address: model.peer_address.clone(),
                    peer_cidrs: model.peer_cidrs.clone(),
                    pre_shared_key: model.pre_shared_key.clone().unwrap_or_default(),
                    ike_version: model.ike_version,
                },
            )
            .await
            .map_err(|e| Failure::api("Failed to create VPN connection", &e))?;
        let id = connection.id;
        tracing::info!(%gateway_id, connection_id = %id, "created VPN connection");

        Self::wait_synced(ctx, data, gateway_id, &id, CREATE_POLL, model.timeouts.create)
            .await
            .map_err(|e| {
                Failure::wait("Error waiting for VPN connection to be created", &e)
                    .with_state(partial_state(planned, &id))
            })?;

        let connection = data
            .client
            .vpn()
            .get_connection(gateway_id, &id)
            .await
            .map_err(|e| {
                Failure::api("Failed to read VPN connection", &e)
                    .with_state(partial_state(planned, &id))
            })?;
        Self::write_state(planned, &connection)
    }

    async fn read_connection(&self, current: &DynamicValue) -> OpResult<Option<DynamicValue>> {
        let data = self.data()?;
        let id = id_from_state(current)?;
        let gateway_id = Self::gateway_id_from_state(current)?;

        let result = data.client.vpn().get_connection(&gateway_id, &id).await;
        match found(result, "Failed to read VPN connection")? {
            Some(connection) => Self::write_state(current, &connection).map(Some),
            None => Ok(None),
        }
    }

    async fn update_connection(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let old = VpnConnectionModel::from_value(prior)?;
        let new = VpnConnectionModel::from_value(planned)?;
        let gateway_id = new.gateway_id.as_str();

        let request = UpdateVpnConnectionRequest {
            name: (old.name != new.name).then(|| new.name.clone()),
            peer_cidrs: (old.peer_cidrs != new.peer_cidrs).then(|| new.peer_cidrs.clone()),
            pre_shared_key: (old.pre_shared_key != new.pre_shared_key)
                .then(|| new.pre_shared_key.clone())
                .flatten(),
        };

        if request.name.is_some() || request.peer_cidrs.is_some() || request.pre_shared_key.is_some()
        {
            let _lock = data.locks.lock(gateway_id).await;
            data.client
                .vpn()
                .update_connection(gateway_id, &id, &request)
                .await
                .map_err(|e| Failure::api("Failed to update VPN connection", &e))?;
            Self::wait_synced(ctx, data, gateway_id, &id, UPDATE_POLL, new.timeouts.update)
                .await
                .map_err(|e| Failure::wait("Error waiting for VPN connection to be updated", &e))?;
        }

        let connection = data
            .client
            .vpn()
            .get_connection(gateway_id, &id)
            .await
            .map_err(|e| Failure::api("Failed to read VPN connection", &e))?;
        Self::write_state(planned, &connection)
    }

    async fn delete_connection(&self, ctx: &Context, prior: &DynamicValue) -> OpResult<()> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let gateway_id = Self::gateway_id_from_state(prior)?;
        let timeouts = timeouts_from(prior, DEFAULT_TIMEOUTS)?;

        let _lock = data.locks.lock(gateway_id.as_str()).await;

        let result = data.client.vpn().delete_connection(&gateway_id, &id).await;
        if deleted(result, "Failed to delete VPN connection")?.is_none() {
            return Ok(());
        }

        wait_for_deleted(ctx, data, &id, DELETE_POLL, timeouts.delete, move |client, id| {
            let gateway_id = gateway_id.clone();
            async move {
                client
                    .vpn()
                    .get_connection(&gateway_id, &id)
                    .await
                    .map(|c| c.sync_status)
            }
        })
        .await
        .map_err(|e| Failure::wait("Error waiting for VPN connection to be deleted", &e))
    }
}

#[async_trait]
impl Resource for VpnConnectionResource {
    fn type_name(&self) -> &str {
        "nimbus_vpn_connection"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut reader = ConfigReader::for_validation(&request.config);
        VpnConnectionModel::read(&mut reader);
        ValidateResourceConfigResponse {
            diagnostics: reader.into_diagnostics(),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.create_connection(&ctx, &request.planned_state).await)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = self.read_connection(&request.current_state).await;
        read_response(request.current_state, result)
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let result = self
            .update_connection(&ctx, &request.prior_state, &request.planned_state)
            .await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_connection(&ctx, &request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for VpnConnectionResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        ConfigureResourceResponse {
            diagnostics: configure_slot(&mut self.provider_data, request.provider_data),
        }
    }
}

#[async_trait]
impl ResourceWithImportState for VpnConnectionResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_parts(&[attr("gateway_id"), attr("id")], &request)
    }
}
