//! VPN gateway resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
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
use tfplug::types::DynamicValue;
use tfplug::validator::StringLength;

use super::{
    attr, configure_slot, create_response, delete_response, deleted, found, id_from_state,
    not_configured, partial_state, read_response, timeouts_from, update_response, ConfigReader,
    Failure, OpResult, StateBuilder, DEFAULT_TIMEOUTS, MUTATING_TIMEOUTS,
};
use crate::api::vpn::{CreateVpnGatewayRequest, UpdateVpnGatewayRequest, VpnGateway};
use crate::provider_data::NimbusProviderData;
use crate::wait::{wait_for_deleted, wait_for_sync, PollSpec};

const CREATE_POLL: PollSpec = PollSpec::new(10, 5);
const UPDATE_POLL: PollSpec = PollSpec::new(2, 2);
const DELETE_POLL: PollSpec = PollSpec::new(5, 3);

#[derive(Default)]
pub struct VpnGatewayResource {
    provider_data: Option<NimbusProviderData>,
}

#[derive(Debug, Clone, PartialEq)]
struct VpnGatewayModel {
    name: String,
    vpc_id: String,
    timeouts: Timeouts,
}

impl VpnGatewayModel {
    fn read(reader: &mut ConfigReader<'_>) -> Self {
        Self {
            name: reader.string("name"),
            vpc_id: reader.string("vpc_id"),
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

impl VpnGatewayResource {
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
            .description("Manages a site-to-site VPN gateway for a VPC")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .use_state_for_unknown()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(StringLength::between(1, 63))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vpc_id", AttributeType::String)
                    .required()
                    .requires_replace()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("public_ip", AttributeType::String)
                    .description("Address peers connect to")
                    .computed()
                    .use_state_for_unknown()
                    .build(),
            )
            .block(Timeouts::block(MUTATING_TIMEOUTS))
            .build()
    }

    fn write_state(base: &DynamicValue, gateway: &VpnGateway) -> OpResult<DynamicValue> {
        StateBuilder::new(base)
            .string("id", &gateway.id)
            .string("name", &gateway.name)
            .string("vpc_id", &gateway.vpc_id)
            .optional_string("public_ip", gateway.public_ip.clone())
            .build()
    }

    async fn create_gateway(&self, ctx: &Context, planned: &DynamicValue) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let model = VpnGatewayModel::from_value(planned)?;

        let gateway = data
            .client
            .vpn()
            .create_gateway(&CreateVpnGatewayRequest {
                name: model.name.clone(),
                vpc_id: model.vpc_id.clone(),
            })
            .await
            .map_err(|e| Failure::api("Failed to create VPN gateway", &e))?;
        let id = gateway.id;
        tracing::info!(gateway_id = %id, "created VPN gateway");

        wait_for_sync(ctx, data, &id, CREATE_POLL, model.timeouts.create, |client, id| async move {
            client.vpn().get_gateway(&id).await.map(|g| g.sync_status)
        })
        .await
        .map_err(|e| {
            Failure::wait("Error waiting for VPN gateway to be created", &e)
                .with_state(partial_state(planned, &id))
        })?;

        let gateway = data.client.vpn().get_gateway(&id).await.map_err(|e| {
            Failure::api("Failed to read VPN gateway", &e).with_state(partial_state(planned, &id))
        })?;
        Self::write_state(planned, &gateway)
    }

    async fn read_gateway(&self, current: &DynamicValue) -> OpResult<Option<DynamicValue>> {
        let data = self.data()?;
        let id = id_from_state(current)?;

        match found(data.client.vpn().get_gateway(&id).await, "Failed to read VPN gateway")? {
            Some(gateway) => Self::write_state(current, &gateway).map(Some),
            None => Ok(None),
        }
    }

    async fn update_gateway(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let old = VpnGatewayModel::from_value(prior)?;
        let new = VpnGatewayModel::from_value(planned)?;

        if old.name != new.name {
            let request = UpdateVpnGatewayRequest {
                name: Some(new.name.clone()),
            };
            data.client
                .vpn()
                .update_gateway(&id, &request)
                .await
                .map_err(|e| Failure::api("Failed to update VPN gateway", &e))?;
            wait_for_sync(ctx, data, &id, UPDATE_POLL, new.timeouts.update, |client, id| async move {
                client.vpn().get_gateway(&id).await.map(|g| g.sync_status)
            })
            .await
            .map_err(|e| Failure::wait("Error waiting for VPN gateway to be updated", &e))?;
        }

        let gateway = data
            .client
            .vpn()
            .get_gateway(&id)
            .await
            .map_err(|e| Failure::api("Failed to read VPN gateway", &e))?;
        Self::write_state(planned, &gateway)
    }

    async fn delete_gateway(&self, ctx: &Context, prior: &DynamicValue) -> OpResult<()> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let timeouts = timeouts_from(prior, DEFAULT_TIMEOUTS)?;

        let result = data.client.vpn().delete_gateway(&id).await;
        if deleted(result, "Failed to delete VPN gateway")?.is_none() {
            return Ok(());
        }

        wait_for_deleted(ctx, data, &id, DELETE_POLL, timeouts.delete, |client, id| async move {
            client.vpn().get_gateway(&id).await.map(|g| g.sync_status)
        })
        .await
        .map_err(|e| Failure::wait("Error waiting for VPN gateway to be deleted", &e))
    }
}

#[async_trait]
impl Resource for VpnGatewayResource {
    fn type_name(&self) -> &str {
        "nimbus_vpn_gateway"
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
        VpnGatewayModel::read(&mut reader);
        ValidateResourceConfigResponse {
            diagnostics: reader.into_diagnostics(),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.create_gateway(&ctx, &request.planned_state).await)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = self.read_gateway(&request.current_state).await;
        read_response(request.current_state, result)
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let result = self
            .update_gateway(&ctx, &request.prior_state, &request.planned_state)
            .await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_gateway(&ctx, &request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for VpnGatewayResource {
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
impl ResourceWithImportState for VpnGatewayResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_passthrough_id(attr("id"), &request)
    }
}
