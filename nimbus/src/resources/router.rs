//! Router resource implementation
//!
//! Routers converge in the background: every change is followed by a wait
//! on the router's `sync_status`.

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
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
use crate::api::routers::{CreateRouterRequest, Router, UpdateRouterRequest};
use crate::provider_data::NimbusProviderData;
use crate::wait::{wait_for_deleted, wait_for_sync, PollSpec};

const CREATE_POLL: PollSpec = PollSpec::new(3, 2);
const UPDATE_POLL: PollSpec = PollSpec::new(2, 2);
const DELETE_POLL: PollSpec = PollSpec::new(2, 2);

#[derive(Default)]
pub struct RouterResource {
    provider_data: Option<NimbusProviderData>,
}

#[derive(Debug, Clone, PartialEq)]
struct RouterModel {
    name: String,
    vpc_id: String,
    external_gateway: bool,
    timeouts: Timeouts,
}

impl RouterModel {
    fn read(reader: &mut ConfigReader<'_>) -> Self {
        Self {
            name: reader.string("name"),
            vpc_id: reader.string("vpc_id"),
            external_gateway: reader.bool_or("external_gateway", false),
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

impl RouterResource {
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
            .description("Manages a router connecting the networks of a VPC")
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
                    .description("VPC the router belongs to")
                    .required()
                    .requires_replace()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("external_gateway", AttributeType::Bool)
                    .description("Whether the router routes traffic to the internet")
                    .optional()
                    .computed()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("external_ip", AttributeType::String)
                    .description("Public address of the external gateway, if enabled")
                    .computed()
                    .build(),
            )
            .block(Timeouts::block(MUTATING_TIMEOUTS))
            .build()
    }

    fn write_state(base: &DynamicValue, router: &Router) -> OpResult<DynamicValue> {
        StateBuilder::new(base)
            .string("id", &router.id)
            .string("name", &router.name)
            .string("vpc_id", &router.vpc_id)
            .bool("external_gateway", router.external_gateway)
            .optional_string("external_ip", router.external_ip.clone())
            .build()
    }

    async fn wait_synced(
        ctx: &Context,
        data: &NimbusProviderData,
        id: &str,
        spec: PollSpec,
        timeout: std::time::Duration,
    ) -> Result<(), crate::wait::OperationError> {
        wait_for_sync(ctx, data, id, spec, timeout, |client, id| async move {
            client.routers().get(&id).await.map(|r| r.sync_status)
        })
        .await
    }

    async fn create_router(&self, ctx: &Context, planned: &DynamicValue) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let model = RouterModel::from_value(planned)?;

        let router = data
            .client
            .routers()
            .create(&CreateRouterRequest {
                name: model.name.clone(),
                vpc_id: model.vpc_id.clone(),
                external_gateway: model.external_gateway,
            })
            .await
            .map_err(|e| Failure::api("Failed to create router", &e))?;
        tracing::info!(router_id = %router.id, "created router");

        Self::wait_synced(ctx, data, &router.id, CREATE_POLL, model.timeouts.create)
            .await
            .map_err(|e| {
                Failure::wait("Error waiting for router to be created", &e)
                    .with_state(partial_state(planned, &router.id))
            })?;

        let router = data
            .client
            .routers()
            .get(&router.id)
            .await
            .map_err(|e| {
                Failure::api("Failed to read router", &e)
                    .with_state(partial_state(planned, &router.id))
            })?;
        Self::write_state(planned, &router)
    }

    async fn read_router(&self, current: &DynamicValue) -> OpResult<Option<DynamicValue>> {
        let data = self.data()?;
        let id = id_from_state(current)?;

        match found(data.client.routers().get(&id).await, "Failed to read router")? {
            Some(router) => Self::write_state(current, &router).map(Some),
            None => Ok(None),
        }
    }

    async fn update_router(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let old = RouterModel::from_value(prior)?;
        let new = RouterModel::from_value(planned)?;

        let request = UpdateRouterRequest {
            name: (old.name != new.name).then(|| new.name.clone()),
            external_gateway: (old.external_gateway != new.external_gateway)
                .then_some(new.external_gateway),
        };

        if request.name.is_some() || request.external_gateway.is_some() {
            data.client
                .routers()
                .update(&id, &request)
                .await
                .map_err(|e| Failure::api("Failed to update router", &e))?;
            Self::wait_synced(ctx, data, &id, UPDATE_POLL, new.timeouts.update)
                .await
                .map_err(|e| Failure::wait("Error waiting for router to be updated", &e))?;
        }

        let router = data
            .client
            .routers()
            .get(&id)
            .await
            .map_err(|e| Failure::api("Failed to read router", &e))?;
        Self::write_state(planned, &router)
    }

    async fn delete_router(&self, ctx: &Context, prior: &DynamicValue) -> OpResult<()> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let timeouts = timeouts_from(prior, DEFAULT_TIMEOUTS)?;

        if deleted(data.client.routers().delete(&id).await, "Failed to delete router")?.is_none() {
            return Ok(());
        }

        wait_for_deleted(ctx, data, &id, DELETE_POLL, timeouts.delete, |client, id| async move {
            client.routers().get(&id).await.map(|r| r.sync_status)
        })
        .await
        .map_err(|e| Failure::wait("Error waiting for router to be deleted", &e))
    }
}

#[async_trait]
impl Resource for RouterResource {
    fn type_name(&self) -> &str {
        "nimbus_router"
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
        RouterModel::read(&mut reader);
        ValidateResourceConfigResponse {
            diagnostics: reader.into_diagnostics(),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.create_router(&ctx, &request.planned_state).await)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = self.read_router(&request.current_state).await;
        read_response(request.current_state, result)
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let result = self
            .update_router(&ctx, &request.prior_state, &request.planned_state)
            .await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_router(&ctx, &request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for RouterResource {
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
impl ResourceWithImportState for RouterResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_passthrough_id(attr("id"), &request)
    }
}
