//! Floating IP resource implementation
//!
//! Assignment to an instance is owned by `nimbus_instance` through its
//! `floating_ip_id` attribute; here `instance_id` is read-only.

use async_trait::async_trait;
use std::time::Duration;
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

use super::{
    attr, configure_slot, create_response, delete_response, deleted, found, id_from_state,
    not_configured, partial_state, read_response, timeouts_from, update_response, ConfigReader,
    Failure, OpResult, StateBuilder, DEFAULT_TIMEOUTS, MUTATING_TIMEOUTS,
};
use crate::api::floating_ips::{CreateFloatingIpRequest, FloatingIp, UpdateFloatingIpRequest};
use crate::provider_data::NimbusProviderData;
use crate::wait::{wait_for_deleted, wait_for_sync, OperationError, PollSpec};

const CREATE_POLL: PollSpec = PollSpec::new(2, 2);
const UPDATE_POLL: PollSpec = PollSpec::new(1, 1);
const DELETE_POLL: PollSpec = PollSpec::new(2, 2);

/// Waits for a floating IP's `sync_status` to reach Complete
pub(crate) async fn wait_floating_ip_synced(
    ctx: &Context,
    data: &NimbusProviderData,
    id: &str,
    spec: PollSpec,
    timeout: Duration,
) -> Result<(), OperationError> {
    wait_for_sync(ctx, data, id, spec, timeout, |client, id| async move {
        client.floating_ips().get(&id).await.map(|ip| ip.sync_status)
    })
    .await
}

#[derive(Default)]
pub struct FloatingIpResource {
    provider_data: Option<NimbusProviderData>,
}

#[derive(Debug, Clone, PartialEq)]
struct FloatingIpModel {
    description: Option<String>,
    timeouts: Timeouts,
}

impl FloatingIpModel {
    fn read(reader: &mut ConfigReader<'_>) -> Self {
        Self {
            description: reader.optional_string("description"),
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

impl FloatingIpResource {
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
            .description("Allocates a public IPv4 address")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .use_state_for_unknown()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("address", AttributeType::String)
                    .description("The allocated public address")
                    .computed()
                    .use_state_for_unknown()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("instance_id", AttributeType::String)
                    .description("Instance the address is currently assigned to")
                    .computed()
                    .build(),
            )
            .block(Timeouts::block(MUTATING_TIMEOUTS))
            .build()
    }

    fn write_state(base: &DynamicValue, ip: &FloatingIp) -> OpResult<DynamicValue> {
        StateBuilder::new(base)
            .string("id", &ip.id)
            .string("address", &ip.address)
            .optional_string("description", ip.description.clone())
            .optional_string("instance_id", ip.instance_id.clone())
            .build()
    }

    async fn create_floating_ip(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
    ) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let model = FloatingIpModel::from_value(planned)?;

        let ip = data
            .client
            .floating_ips()
            .create(&CreateFloatingIpRequest {
                description: model.description.clone(),
            })
            .await
            .map_err(|e| Failure::api("Failed to allocate floating IP", &e))?;
        let id = ip.id;
        tracing::info!(floating_ip_id = %id, address = %ip.address, "allocated floating IP");

        wait_floating_ip_synced(ctx, data, &id, CREATE_POLL, model.timeouts.create)
            .await
            .map_err(|e| {
                Failure::wait("Error waiting for floating IP to be allocated", &e)
                    .with_state(partial_state(planned, &id))
            })?;

        let ip = data.client.floating_ips().get(&id).await.map_err(|e| {
            Failure::api("Failed to read floating IP", &e).with_state(partial_state(planned, &id))
        })?;
        Self::write_state(planned, &ip)
    }

    async fn read_floating_ip(&self, current: &DynamicValue) -> OpResult<Option<DynamicValue>> {
        let data = self.data()?;
        let id = id_from_state(current)?;

        match found(data.client.floating_ips().get(&id).await, "Failed to read floating IP")? {
            Some(ip) => Self::write_state(current, &ip).map(Some),
            None => Ok(None),
        }
    }

    async fn update_floating_ip(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let old = FloatingIpModel::from_value(prior)?;
        let new = FloatingIpModel::from_value(planned)?;

        if old.description != new.description {
            let request = UpdateFloatingIpRequest {
                description: Some(new.description.clone().unwrap_or_default()),
            };
            data.client
                .floating_ips()
                .update(&id, &request)
                .await
                .map_err(|e| Failure::api("Failed to update floating IP", &e))?;
            wait_floating_ip_synced(ctx, data, &id, UPDATE_POLL, new.timeouts.update)
                .await
                .map_err(|e| Failure::wait("Error waiting for floating IP to be updated", &e))?;
        }

        let ip = data
            .client
            .floating_ips()
            .get(&id)
            .await
            .map_err(|e| Failure::api("Failed to read floating IP", &e))?;
        Self::write_state(planned, &ip)
    }

    async fn delete_floating_ip(&self, ctx: &Context, prior: &DynamicValue) -> OpResult<()> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let timeouts = timeouts_from(prior, DEFAULT_TIMEOUTS)?;

        let result = data.client.floating_ips().delete(&id).await;
        if deleted(result, "Failed to release floating IP")?.is_none() {
            return Ok(());
        }

        wait_for_deleted(ctx, data, &id, DELETE_POLL, timeouts.delete, |client, id| async move {
            client.floating_ips().get(&id).await.map(|ip| ip.sync_status)
        })
        .await
        .map_err(|e| Failure::wait("Error waiting for floating IP to be released", &e))
    }
}

#[async_trait]
impl Resource for FloatingIpResource {
    fn type_name(&self) -> &str {
        "nimbus_floating_ip"
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
        FloatingIpModel::read(&mut reader);
        ValidateResourceConfigResponse {
            diagnostics: reader.into_diagnostics(),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.create_floating_ip(&ctx, &request.planned_state).await)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = self.read_floating_ip(&request.current_state).await;
        read_response(request.current_state, result)
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let result = self
            .update_floating_ip(&ctx, &request.prior_state, &request.planned_state)
            .await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_floating_ip(&ctx, &request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for FloatingIpResource {
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
impl ResourceWithImportState for FloatingIpResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_passthrough_id(attr("id"), &request)
    }
}
