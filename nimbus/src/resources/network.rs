//! Network (subnet) resource implementation

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
use tfplug::validator::{CidrBlock, StringLength};

use super::{
    attr, configure_slot, create_response, delete_response, deleted, found, id_from_state,
    not_configured, partial_state, read_response, timeouts_from, update_response, ConfigReader,
    Failure, OpResult, StateBuilder, DEFAULT_TIMEOUTS, MUTATING_TIMEOUTS,
};
use crate::api::networks::{CreateNetworkRequest, Network, UpdateNetworkRequest};
use crate::provider_data::NimbusProviderData;
use crate::wait::{wait_for_deleted, wait_for_sync, OperationError, PollSpec};

const CREATE_POLL: PollSpec = PollSpec::new(3, 2);
const UPDATE_POLL: PollSpec = PollSpec::new(2, 2);
const DELETE_POLL: PollSpec = PollSpec::new(3, 2);

#[derive(Default)]
pub struct NetworkResource {
    provider_data: Option<NimbusProviderData>,
}

#[derive(Debug, Clone, PartialEq)]
struct NetworkModel {
    name: String,
    vpc_id: String,
    router_id: Option<String>,
    cidr_block: String,
    dns_servers: Option<Vec<String>>,
    timeouts: Timeouts,
}

impl NetworkModel {
    fn read(reader: &mut ConfigReader<'_>) -> Self {
        Self {
            name: reader.string("name"),
            vpc_id: reader.string("vpc_id"),
            router_id: reader.optional_string("router_id"),
            cidr_block: reader.string("cidr_block"),
            dns_servers: reader.optional_strings("dns_servers"),
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

async fn wait_synced(
    ctx: &Context,
    data: &NimbusProviderData,
    id: &str,
    spec: PollSpec,
    timeout: Duration,
) -> Result<(), OperationError> {
    wait_for_sync(ctx, data, id, spec, timeout, |client, id| async move {
        client.networks().get(&id).await.map(|n| n.sync_status)
    })
    .await
}

impl NetworkResource {
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
            .description("Manages a network inside a VPC")
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
                AttributeBuilder::new("router_id", AttributeType::String)
                    .description("Router the network is attached to")
                    .optional()
                    .requires_replace()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cidr_block", AttributeType::String)
                    .description("Address range, must lie inside the VPC's range")
                    .required()
                    .requires_replace()
                    .validator(CidrBlock::new())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "dns_servers",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .description("DNS resolvers handed out by DHCP; the platform picks defaults when unset")
                .optional()
                .computed()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("gateway_ip", AttributeType::String)
                    .computed()
                    .use_state_for_unknown()
                    .build(),
            )
            .block(Timeouts::block(MUTATING_TIMEOUTS))
            .build()
    }

    fn write_state(base: &DynamicValue, network: &Network) -> OpResult<DynamicValue> {
        StateBuilder::new(base)
            .string("id", &network.id)
            .string("name", &network.name)
            .string("vpc_id", &network.vpc_id)
            .optional_string("router_id", network.router_id.clone())
            .string("cidr_block", &network.cidr_block)
            .strings("dns_servers", &network.dns_servers)
            .optional_string("gateway_ip", network.gateway_ip.clone())
            .build()
    }

    async fn create_network(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
    ) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let model = NetworkModel::from_value(planned)?;

        let network = data
            .client
            .networks()
            .create(&CreateNetworkRequest {
                name: model.name.clone(),
                vpc_id: model.vpc_id.clone(),
                router_id: model.router_id.clone(),
                cidr_block: model.cidr_block.clone(),
                dns_servers: model.dns_servers.clone().unwrap_or_default(),
            })
            .await
            .map_err(|e| Failure::api("Failed to create network", &e))?;
        let id = network.id;
        tracing::info!(network_id = %id, "created network");

        wait_synced(ctx, data, &id, CREATE_POLL, model.timeouts.create)
            .await
            .map_err(|e| {
                Failure::wait("Error waiting for network to be created", &e)
                    .with_state(partial_state(planned, &id))
            })?;

        let network = data.client.networks().get(&id).await.map_err(|e| {
            Failure::api("Failed to read network", &e).with_state(partial_state(planned, &id))
        })?;
        Self::write_state(planned, &network)
    }

    async fn read_network(&self, current: &DynamicValue) -> OpResult<Option<DynamicValue>> {
        let data = self.data()?;
        let id = id_from_state(current)?;

        match found(data.client.networks().get(&id).await, "Failed to read network")? {
            Some(network) => Self::write_state(current, &network).map(Some),
            None => Ok(None),
        }
    }

    async fn update_network(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let old = NetworkModel::from_value(prior)?;
        let new = NetworkModel::from_value(planned)?;

        // An unknown planned list means the user left it to the platform.
        let dns_servers = match &new.dns_servers {
            Some(servers) if old.dns_servers.as_ref() != Some(servers) => Some(servers.clone()),
            _ => None,
        };
        let request = UpdateNetworkRequest {
            name: (old.name != new.name).then(|| new.name.clone()),
            dns_servers,
        };

        if request.name.is_some() || request.dns_servers.is_some() {
            data.client
                .networks()
                .update(&id, &request)
                .await
                .map_err(|e| Failure::api("Failed to update network", &e))?;
            wait_synced(ctx, data, &id, UPDATE_POLL, new.timeouts.update)
                .await
                .map_err(|e| Failure::wait("Error waiting for network to be updated", &e))?;
        }

        let network = data
            .client
            .networks()
            .get(&id)
            .await
            .map_err(|e| Failure::api("Failed to read network", &e))?;
        Self::write_state(planned, &network)
    }

    async fn delete_network(&self, ctx: &Context, prior: &DynamicValue) -> OpResult<()> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let timeouts = timeouts_from(prior, DEFAULT_TIMEOUTS)?;

        if deleted(data.client.networks().delete(&id).await, "Failed to delete network")?
            .is_none()
        {
            return Ok(());
        }

        wait_for_deleted(ctx, data, &id, DELETE_POLL, timeouts.delete, |client, id| async move {
            client.networks().get(&id).await.map(|n| n.sync_status)
        })
        .await
        .map_err(|e| Failure::wait("Error waiting for network to be deleted", &e))?;
        tracing::info!(network_id = %id, "deleted network");
        Ok(())
    }
}

#[async_trait]
impl Resource for NetworkResource {
    fn type_name(&self) -> &str {
        "nimbus_network"
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
        NetworkModel::read(&mut reader);
        ValidateResourceConfigResponse {
            diagnostics: reader.into_diagnostics(),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.create_network(&ctx, &request.planned_state).await)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = self.read_network(&request.current_state).await;
        read_response(request.current_state, result)
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let result = self
            .update_network(&ctx, &request.prior_state, &request.planned_state)
            .await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_network(&ctx, &request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for NetworkResource {
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
impl ResourceWithImportState for NetworkResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_passthrough_id(attr("id"), &request)
    }
}
