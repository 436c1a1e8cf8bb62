//! Load balancer resource implementation

use async_trait::async_trait;
use std::collections::HashMap;
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
use tfplug::schema::{
    AttributeBuilder, AttributeType, NestedBlock, NestingMode, Schema, SchemaBuilder,
};
use tfplug::timeouts::Timeouts;
use tfplug::types::{Dynamic, DynamicValue};
use tfplug::validator::{NumberRange, StringLength};

use super::{
    attr, configure_slot, create_response, delete_response, deleted, found, id_from_state,
    not_configured, partial_state, pending_resource_id, read_response, task_resource_id, timeouts_from,
    update_response, ConfigReader, Failure, OpResult, StateBuilder, LONG_TIMEOUTS,
    MUTATING_TIMEOUTS,
};
use crate::api::load_balancers::{
    CreateLoadBalancerRequest, Listener, LoadBalancer, UpdateLoadBalancerRequest,
};
use crate::api::{Algorithm, Protocol};
use crate::provider_data::NimbusProviderData;
use crate::wait::{wait_for_task, PollSpec};

const CREATE_POLL: PollSpec = PollSpec::new(10, 5);
const UPDATE_POLL: PollSpec = PollSpec::new(5, 3);
const DELETE_POLL: PollSpec = PollSpec::new(5, 3);

const LISTENER_BLOCK: &str = "listener";

#[derive(Default)]
pub struct LoadBalancerResource {
    provider_data: Option<NimbusProviderData>,
}

#[derive(Debug, Clone, PartialEq)]
struct LoadBalancerModel {
    name: String,
    network_id: String,
    algorithm: Algorithm,
    listeners: Vec<Listener>,
    member_ids: Vec<String>,
    timeouts: Timeouts,
}

fn read_listener(reader: &mut ConfigReader<'_>) -> Listener {
    let protocol = reader.required_enum("protocol", Protocol::Tcp);
    if !protocol.has_ports() {
        reader.error(
            "protocol",
            "Invalid protocol",
            format!("Listeners forward tcp or udp traffic, not {}", protocol),
        );
    }
    Listener {
        protocol,
        port: reader.integer("port"),
        target_port: reader.integer("target_port"),
    }
}

impl LoadBalancerModel {
    fn read(reader: &mut ConfigReader<'_>) -> Self {
        let listeners = reader.blocks(LISTENER_BLOCK, read_listener);

        let mut seen = HashMap::new();
        for listener in &listeners {
            if let Some(previous) = seen.insert((listener.protocol, listener.port), listener) {
                reader.error(
                    LISTENER_BLOCK,
                    "Duplicate listener",
                    format!(
                        "{} port {} is declared more than once (targets {} and {})",
                        listener.protocol, listener.port, previous.target_port, listener.target_port
                    ),
                );
            }
        }

        Self {
            name: reader.string("name"),
            network_id: reader.string("network_id"),
            algorithm: reader.enum_or("algorithm", Algorithm::RoundRobin),
            listeners,
            member_ids: reader.strings("member_ids"),
            timeouts: reader.timeouts(LONG_TIMEOUTS),
        }
    }

    fn from_value(value: &DynamicValue) -> OpResult<Self> {
        let mut reader = ConfigReader::new(value);
        let model = Self::read(&mut reader);
        reader.finish()?;
        Ok(model)
    }
}

fn listener_value(listener: &Listener) -> Dynamic {
    Dynamic::Map(HashMap::from([
        (
            "protocol".to_string(),
            Dynamic::String(listener.protocol.as_str().to_string()),
        ),
        ("port".to_string(), Dynamic::Number(listener.port.into())),
        (
            "target_port".to_string(),
            Dynamic::Number(listener.target_port.into()),
        ),
    ]))
}

impl LoadBalancerResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> OpResult<&NimbusProviderData> {
        self.provider_data
            .as_ref()
            .ok_or_else(|| not_configured().into())
    }

    fn listener_block() -> NestedBlock {
        let block = SchemaBuilder::new()
            .description("Port the load balancer accepts traffic on")
            .attribute(
                AttributeBuilder::new("protocol", AttributeType::String)
                    .description("tcp or udp")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("port", AttributeType::Number)
                    .required()
                    .validator(NumberRange::integer(1, 65535))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("target_port", AttributeType::Number)
                    .description("Port on the members traffic is forwarded to")
                    .required()
                    .validator(NumberRange::integer(1, 65535))
                    .build(),
            )
            .build()
            .block;

        NestedBlock {
            type_name: LISTENER_BLOCK.to_string(),
            block,
            nesting: NestingMode::List,
            min_items: 1,
            max_items: 0,
        }
    }

    fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages a layer 4 load balancer")
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
                AttributeBuilder::new("network_id", AttributeType::String)
                    .description("Network the virtual IP is allocated from")
                    .required()
                    .requires_replace()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("algorithm", AttributeType::String)
                    .description("round_robin, least_connections or source_ip")
                    .optional()
                    .computed()
                    .default(StaticDefault::string(Algorithm::RoundRobin.as_str()))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("member_ids", AttributeType::List(Box::new(AttributeType::String)))
                    .description("Instances receiving traffic")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vip_address", AttributeType::String)
                    .computed()
                    .use_state_for_unknown()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .block(Self::listener_block())
            .block(Timeouts::block(MUTATING_TIMEOUTS))
            .build()
    }

    fn write_state(base: &DynamicValue, lb: &LoadBalancer) -> OpResult<DynamicValue> {
        StateBuilder::new(base)
            .string("id", &lb.id)
            .string("name", &lb.name)
            .string("network_id", &lb.network_id)
            .string("algorithm", lb.algorithm.as_str())
            .strings("member_ids", &lb.member_ids)
            .value(
                LISTENER_BLOCK,
                Dynamic::List(lb.listeners.iter().map(listener_value).collect()),
            )
            .optional_string("vip_address", lb.vip_address.clone())
            .optional_string("status", lb.status.clone())
            .build()
    }

    async fn create_load_balancer(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
    ) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let model = LoadBalancerModel::from_value(planned)?;

        let task = data
            .client
            .load_balancers()
            .create(&CreateLoadBalancerRequest {
                name: model.name.clone(),
                network_id: model.network_id.clone(),
                algorithm: model.algorithm,
                listeners: model.listeners.clone(),
                member_ids: model.member_ids.clone(),
            })
            .await
            .map_err(|e| Failure::api("Failed to create load balancer", &e))?;

        if let Err(e) =
            wait_for_task(ctx, data, &task.task_id, CREATE_POLL, model.timeouts.create).await
        {
            let failure = Failure::wait("Error waiting for load balancer to be created", &e);
            return Err(match pending_resource_id(data, &task).await {
                Some(id) => failure.with_state(partial_state(planned, &id)),
                None => failure,
            });
        }

        let id = task_resource_id(data, &task, "load balancer").await?;
        tracing::info!(load_balancer_id = %id, listeners = model.listeners.len(), "created load balancer");

        let lb = data.client.load_balancers().get(&id).await.map_err(|e| {
            Failure::api("Failed to read load balancer", &e).with_state(partial_state(planned, &id))
        })?;
        Self::write_state(planned, &lb)
    }

    async fn read_load_balancer(&self, current: &DynamicValue) -> OpResult<Option<DynamicValue>> {
        let data = self.data()?;
        let id = id_from_state(current)?;

        let result = data.client.load_balancers().get(&id).await;
        match found(result, "Failed to read load balancer")? {
            Some(lb) => Self::write_state(current, &lb).map(Some),
            None => Ok(None),
        }
    }

    async fn update_load_balancer(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let old = LoadBalancerModel::from_value(prior)?;
        let new = LoadBalancerModel::from_value(planned)?;

        let request = UpdateLoadBalancerRequest {
            name: (old.name != new.name).then(|| new.name.clone()),
            algorithm: (old.algorithm != new.algorithm).then_some(new.algorithm),
            listeners: (old.listeners != new.listeners).then(|| new.listeners.clone()),
            member_ids: (old.member_ids != new.member_ids).then(|| new.member_ids.clone()),
        };

        if request.name.is_some()
            || request.algorithm.is_some()
            || request.listeners.is_some()
            || request.member_ids.is_some()
        {
            let task = data
                .client
                .load_balancers()
                .update(&id, &request)
                .await
                .map_err(|e| Failure::api("Failed to update load balancer", &e))?;
            wait_for_task(ctx, data, &task.task_id, UPDATE_POLL, new.timeouts.update)
                .await
                .map_err(|e| Failure::wait("Error waiting for load balancer to be updated", &e))?;
        }

        let lb = data
            .client
            .load_balancers()
            .get(&id)
            .await
            .map_err(|e| Failure::api("Failed to read load balancer", &e))?;
        Self::write_state(planned, &lb)
    }

    async fn delete_load_balancer(&self, ctx: &Context, prior: &DynamicValue) -> OpResult<()> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let timeouts = timeouts_from(prior, LONG_TIMEOUTS)?;

        let result = data.client.load_balancers().delete(&id).await;
        let task = match deleted(result, "Failed to delete load balancer")? {
            Some(task) => task,
            None => return Ok(()),
        };

        wait_for_task(ctx, data, &task.task_id, DELETE_POLL, timeouts.delete)
            .await
            .map_err(|e| Failure::wait("Error waiting for load balancer to be deleted", &e))
    }
}

#[async_trait]
impl Resource for LoadBalancerResource {
    fn type_name(&self) -> &str {
        "nimbus_load_balancer"
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
        LoadBalancerModel::read(&mut reader);
        ValidateResourceConfigResponse {
            diagnostics: reader.into_diagnostics(),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.create_load_balancer(&ctx, &request.planned_state).await)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = self.read_load_balancer(&request.current_state).await;
        read_response(request.current_state, result)
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let result = self
            .update_load_balancer(&ctx, &request.prior_state, &request.planned_state)
            .await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_load_balancer(&ctx, &request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for LoadBalancerResource {
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
impl ResourceWithImportState for LoadBalancerResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_passthrough_id(attr("id"), &request)
    }
}
