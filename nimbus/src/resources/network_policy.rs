//! Network policy resource implementation
//!
//! A network carries at most one policy, and attaching or changing it
//! reprograms the network, so every mutation holds the network's lock.

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
    not_configured, partial_state, pending_resource_id, read_response, task_resource_id, timeouts_from,
    update_response, ConfigReader, Failure, OpResult, StateBuilder, DEFAULT_TIMEOUTS,
    MUTATING_TIMEOUTS,
};
use crate::api::network_policies::{
    CreateNetworkPolicyRequest, NetworkPolicy, UpdateNetworkPolicyRequest,
};
use crate::api::DefaultAction;
use crate::provider_data::NimbusProviderData;
use crate::wait::{wait_for_task, PollSpec};

const CREATE_POLL: PollSpec = PollSpec::new(2, 2);
const UPDATE_POLL: PollSpec = PollSpec::new(2, 2);
const DELETE_POLL: PollSpec = PollSpec::new(2, 2);

#[derive(Default)]
pub struct NetworkPolicyResource {
    provider_data: Option<NimbusProviderData>,
}

#[derive(Debug, Clone, PartialEq)]
struct NetworkPolicyModel {
    name: String,
    network_id: String,
    default_action: DefaultAction,
    firewall_policy_id: Option<String>,
    timeouts: Timeouts,
}

impl NetworkPolicyModel {
    fn read(reader: &mut ConfigReader<'_>) -> Self {
        Self {
            name: reader.string("name"),
            network_id: reader.string("network_id"),
            default_action: reader.enum_or("default_action", DefaultAction::Deny),
            firewall_policy_id: reader.optional_string("firewall_policy_id"),
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

impl NetworkPolicyResource {
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
            .description("Attaches a traffic policy to a network")
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
                    .required()
                    .requires_replace()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("default_action", AttributeType::String)
                    .description("Action for traffic no firewall rule matches: allow or deny")
                    .optional()
                    .computed()
                    .default(StaticDefault::string(DefaultAction::Deny.as_str()))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("firewall_policy_id", AttributeType::String)
                    .description("Firewall policy enforced on the network")
                    .optional()
                    .build(),
            )
            .block(Timeouts::block(MUTATING_TIMEOUTS))
            .build()
    }

    fn write_state(base: &DynamicValue, policy: &NetworkPolicy) -> OpResult<DynamicValue> {
        StateBuilder::new(base)
            .string("id", &policy.id)
            .string("name", &policy.name)
            .string("network_id", &policy.network_id)
            .string("default_action", policy.default_action.as_str())
            .optional_string("firewall_policy_id", policy.firewall_policy_id.clone())
            .build()
    }

    async fn create_policy(&self, ctx: &Context, planned: &DynamicValue) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let model = NetworkPolicyModel::from_value(planned)?;

        let _lock = data.locks.lock(model.network_id.as_str()).await;

        let task = data
            .client
            .network_policies()
            .create(&CreateNetworkPolicyRequest {
                name: model.name.clone(),
                network_id: model.network_id.clone(),
                default_action: model.default_action,
                firewall_policy_id: model.firewall_policy_id.clone(),
            })
            .await
            .map_err(|e| Failure::api("Failed to create network policy", &e))?;

        if let Err(e) =
            wait_for_task(ctx, data, &task.task_id, CREATE_POLL, model.timeouts.create).await
        {
            let failure = Failure::wait("Error waiting for network policy to be attached", &e);
            return Err(match pending_resource_id(data, &task).await {
                Some(id) => failure.with_state(partial_state(planned, &id)),
                None => failure,
            });
        }

        let id = task_resource_id(data, &task, "network policy").await?;
        tracing::info!(policy_id = %id, network_id = %model.network_id, "attached network policy");

        let policy = data.client.network_policies().get(&id).await.map_err(|e| {
            Failure::api("Failed to read network policy", &e).with_state(partial_state(planned, &id))
        })?;
        Self::write_state(planned, &policy)
    }

    async fn read_policy(&self, current: &DynamicValue) -> OpResult<Option<DynamicValue>> {
        let data = self.data()?;
        let id = id_from_state(current)?;

        let result = data.client.network_policies().get(&id).await;
        match found(result, "Failed to read network policy")? {
            Some(policy) => Self::write_state(current, &policy).map(Some),
            None => Ok(None),
        }
    }

    async fn update_policy(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let old = NetworkPolicyModel::from_value(prior)?;
        let new = NetworkPolicyModel::from_value(planned)?;

        let request = UpdateNetworkPolicyRequest {
            name: (old.name != new.name).then(|| new.name.clone()),
            default_action: (old.default_action != new.default_action)
                .then_some(new.default_action),
            firewall_policy_id: (old.firewall_policy_id != new.firewall_policy_id)
                .then(|| new.firewall_policy_id.clone()),
        };

        if request.name.is_some()
            || request.default_action.is_some()
            || request.firewall_policy_id.is_some()
        {
            let _lock = data.locks.lock(new.network_id.as_str()).await;
            let task = data
                .client
                .network_policies()
                .update(&id, &request)
                .await
                .map_err(|e| Failure::api("Failed to update network policy", &e))?;
            wait_for_task(ctx, data, &task.task_id, UPDATE_POLL, new.timeouts.update)
                .await
                .map_err(|e| Failure::wait("Error waiting for network policy to be updated", &e))?;
        }

        let policy = data
            .client
            .network_policies()
            .get(&id)
            .await
            .map_err(|e| Failure::api("Failed to read network policy", &e))?;
        Self::write_state(planned, &policy)
    }

    async fn delete_policy(&self, ctx: &Context, prior: &DynamicValue) -> OpResult<()> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let model = NetworkPolicyModel::from_value(prior)?;
        let timeouts = timeouts_from(prior, DEFAULT_TIMEOUTS)?;

        let _lock = data.locks.lock(model.network_id.as_str()).await;

        let result = data.client.network_policies().delete(&id).await;
        let task = match deleted(result, "Failed to delete network policy")? {
            Some(task) => task,
            None => return Ok(()),
        };

        wait_for_task(ctx, data, &task.task_id, DELETE_POLL, timeouts.delete)
            .await
            .map_err(|e| Failure::wait("Error waiting for network policy to be detached", &e))
    }
}

#[async_trait]
impl Resource for NetworkPolicyResource {
    fn type_name(&self) -> &str {
        "nimbus_network_policy"
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
        NetworkPolicyModel::read(&mut reader);
        ValidateResourceConfigResponse {
            diagnostics: reader.into_diagnostics(),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.create_policy(&ctx, &request.planned_state).await)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = self.read_policy(&request.current_state).await;
        read_response(request.current_state, result)
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let result = self
            .update_policy(&ctx, &request.prior_state, &request.planned_state)
            .await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_policy(&ctx, &request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for NetworkPolicyResource {
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
impl ResourceWithImportState for NetworkPolicyResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_passthrough_id(attr("id"), &request)
    }
}
