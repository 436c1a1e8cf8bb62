//! Firewall policy resource implementation

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
use tfplug::validator::StringLength;

use super::{
    attr, configure_slot, create_response, delete_response, deleted, found, id_from_state,
    not_configured, partial_state, read_response, timeouts_from, update_response, ConfigReader,
    Failure, OpResult, StateBuilder, DEFAULT_TIMEOUTS, MUTATING_TIMEOUTS,
};
use crate::api::firewall::{
    CreateFirewallPolicyRequest, FirewallPolicy, UpdateFirewallPolicyRequest,
};
use crate::provider_data::NimbusProviderData;
use crate::wait::{wait_for_deleted, wait_for_sync, OperationError, PollSpec};

const CREATE_POLL: PollSpec = PollSpec::new(2, 2);
const UPDATE_POLL: PollSpec = PollSpec::new(2, 2);
const DELETE_POLL: PollSpec = PollSpec::new(2, 2);

/// Waits for the policy to finish applying its latest change, including
/// changes to its rules
pub(crate) async fn wait_policy_synced(
    ctx: &Context,
    data: &NimbusProviderData,
    policy_id: &str,
    spec: PollSpec,
    timeout: Duration,
) -> Result<(), OperationError> {
    wait_for_sync(ctx, data, policy_id, spec, timeout, |client, id| async move {
        client.firewall().get_policy(&id).await.map(|p| p.sync_status)
    })
    .await
}

#[derive(Default)]
pub struct FirewallPolicyResource {
    provider_data: Option<NimbusProviderData>,
}

#[derive(Debug, Clone, PartialEq)]
struct FirewallPolicyModel {
    name: String,
    description: Option<String>,
    timeouts: Timeouts,
}

impl FirewallPolicyModel {
    fn read(reader: &mut ConfigReader<'_>) -> Self {
        Self {
            name: reader.string("name"),
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

impl FirewallPolicyResource {
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
            .description("Manages a firewall policy. Rules are separate nimbus_firewall_rule resources")
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
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("rule_ids", AttributeType::List(Box::new(AttributeType::String)))
                    .description("IDs of the rules currently in the policy")
                    .computed()
                    .build(),
            )
            .block(Timeouts::block(MUTATING_TIMEOUTS))
            .build()
    }

    fn write_state(base: &DynamicValue, policy: &FirewallPolicy) -> OpResult<DynamicValue> {
        let rule_ids: Vec<String> = policy.rules.iter().map(|r| r.id.clone()).collect();
        StateBuilder::new(base)
            .string("id", &policy.id)
            .string("name", &policy.name)
            .optional_string("description", policy.description.clone())
            .strings("rule_ids", &rule_ids)
            .build()
    }

    async fn create_policy(&self, ctx: &Context, planned: &DynamicValue) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let model = FirewallPolicyModel::from_value(planned)?;

        let policy = data
            .client
            .firewall()
            .create_policy(&CreateFirewallPolicyRequest {
                name: model.name.clone(),
                description: model.description.clone(),
            })
            .await
            .map_err(|e| Failure::api("Failed to create firewall policy", &e))?;
        let id = policy.id;
        tracing::info!(policy_id = %id, "created firewall policy");

        wait_policy_synced(ctx, data, &id, CREATE_POLL, model.timeouts.create)
            .await
            .map_err(|e| {
                Failure::wait("Error waiting for firewall policy to be created", &e)
                    .with_state(partial_state(planned, &id))
            })?;

        let policy = data.client.firewall().get_policy(&id).await.map_err(|e| {
            Failure::api("Failed to read firewall policy", &e)
                .with_state(partial_state(planned, &id))
        })?;
        Self::write_state(planned, &policy)
    }

    async fn read_policy(&self, current: &DynamicValue) -> OpResult<Option<DynamicValue>> {
        let data = self.data()?;
        let id = id_from_state(current)?;

        let result = data.client.firewall().get_policy(&id).await;
        match found(result, "Failed to read firewall policy")? {
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
        let old = FirewallPolicyModel::from_value(prior)?;
        let new = FirewallPolicyModel::from_value(planned)?;

        let request = UpdateFirewallPolicyRequest {
            name: (old.name != new.name).then(|| new.name.clone()),
            description: (old.description != new.description)
                .then(|| new.description.clone().unwrap_or_default()),
        };

        if request.name.is_some() || request.description.is_some() {
            // Rules of this policy may be changing concurrently.
            let _lock = data.locks.lock(id.as_str()).await;
            data.client
                .firewall()
                .update_policy(&id, &request)
                .await
                .map_err(|e| Failure::api("Failed to update firewall policy", &e))?;
            wait_policy_synced(ctx, data, &id, UPDATE_POLL, new.timeouts.update)
                .await
                .map_err(|e| Failure::wait("Error waiting for firewall policy to be updated", &e))?;
        }

        let policy = data
            .client
            .firewall()
            .get_policy(&id)
            .await
            .map_err(|e| Failure::api("Failed to read firewall policy", &e))?;
        Self::write_state(planned, &policy)
    }

    async fn delete_policy(&self, ctx: &Context, prior: &DynamicValue) -> OpResult<()> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let timeouts = timeouts_from(prior, DEFAULT_TIMEOUTS)?;

        let result = data.client.firewall().delete_policy(&id).await;
        if deleted(result, "Failed to delete firewall policy")?.is_none() {
            return Ok(());
        }

        wait_for_deleted(ctx, data, &id, DELETE_POLL, timeouts.delete, |client, id| async move {
            client.firewall().get_policy(&id).await.map(|p| p.sync_status)
        })
        .await
        .map_err(|e| Failure::wait("Error waiting for firewall policy to be deleted", &e))
    }
}

#[async_trait]
impl Resource for FirewallPolicyResource {
    fn type_name(&self) -> &str {
        "nimbus_firewall_policy"
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
        FirewallPolicyModel::read(&mut reader);
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
impl ResourceWithConfigure for FirewallPolicyResource {
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
impl ResourceWithImportState for FirewallPolicyResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_passthrough_id(attr("id"), &request)
    }
}
