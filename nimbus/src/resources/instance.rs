//! Compute instance resource implementation
//!
//! Besides the instance itself this resource owns two kinds of dependent
//! attachments, each a separate mutating call with its own wait:
//!
//! - volumes in `volume_ids`, attached and detached through instance tasks
//!   while holding the instance's lock
//! - the floating IP in `floating_ip_id`, assigned and unassigned while
//!   holding the floating IP's lock, then waited on through its sync status
//!
//! A create that fails after the instance exists returns the instance in
//! state together with the error, so the next apply can pick it up.

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
use tfplug::validator::{StringLength, StringMatches};

use super::floating_ip::wait_floating_ip_synced;
use super::{
    attr, configure_slot, create_response, delete_response, deleted, found, id_from_state,
    not_configured, partial_state, pending_resource_id, read_response, task_resource_id, timeouts_from,
    update_response, ConfigReader, Failure, OpResult, StateBuilder, LONG_TIMEOUTS,
    MUTATING_TIMEOUTS,
};
use crate::api::instances::{CreateInstanceRequest, Instance, UpdateInstanceRequest};
use crate::provider_data::NimbusProviderData;
use crate::wait::{wait_for_task, OperationError, PollSpec};

const CREATE_POLL: PollSpec = PollSpec::new(10, 5);
const UPDATE_POLL: PollSpec = PollSpec::new(5, 3);
const DELETE_POLL: PollSpec = PollSpec::new(5, 3);
const ATTACH_POLL: PollSpec = PollSpec::new(2, 2);
const ASSIGN_POLL: PollSpec = PollSpec::new(1, 1);

#[derive(Default)]
pub struct InstanceResource {
    provider_data: Option<NimbusProviderData>,
}

#[derive(Debug, Clone, PartialEq)]
struct InstanceModel {
    name: String,
    flavor_id: String,
    image_id: String,
    network_id: String,
    ssh_key: Option<String>,
    user_data: Option<String>,
    volume_ids: Vec<String>,
    floating_ip_id: Option<String>,
    timeouts: Timeouts,
}

impl InstanceModel {
    fn read(reader: &mut ConfigReader<'_>) -> Self {
        Self {
            name: reader.string("name"),
            flavor_id: reader.string("flavor_id"),
            image_id: reader.string("image_id"),
            network_id: reader.string("network_id"),
            ssh_key: reader.optional_string("ssh_key"),
            user_data: reader.optional_string("user_data"),
            volume_ids: reader.strings("volume_ids"),
            floating_ip_id: reader.optional_string("floating_ip_id"),
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

/// Remote volume IDs in the order `configured` lists them, unknown ones last
fn ordered_like(configured: &[String], remote: &[String]) -> Vec<String> {
    let mut ordered: Vec<String> = configured
        .iter()
        .filter(|id| remote.contains(id))
        .cloned()
        .collect();
    ordered.extend(remote.iter().filter(|id| !configured.contains(id)).cloned());
    ordered
}

impl InstanceResource {
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
            .description("Manages a compute instance")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .use_state_for_unknown()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(StringMatches::new(
                        r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$",
                        "must be a valid hostname label",
                    ))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("flavor_id", AttributeType::String)
                    .description("Flavor (size) of the instance; changing it resizes in place")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("image_id", AttributeType::String)
                    .required()
                    .requires_replace()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("network_id", AttributeType::String)
                    .required()
                    .requires_replace()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ssh_key", AttributeType::String)
                    .description("Public key installed for the default user")
                    .optional()
                    .sensitive()
                    .requires_replace()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("user_data", AttributeType::String)
                    .description("cloud-init user data")
                    .optional()
                    .requires_replace()
                    .validator(StringLength::between(0, 65535))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("volume_ids", AttributeType::List(Box::new(AttributeType::String)))
                    .description("Volumes attached to the instance")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("floating_ip_id", AttributeType::String)
                    .description("Floating IP assigned to the instance")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("private_ip", AttributeType::String)
                    .computed()
                    .use_state_for_unknown()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("created_at", AttributeType::String)
                    .computed()
                    .use_state_for_unknown()
                    .build(),
            )
            .block(Timeouts::block(MUTATING_TIMEOUTS))
            .build()
    }

    // ssh_key and user_data are write-only on the API side and carried
    // over from `base`.
    fn write_state(base: &DynamicValue, instance: &Instance) -> OpResult<DynamicValue> {
        let configured = base.get_string_list(&attr("volume_ids")).unwrap_or_default();
        StateBuilder::new(base)
            .string("id", &instance.id)
            .string("name", &instance.name)
            .string("flavor_id", &instance.flavor_id)
            .string("image_id", &instance.image_id)
            .string("network_id", &instance.network_id)
            .strings("volume_ids", &ordered_like(&configured, &instance.volume_ids))
            .optional_string("floating_ip_id", instance.floating_ip_id.clone())
            .optional_string("private_ip", instance.private_ip.clone())
            .optional_string("status", instance.status.clone())
            .optional_string("created_at", instance.created_at.map(|t| t.to_rfc3339()))
            .build()
    }

    /// Best available state after a later step failed: the instance as the
    /// API reports it, else the plan with the ID
    async fn partial(data: &NimbusProviderData, planned: &DynamicValue, id: &str) -> DynamicValue {
        match data.client.instances().get(id).await {
            Ok(instance) => Self::write_state(planned, &instance)
                .unwrap_or_else(|_| partial_state(planned, id)),
            Err(e) => {
                tracing::warn!(instance_id = %id, error = %e, "could not read back partially created instance");
                partial_state(planned, id)
            }
        }
    }

    async fn attach_volumes(
        ctx: &Context,
        data: &NimbusProviderData,
        id: &str,
        volume_ids: &[String],
        timeout: Duration,
    ) -> OpResult<()> {
        if volume_ids.is_empty() {
            return Ok(());
        }
        let _lock = data.locks.lock(id).await;

        for volume_id in volume_ids {
            let task = data
                .client
                .instances()
                .attach_volume(id, volume_id)
                .await
                .map_err(|e| Failure::api(&format!("Failed to attach volume {}", volume_id), &e))?;
            wait_for_task(ctx, data, &task.task_id, ATTACH_POLL, timeout)
                .await
                .map_err(|e| {
                    Failure::wait(&format!("Error waiting for volume {} to attach", volume_id), &e)
                })?;
            tracing::info!(instance_id = %id, %volume_id, "attached volume");
        }
        Ok(())
    }

    async fn detach_volumes(
        ctx: &Context,
        data: &NimbusProviderData,
        id: &str,
        volume_ids: &[String],
        timeout: Duration,
    ) -> OpResult<()> {
        if volume_ids.is_empty() {
            return Ok(());
        }
        let _lock = data.locks.lock(id).await;

        for volume_id in volume_ids {
            let result = data.client.instances().detach_volume(id, volume_id).await;
            let summary = format!("Failed to detach volume {}", volume_id);
            let Some(task) = deleted(result, &summary)? else {
                continue;
            };
            wait_for_task(ctx, data, &task.task_id, ATTACH_POLL, timeout)
                .await
                .map_err(|e| {
                    Failure::wait(&format!("Error waiting for volume {} to detach", volume_id), &e)
                })?;
            tracing::info!(instance_id = %id, %volume_id, "detached volume");
        }
        Ok(())
    }

    async fn assign_floating_ip(
        ctx: &Context,
        data: &NimbusProviderData,
        id: &str,
        floating_ip_id: &str,
        timeout: Duration,
    ) -> OpResult<()> {
        let _lock = data.locks.lock(floating_ip_id).await;

        data.client
            .floating_ips()
            .assign(floating_ip_id, id)
            .await
            .map_err(|e| Failure::api("Failed to assign floating IP", &e))?;
        wait_floating_ip_synced(ctx, data, floating_ip_id, ASSIGN_POLL, timeout)
            .await
            .map_err(|e| Failure::wait("Error waiting for floating IP to be assigned", &e))?;
        tracing::info!(instance_id = %id, %floating_ip_id, "assigned floating IP");
        Ok(())
    }

    async fn unassign_floating_ip(
        ctx: &Context,
        data: &NimbusProviderData,
        floating_ip_id: &str,
        timeout: Duration,
    ) -> OpResult<()> {
        let _lock = data.locks.lock(floating_ip_id).await;

        let result = data.client.floating_ips().unassign(floating_ip_id).await;
        if deleted(result, "Failed to unassign floating IP")?.is_none() {
            return Ok(());
        }
        match wait_floating_ip_synced(ctx, data, floating_ip_id, ASSIGN_POLL, timeout).await {
            Ok(()) | Err(OperationError::Vanished(_)) => Ok(()),
            Err(e) => Err(Failure::wait("Error waiting for floating IP to be unassigned", &e)),
        }
    }

    async fn create_instance(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
    ) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let model = InstanceModel::from_value(planned)?;

        let task = data
            .client
            .instances()
            .create(&CreateInstanceRequest {
                name: model.name.clone(),
                flavor_id: model.flavor_id.clone(),
                image_id: model.image_id.clone(),
                network_id: model.network_id.clone(),
                ssh_key: model.ssh_key.clone(),
                user_data: model.user_data.clone(),
            })
            .await
            .map_err(|e| Failure::api("Failed to create instance", &e))?;

        if let Err(e) =
            wait_for_task(ctx, data, &task.task_id, CREATE_POLL, model.timeouts.create).await
        {
            let failure = Failure::wait("Error waiting for instance to be created", &e);
            return Err(match pending_resource_id(data, &task).await {
                Some(id) => failure.with_state(Self::partial(data, planned, &id).await),
                None => failure,
            });
        }

        let id = task_resource_id(data, &task, "instance").await?;
        tracing::info!(instance_id = %id, "created instance");

        let attachments = async {
            Self::attach_volumes(ctx, data, &id, &model.volume_ids, model.timeouts.create).await?;
            if let Some(floating_ip_id) = &model.floating_ip_id {
                Self::assign_floating_ip(ctx, data, &id, floating_ip_id, model.timeouts.create)
                    .await?;
            }
            Ok::<_, Failure>(())
        };
        if let Err(failure) = attachments.await {
            return Err(failure.with_state(Self::partial(data, planned, &id).await));
        }

        let instance = data.client.instances().get(&id).await.map_err(|e| {
            Failure::api("Failed to read instance", &e).with_state(partial_state(planned, &id))
        })?;
        Self::write_state(planned, &instance)
    }

    async fn read_instance(&self, current: &DynamicValue) -> OpResult<Option<DynamicValue>> {
        let data = self.data()?;
        let id = id_from_state(current)?;

        match found(data.client.instances().get(&id).await, "Failed to read instance")? {
            Some(instance) => Self::write_state(current, &instance).map(Some),
            None => Ok(None),
        }
    }

    async fn update_instance(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let old = InstanceModel::from_value(prior)?;
        let new = InstanceModel::from_value(planned)?;
        let timeout = new.timeouts.update;

        let request = UpdateInstanceRequest {
            name: (old.name != new.name).then(|| new.name.clone()),
            flavor_id: (old.flavor_id != new.flavor_id).then(|| new.flavor_id.clone()),
        };
        if request.name.is_some() || request.flavor_id.is_some() {
            let task = data
                .client
                .instances()
                .update(&id, &request)
                .await
                .map_err(|e| Failure::api("Failed to update instance", &e))?;
            wait_for_task(ctx, data, &task.task_id, UPDATE_POLL, timeout)
                .await
                .map_err(|e| Failure::wait("Error waiting for instance to be updated", &e))?;
        }

        let steps = async {
            let detach: Vec<String> = old
                .volume_ids
                .iter()
                .filter(|v| !new.volume_ids.contains(v))
                .cloned()
                .collect();
            let attach: Vec<String> = new
                .volume_ids
                .iter()
                .filter(|v| !old.volume_ids.contains(v))
                .cloned()
                .collect();
            Self::detach_volumes(ctx, data, &id, &detach, timeout).await?;
            Self::attach_volumes(ctx, data, &id, &attach, timeout).await?;

            if old.floating_ip_id != new.floating_ip_id {
                if let Some(previous) = &old.floating_ip_id {
                    Self::unassign_floating_ip(ctx, data, previous, timeout).await?;
                }
                if let Some(next) = &new.floating_ip_id {
                    Self::assign_floating_ip(ctx, data, &id, next, timeout).await?;
                }
            }
            Ok::<_, Failure>(())
        };
        if let Err(failure) = steps.await {
            // Report what actually got attached rather than the plan.
            return Err(match data.client.instances().get(&id).await {
                Ok(instance) => match Self::write_state(prior, &instance) {
                    Ok(state) => failure.with_state(state),
                    Err(_) => failure,
                },
                Err(_) => failure,
            });
        }

        let instance = data
            .client
            .instances()
            .get(&id)
            .await
            .map_err(|e| Failure::api("Failed to read instance", &e))?;
        Self::write_state(planned, &instance)
    }

    async fn delete_instance(&self, ctx: &Context, prior: &DynamicValue) -> OpResult<()> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let timeouts = timeouts_from(prior, LONG_TIMEOUTS)?;

        let task = match deleted(
            data.client.instances().delete(&id).await,
            "Failed to delete instance",
        )? {
            Some(task) => task,
            None => return Ok(()),
        };

        wait_for_task(ctx, data, &task.task_id, DELETE_POLL, timeouts.delete)
            .await
            .map_err(|e| Failure::wait("Error waiting for instance to be deleted", &e))?;
        tracing::info!(instance_id = %id, "deleted instance");
        Ok(())
    }
}

#[async_trait]
impl Resource for InstanceResource {
    fn type_name(&self) -> &str {
        "nimbus_instance"
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
        let model = InstanceModel::read(&mut reader);

        let mut seen = std::collections::HashSet::new();
        for volume_id in &model.volume_ids {
            if !seen.insert(volume_id) {
                reader.error(
                    "volume_ids",
                    "Duplicate volume",
                    format!("Volume {} is listed more than once", volume_id),
                );
            }
        }

        ValidateResourceConfigResponse {
            diagnostics: reader.into_diagnostics(),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.create_instance(&ctx, &request.planned_state).await)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = self.read_instance(&request.current_state).await;
        read_response(request.current_state, result)
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let result = self
            .update_instance(&ctx, &request.prior_state, &request.planned_state)
            .await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_instance(&ctx, &request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for InstanceResource {
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
impl ResourceWithImportState for InstanceResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_passthrough_id(attr("id"), &request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn remote_volumes_follow_configured_order() {
        let configured = ids(&["vol-b", "vol-a", "vol-gone"]);
        let remote = ids(&["vol-a", "vol-c", "vol-b"]);

        assert_eq!(ordered_like(&configured, &remote), ids(&["vol-b", "vol-a", "vol-c"]));
    }

    #[test]
    fn hostname_rule_rejects_uppercase() {
        let schema = InstanceResource::schema_static();
        let mut config = DynamicValue::empty_object();
        for (name, value) in [
            ("name", "Web-1"),
            ("flavor_id", "f-small"),
            ("image_id", "img-1"),
            ("network_id", "net-1"),
        ] {
            config.set_string(&attr(name), value.to_string()).unwrap();
        }

        let diagnostics = schema.validate(&config);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].detail.contains("hostname"));
    }
}
