//! Block storage volume resource implementation
//!
//! Volumes can grow in place. Shrinking is rejected before any API call
//! since the platform cannot reduce a volume's size.

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
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::{NumberRange, StringLength};

use super::{
    attr, configure_slot, create_response, delete_response, deleted, found, id_from_state,
    not_configured, partial_state, pending_resource_id, read_response, task_resource_id, timeouts_from,
    update_response, ConfigReader, Failure, OpResult, StateBuilder, DEFAULT_TIMEOUTS,
    MUTATING_TIMEOUTS,
};
use crate::api::volumes::{CreateVolumeRequest, UpdateVolumeRequest, Volume};
use crate::api::VolumeType;
use crate::provider_data::NimbusProviderData;
use crate::wait::{wait_for_task, PollSpec};

const CREATE_POLL: PollSpec = PollSpec::new(3, 2);
const UPDATE_POLL: PollSpec = PollSpec::new(3, 2);
const DELETE_POLL: PollSpec = PollSpec::new(3, 2);

const MAX_SIZE_GB: i64 = 16384;

#[derive(Default)]
pub struct VolumeResource {
    provider_data: Option<NimbusProviderData>,
}

#[derive(Debug, Clone, PartialEq)]
struct VolumeModel {
    name: String,
    size_gb: u32,
    volume_type: VolumeType,
    timeouts: Timeouts,
}

impl VolumeModel {
    fn read(reader: &mut ConfigReader<'_>) -> Self {
        Self {
            name: reader.string("name"),
            size_gb: reader.integer("size_gb"),
            volume_type: reader.enum_or("volume_type", VolumeType::Standard),
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

impl VolumeResource {
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
            .description("Manages a block storage volume")
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
                AttributeBuilder::new("size_gb", AttributeType::Number)
                    .description("Size in GiB. Can be increased in place but never reduced")
                    .required()
                    .validator(NumberRange::integer(1, MAX_SIZE_GB))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("volume_type", AttributeType::String)
                    .description("One of standard, ssd or nvme")
                    .optional()
                    .computed()
                    .requires_replace()
                    .default(StaticDefault::string(VolumeType::Standard.as_str()))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("attached_to", AttributeType::String)
                    .description("ID of the instance the volume is attached to")
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

    fn write_state(base: &DynamicValue, volume: &Volume) -> OpResult<DynamicValue> {
        StateBuilder::new(base)
            .string("id", &volume.id)
            .string("name", &volume.name)
            .number("size_gb", volume.size_gb)
            .string("volume_type", volume.volume_type.as_str())
            .optional_string("status", volume.status.clone())
            .optional_string("attached_to", volume.attached_to.clone())
            .optional_string("created_at", volume.created_at.map(|t| t.to_rfc3339()))
            .build()
    }

    async fn create_volume(&self, ctx: &Context, planned: &DynamicValue) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let model = VolumeModel::from_value(planned)?;

        let task = data
            .client
            .volumes()
            .create(&CreateVolumeRequest {
                name: model.name.clone(),
                size_gb: model.size_gb,
                volume_type: model.volume_type,
            })
            .await
            .map_err(|e| Failure::api("Failed to create volume", &e))?;

        if let Err(e) =
            wait_for_task(ctx, data, &task.task_id, CREATE_POLL, model.timeouts.create).await
        {
            let failure = Failure::wait("Error waiting for volume to be created", &e);
            return Err(match pending_resource_id(data, &task).await {
                Some(id) => failure.with_state(partial_state(planned, &id)),
                None => failure,
            });
        }

        let id = task_resource_id(data, &task, "volume").await?;
        tracing::info!(volume_id = %id, size_gb = model.size_gb, "created volume");

        let volume = data.client.volumes().get(&id).await.map_err(|e| {
            Failure::api("Failed to read volume", &e).with_state(partial_state(planned, &id))
        })?;
        Self::write_state(planned, &volume)
    }

    async fn read_volume(&self, current: &DynamicValue) -> OpResult<Option<DynamicValue>> {
        let data = self.data()?;
        let id = id_from_state(current)?;

        match found(data.client.volumes().get(&id).await, "Failed to read volume")? {
            Some(volume) => Self::write_state(current, &volume).map(Some),
            None => Ok(None),
        }
    }

    async fn update_volume(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let old = VolumeModel::from_value(prior)?;
        let new = VolumeModel::from_value(planned)?;

        if new.size_gb < old.size_gb {
            return Err(Diagnostic::error(
                "Volume cannot be shrunk",
                format!(
                    "size_gb can only grow: {} GiB is smaller than the current {} GiB",
                    new.size_gb, old.size_gb
                ),
            )
            .with_attribute(attr("size_gb"))
            .into());
        }

        let request = UpdateVolumeRequest {
            name: (old.name != new.name).then(|| new.name.clone()),
            size_gb: (old.size_gb != new.size_gb).then_some(new.size_gb),
        };

        if request.name.is_some() || request.size_gb.is_some() {
            let task = data
                .client
                .volumes()
                .update(&id, &request)
                .await
                .map_err(|e| Failure::api("Failed to update volume", &e))?;
            wait_for_task(ctx, data, &task.task_id, UPDATE_POLL, new.timeouts.update)
                .await
                .map_err(|e| Failure::wait("Error waiting for volume to be updated", &e))?;
        }

        let volume = data
            .client
            .volumes()
            .get(&id)
            .await
            .map_err(|e| Failure::api("Failed to read volume", &e))?;
        Self::write_state(planned, &volume)
    }

    async fn delete_volume(&self, ctx: &Context, prior: &DynamicValue) -> OpResult<()> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let timeouts = timeouts_from(prior, DEFAULT_TIMEOUTS)?;

        let task = match deleted(data.client.volumes().delete(&id).await, "Failed to delete volume")? {
            Some(task) => task,
            None => return Ok(()),
        };

        wait_for_task(ctx, data, &task.task_id, DELETE_POLL, timeouts.delete)
            .await
            .map_err(|e| Failure::wait("Error waiting for volume to be deleted", &e))
    }
}

#[async_trait]
impl Resource for VolumeResource {
    fn type_name(&self) -> &str {
        "nimbus_volume"
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
        VolumeModel::read(&mut reader);
        ValidateResourceConfigResponse {
            diagnostics: reader.into_diagnostics(),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.create_volume(&ctx, &request.planned_state).await)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = self.read_volume(&request.current_state).await;
        read_response(request.current_state, result)
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let result = self
            .update_volume(&ctx, &request.prior_state, &request.planned_state)
            .await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_volume(&ctx, &request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for VolumeResource {
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
impl ResourceWithImportState for VolumeResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_passthrough_id(attr("id"), &request)
    }
}
