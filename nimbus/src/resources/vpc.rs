//! VPC resource implementation

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
use tfplug::validator::{CidrBlock, StringLength};

use super::{
    attr, configure_slot, create_response, delete_response, deleted, found, id_from_state,
    not_configured, partial_state, pending_resource_id, read_response, task_resource_id, update_response,
    ConfigReader, Failure, OpResult, StateBuilder, DEFAULT_TIMEOUTS, MUTATING_TIMEOUTS,
};
use crate::api::vpcs::{CreateVpcRequest, UpdateVpcRequest, Vpc};
use crate::provider_data::NimbusProviderData;
use crate::wait::{wait_for_task, PollSpec};

const CREATE_POLL: PollSpec = PollSpec::new(5, 3);
const UPDATE_POLL: PollSpec = PollSpec::new(2, 2);
const DELETE_POLL: PollSpec = PollSpec::new(5, 3);

#[derive(Default)]
pub struct VpcResource {
    provider_data: Option<NimbusProviderData>,
}

#[derive(Debug, Clone, PartialEq)]
struct VpcModel {
    name: String,
    cidr_block: String,
    description: Option<String>,
    timeouts: Timeouts,
}

impl VpcModel {
    fn read(reader: &mut ConfigReader<'_>) -> Self {
        Self {
            name: reader.string("name"),
            cidr_block: reader.string("cidr_block"),
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

impl VpcResource {
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
            .description("Manages a Nimbus virtual private cloud")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("VPC ID")
                    .computed()
                    .use_state_for_unknown()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the VPC")
                    .required()
                    .validator(StringLength::between(1, 63))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cidr_block", AttributeType::String)
                    .description("IPv4 address range of the VPC, e.g. 10.0.0.0/16")
                    .required()
                    .requires_replace()
                    .validator(CidrBlock::new())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("created_at", AttributeType::String)
                    .description("Creation time (RFC 3339)")
                    .computed()
                    .use_state_for_unknown()
                    .build(),
            )
            .block(Timeouts::block(MUTATING_TIMEOUTS))
            .build()
    }

    fn write_state(base: &DynamicValue, vpc: &Vpc) -> OpResult<DynamicValue> {
        StateBuilder::new(base)
            .string("id", &vpc.id)
            .string("name", &vpc.name)
            .string("cidr_block", &vpc.cidr_block)
            .optional_string("description", vpc.description.clone())
            .optional_string("created_at", vpc.created_at.map(|t| t.to_rfc3339()))
            .build()
    }

    async fn create_vpc(&self, ctx: &Context, planned: &DynamicValue) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let model = VpcModel::from_value(planned)?;

        let task = data
            .client
            .vpcs()
            .create(&CreateVpcRequest {
                name: model.name.clone(),
                cidr_block: model.cidr_block.clone(),
                description: model.description.clone(),
            })
            .await
            .map_err(|e| Failure::api("Failed to create VPC", &e))?;

        if let Err(e) =
            wait_for_task(ctx, data, &task.task_id, CREATE_POLL, model.timeouts.create).await
        {
            let failure = Failure::wait("Error waiting for VPC to be created", &e);
            return Err(match pending_resource_id(data, &task).await {
                Some(id) => failure.with_state(partial_state(planned, &id)),
                None => failure,
            });
        }

        let id = task_resource_id(data, &task, "VPC").await?;
        tracing::info!(vpc_id = %id, "created VPC");

        let vpc = data
            .client
            .vpcs()
            .get(&id)
            .await
            .map_err(|e| Failure::api("Failed to read VPC", &e).with_state(partial_state(planned, &id)))?;
        Self::write_state(planned, &vpc)
    }

    async fn read_vpc(&self, current: &DynamicValue) -> OpResult<Option<DynamicValue>> {
        let data = self.data()?;
        let id = id_from_state(current)?;

        match found(data.client.vpcs().get(&id).await, "Failed to read VPC")? {
            Some(vpc) => Self::write_state(current, &vpc).map(Some),
            None => Ok(None),
        }
    }

    async fn update_vpc(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let old = VpcModel::from_value(prior)?;
        let new = VpcModel::from_value(planned)?;

        let request = UpdateVpcRequest {
            name: (old.name != new.name).then(|| new.name.clone()),
            description: (old.description != new.description)
                .then(|| new.description.clone().unwrap_or_default()),
        };

        if request.name.is_some() || request.description.is_some() {
            let task = data
                .client
                .vpcs()
                .update(&id, &request)
                .await
                .map_err(|e| Failure::api("Failed to update VPC", &e))?;
            wait_for_task(ctx, data, &task.task_id, UPDATE_POLL, new.timeouts.update)
                .await
                .map_err(|e| Failure::wait("Error waiting for VPC to be updated", &e))?;
        }

        let vpc = data
            .client
            .vpcs()
            .get(&id)
            .await
            .map_err(|e| Failure::api("Failed to read VPC", &e))?;
        Self::write_state(planned, &vpc)
    }

    async fn delete_vpc(&self, ctx: &Context, prior: &DynamicValue) -> OpResult<()> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let timeouts = super::timeouts_from(prior, DEFAULT_TIMEOUTS)?;

        let task = match deleted(data.client.vpcs().delete(&id).await, "Failed to delete VPC")? {
            Some(task) => task,
            None => return Ok(()),
        };

        wait_for_task(ctx, data, &task.task_id, DELETE_POLL, timeouts.delete)
            .await
            .map_err(|e| Failure::wait("Error waiting for VPC to be deleted", &e))?;
        tracing::info!(vpc_id = %id, "deleted VPC");
        Ok(())
    }
}

#[async_trait]
impl Resource for VpcResource {
    fn type_name(&self) -> &str {
        "nimbus_vpc"
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
        VpcModel::read(&mut reader);
        ValidateResourceConfigResponse {
            diagnostics: reader.into_diagnostics(),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.create_vpc(&ctx, &request.planned_state).await)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = self.read_vpc(&request.current_state).await;
        read_response(request.current_state, result)
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let result = self
            .update_vpc(&ctx, &request.prior_state, &request.planned_state)
            .await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_vpc(&ctx, &request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for VpcResource {
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
impl ResourceWithImportState for VpcResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_passthrough_id(attr("id"), &request)
    }
}
