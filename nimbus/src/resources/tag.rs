//! Tag resource implementation
//!
//! One key/value pair on any Nimbus resource. Tag calls complete
//! synchronously, so there is nothing to wait for, but writes to one
//! resource's tags are serialized on that resource's ID.

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_parts;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::DynamicValue;
use tfplug::validator::{StringLength, StringMatches};

use super::{
    attr, configure_slot, create_response, delete_response, deleted, found, not_configured,
    read_response, update_response, ConfigReader, Failure, OpResult, StateBuilder,
};
use crate::api::tags::Tag;
use crate::provider_data::NimbusProviderData;

#[derive(Default)]
pub struct TagResource {
    provider_data: Option<NimbusProviderData>,
}

#[derive(Debug, Clone, PartialEq)]
struct TagModel {
    resource_id: String,
    key: String,
    value: String,
}

impl TagModel {
    fn read(reader: &mut ConfigReader<'_>) -> Self {
        Self {
            resource_id: reader.string("resource_id"),
            key: reader.string("key"),
            value: reader.string("value"),
        }
    }

    fn from_value(value: &DynamicValue) -> OpResult<Self> {
        let mut reader = ConfigReader::new(value);
        let model = Self::read(&mut reader);
        reader.finish()?;
        Ok(model)
    }

    fn id(&self) -> String {
        format!("{}/{}", self.resource_id, self.key)
    }

    fn into_tag(self) -> Tag {
        Tag {
            resource_id: self.resource_id,
            key: self.key,
            value: self.value,
        }
    }
}

impl TagResource {
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
            .description("Manages one tag on a Nimbus resource")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("<resource_id>/<key>")
                    .computed()
                    .use_state_for_unknown()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("resource_id", AttributeType::String)
                    .description("ID of the tagged resource")
                    .required()
                    .requires_replace()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("key", AttributeType::String)
                    .required()
                    .requires_replace()
                    .validator(StringMatches::new(
                        r"^[A-Za-z0-9_.:-]{1,128}$",
                        "must be 1-128 letters, digits or _ . : -",
                    ))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("value", AttributeType::String)
                    .required()
                    .validator(StringLength::between(0, 256))
                    .build(),
            )
            .build()
    }

    fn write_state(base: &DynamicValue, tag: &Tag) -> OpResult<DynamicValue> {
        StateBuilder::new(base)
            .string("id", format!("{}/{}", tag.resource_id, tag.key))
            .string("resource_id", &tag.resource_id)
            .string("key", &tag.key)
            .string("value", &tag.value)
            .build()
    }

    async fn set_tag(&self, planned: &DynamicValue, summary: &str) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let model = TagModel::from_value(planned)?;
        let id = model.id();

        let _lock = data.locks.lock(model.resource_id.as_str()).await;

        let tag = data
            .client
            .tags()
            .set(&model.into_tag())
            .await
            .map_err(|e| Failure::api(summary, &e))?;
        tracing::info!(tag = %id, "set tag");
        Self::write_state(planned, &tag)
    }

    async fn read_tag(&self, current: &DynamicValue) -> OpResult<Option<DynamicValue>> {
        let data = self.data()?;
        let mut reader = ConfigReader::new(current);
        let resource_id = reader.string("resource_id");
        let key = reader.string("key");
        reader.finish()?;

        match found(data.client.tags().get(&resource_id, &key).await, "Failed to read tag")? {
            Some(tag) => Self::write_state(current, &tag).map(Some),
            None => Ok(None),
        }
    }

    async fn delete_tag(&self, prior: &DynamicValue) -> OpResult<()> {
        let data = self.data()?;
        let model = TagModel::from_value(prior)?;

        let _lock = data.locks.lock(model.resource_id.as_str()).await;

        let result = data.client.tags().delete(&model.resource_id, &model.key).await;
        deleted(result, "Failed to delete tag")?;
        Ok(())
    }
}

#[async_trait]
impl Resource for TagResource {
    fn type_name(&self) -> &str {
        "nimbus_tag"
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
        TagModel::read(&mut reader);
        ValidateResourceConfigResponse {
            diagnostics: reader.into_diagnostics(),
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.set_tag(&request.planned_state, "Failed to create tag").await)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = self.read_tag(&request.current_state).await;
        read_response(request.current_state, result)
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let result = self
            .set_tag(&request.planned_state, "Failed to update tag")
            .await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_tag(&request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for TagResource {
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
impl ResourceWithImportState for TagResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_parts(&[attr("resource_id"), attr("key")], &request)
    }
}
