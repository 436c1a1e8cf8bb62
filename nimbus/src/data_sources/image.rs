//! Image data source implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::DynamicValue;
use tfplug::validator::StringLength;

use super::{exactly_one, read_response};
use crate::api::catalog::Image;
use crate::provider_data::NimbusProviderData;
use crate::resources::{configure_slot, not_configured, ConfigReader, Failure, OpResult, StateBuilder};

#[derive(Default)]
pub struct ImageDataSource {
    provider_data: Option<NimbusProviderData>,
}

impl ImageDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Looks up a boot image in the Nimbus catalog")
            .attribute(AttributeBuilder::new("id", AttributeType::String).computed().build())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(StringLength::at_least(1))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("os", AttributeType::String)
                    .description("Operating system family, e.g. linux")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(AttributeBuilder::new("version", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("min_disk_gb", AttributeType::Number).computed().build())
            .build()
    }

    async fn read_image(&self, config: &DynamicValue) -> OpResult<DynamicValue> {
        let data = self
            .provider_data
            .as_ref()
            .ok_or_else(|| Failure::from(not_configured()))?;

        let mut reader = ConfigReader::new(config);
        let name = reader.string("name");
        let os = reader.optional_string("os");
        reader.finish()?;

        let images = data
            .client
            .catalog()
            .images(Some(&name), os.as_deref())
            .await
            .map_err(|e| Failure::api("Failed to list images", &e))?;

        let query = match &os {
            Some(os) => format!("name '{}' and os '{}'", name, os),
            None => format!("name '{}'", name),
        };
        let matches = images
            .into_iter()
            .filter(|i| i.name == name)
            .filter(|i| os.as_ref().map_or(true, |os| &i.os == os))
            .collect();
        let image = exactly_one(matches, "image", &query)?;

        tracing::debug!(image_id = %image.id, "found image");
        Self::write_state(config, &image)
    }

    fn write_state(config: &DynamicValue, image: &Image) -> OpResult<DynamicValue> {
        StateBuilder::new(config)
            .string("id", &image.id)
            .string("name", &image.name)
            .string("os", &image.os)
            .optional_string("version", image.version.clone())
            .optional_number("min_disk_gb", image.min_disk_gb)
            .build()
    }
}

#[async_trait]
impl DataSource for ImageDataSource {
    fn type_name(&self) -> &str {
        "nimbus_image"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        read_response(self.read_image(&request.config).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for ImageDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        ConfigureDataSourceResponse {
            diagnostics: configure_slot(&mut self.provider_data, request.provider_data),
        }
    }
}
