//! VPC data source implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};

use super::{exactly_one, id_or_name, read_response};
use crate::api::vpcs::Vpc;
use crate::provider_data::NimbusProviderData;
use crate::resources::{configure_slot, not_configured, ConfigReader, Failure, OpResult, StateBuilder};

#[derive(Default)]
pub struct VpcDataSource {
    provider_data: Option<NimbusProviderData>,
}

impl VpcDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Looks up an existing VPC by ID or name")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(AttributeBuilder::new("cidr_block", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("description", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("created_at", AttributeType::String).computed().build())
            .build()
    }

    async fn read_vpc(&self, config: &DynamicValue) -> OpResult<DynamicValue> {
        let data = self
            .provider_data
            .as_ref()
            .ok_or_else(|| Failure::from(not_configured()))?;

        let mut reader = ConfigReader::new(config);
        let (id, name) = id_or_name(&mut reader);
        reader.finish()?;

        let vpc = match (id, name) {
            (Some(id), _) => data
                .client
                .vpcs()
                .get(&id)
                .await
                .map_err(|e| Failure::api("Failed to read VPC", &e))?,
            (None, Some(name)) => {
                let vpcs = data
                    .client
                    .vpcs()
                    .list(Some(&name))
                    .await
                    .map_err(|e| Failure::api("Failed to list VPCs", &e))?;
                // keep exact matches only
                let matches = vpcs.into_iter().filter(|v| v.name == name).collect();
                exactly_one(matches, "VPC", &format!("name '{}'", name))?
            }
            (None, None) => {
                return Err(Diagnostic::error(
                    "Missing lookup",
                    "Set either 'id' or 'name' to look up a VPC",
                )
                .into())
            }
        };

        tracing::debug!(vpc_id = %vpc.id, "found VPC");
        Self::write_state(config, &vpc)
    }

    fn write_state(config: &DynamicValue, vpc: &Vpc) -> OpResult<DynamicValue> {
        StateBuilder::new(config)
            .string("id", &vpc.id)
            .string("name", &vpc.name)
            .string("cidr_block", &vpc.cidr_block)
            .optional_string("description", vpc.description.clone())
            .optional_string("created_at", vpc.created_at.map(|t| t.to_rfc3339()))
            .build()
    }
}

#[async_trait]
impl DataSource for VpcDataSource {
    fn type_name(&self) -> &str {
        "nimbus_vpc"
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
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        let mut reader = ConfigReader::for_validation(&request.config);
        id_or_name(&mut reader);
        ValidateDataSourceConfigResponse {
            diagnostics: reader.into_diagnostics(),
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        read_response(self.read_vpc(&request.config).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for VpcDataSource {
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
