//! Network data source implementation
//!
//! Looks a network up by ID, or by name. Network names are only unique
//! within a VPC, so a name lookup can be narrowed with `vpc_id`.

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
use crate::api::networks::Network;
use crate::provider_data::NimbusProviderData;
use crate::resources::{configure_slot, not_configured, ConfigReader, Failure, OpResult, StateBuilder};

#[derive(Default)]
pub struct NetworkDataSource {
    provider_data: Option<NimbusProviderData>,
}

#[derive(Debug, Clone, PartialEq)]
enum NetworkLookup {
    Id(String),
    Name { name: String, vpc_id: Option<String> },
}

impl NetworkLookup {
    fn read(reader: &mut ConfigReader<'_>) -> Option<Self> {
        let (id, name) = id_or_name(reader);
        let vpc_id = reader.optional_string("vpc_id");
        if id.is_some() && vpc_id.is_some() {
            reader.error(
                "vpc_id",
                "Conflicting lookup",
                "'vpc_id' narrows a lookup by name and cannot be combined with 'id'",
            );
        }

        match (id, name) {
            (Some(id), _) => Some(Self::Id(id)),
            (None, Some(name)) => Some(Self::Name { name, vpc_id }),
            (None, None) => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Id(id) => format!("ID '{}'", id),
            Self::Name { name, vpc_id: None } => format!("name '{}'", name),
            Self::Name {
                name,
                vpc_id: Some(vpc_id),
            } => format!("name '{}' in VPC {}", name, vpc_id),
        }
    }
}

impl NetworkDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Looks up an existing network by ID, or by name within a VPC")
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
            .attribute(
                AttributeBuilder::new("vpc_id", AttributeType::String)
                    .description("Restricts a lookup by name to one VPC")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(AttributeBuilder::new("router_id", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("cidr_block", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("gateway_ip", AttributeType::String).computed().build())
            .attribute(
                AttributeBuilder::new("dns_servers", AttributeType::List(Box::new(AttributeType::String)))
                    .computed()
                    .build(),
            )
            .build()
    }

    async fn read_network(&self, config: &DynamicValue) -> OpResult<DynamicValue> {
        let data = self
            .provider_data
            .as_ref()
            .ok_or_else(|| Failure::from(not_configured()))?;

        let mut reader = ConfigReader::new(config);
        let lookup = NetworkLookup::read(&mut reader);
        reader.finish()?;

        let lookup = lookup.ok_or_else(|| {
            Failure::from(Diagnostic::error(
                "Missing lookup",
                "Set either 'id' or 'name' to look up a network",
            ))
        })?;

        let network = match &lookup {
            NetworkLookup::Id(id) => data
                .client
                .networks()
                .get(id)
                .await
                .map_err(|e| Failure::api("Failed to read network", &e))?,
            NetworkLookup::Name { name, vpc_id } => {
                let networks = data
                    .client
                    .networks()
                    .list(vpc_id.as_deref(), Some(name))
                    .await
                    .map_err(|e| Failure::api("Failed to list networks", &e))?;
                let matches = networks
                    .into_iter()
                    .filter(|n| &n.name == name)
                    .filter(|n| vpc_id.as_ref().map_or(true, |vpc| &n.vpc_id == vpc))
                    .collect();
                exactly_one(matches, "network", &lookup.describe())?
            }
        };

        tracing::debug!(network_id = %network.id, lookup = %lookup.describe(), "found network");
        Self::write_state(config, &network)
    }

    fn write_state(config: &DynamicValue, network: &Network) -> OpResult<DynamicValue> {
        StateBuilder::new(config)
            .string("id", &network.id)
            .string("name", &network.name)
            .string("vpc_id", &network.vpc_id)
            .optional_string("router_id", network.router_id.clone())
            .string("cidr_block", &network.cidr_block)
            .optional_string("gateway_ip", network.gateway_ip.clone())
            .strings("dns_servers", &network.dns_servers)
            .build()
    }
}

#[async_trait]
impl DataSource for NetworkDataSource {
    fn type_name(&self) -> &str {
        "nimbus_network"
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
        NetworkLookup::read(&mut reader);
        ValidateDataSourceConfigResponse {
            diagnostics: reader.into_diagnostics(),
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        read_response(self.read_network(&request.config).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for NetworkDataSource {
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

#[cfg(test)]
mod tests {
    use super::*;
    use tfplug::types::{AttributePath, Dynamic};

    fn config(pairs: &[(&str, &str)]) -> DynamicValue {
        let mut value = DynamicValue::empty_object();
        for (name, v) in pairs {
            value
                .set(&AttributePath::new(name), Dynamic::String(v.to_string()))
                .unwrap();
        }
        value
    }

    #[test]
    fn name_lookup_may_be_scoped_to_a_vpc() {
        let value = config(&[("name", "app"), ("vpc_id", "vpc-1")]);
        let mut reader = ConfigReader::new(&value);

        let lookup = NetworkLookup::read(&mut reader).unwrap();
        assert!(reader.finish().is_ok());
        assert_eq!(lookup.describe(), "name 'app' in VPC vpc-1");
    }

    #[test]
    fn vpc_id_cannot_narrow_an_id_lookup() {
        let value = config(&[("id", "net-1"), ("vpc_id", "vpc-1")]);
        let mut reader = ConfigReader::for_validation(&value);

        NetworkLookup::read(&mut reader);
        let diagnostics = reader.into_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some(AttributePath::new("vpc_id")));
    }
}
