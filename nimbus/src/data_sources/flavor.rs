//! Flavor data source implementation
//!
//! A flavor is found either by exact name or by size: the smallest flavor
//! with at least `min_vcpus` and `min_memory_mb`. "Smallest" orders by vCPUs,
//! then memory, then disk, and finally by name so the choice is stable.

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::NumberRange;

use super::{exactly_one, read_response};
use crate::api::catalog::Flavor;
use crate::provider_data::NimbusProviderData;
use crate::resources::{configure_slot, not_configured, ConfigReader, Failure, OpResult, StateBuilder};

#[derive(Default)]
pub struct FlavorDataSource {
    provider_data: Option<NimbusProviderData>,
}

#[derive(Debug, Clone, PartialEq)]
enum FlavorLookup {
    Name(String),
    Size {
        min_vcpus: Option<u32>,
        min_memory_mb: Option<u32>,
    },
}

impl FlavorLookup {
    fn read(reader: &mut ConfigReader<'_>) -> Option<Self> {
        let name = reader.optional_string("name");
        let min_vcpus = reader.optional_integer("min_vcpus");
        let min_memory_mb = reader.optional_integer("min_memory_mb");
        let by_size = min_vcpus.is_some() || min_memory_mb.is_some();

        match name {
            Some(_) if by_size => {
                reader.error(
                    "name",
                    "Conflicting lookup",
                    "'name' cannot be combined with 'min_vcpus' or 'min_memory_mb'",
                );
                None
            }
            Some(name) => Some(Self::Name(name)),
            None if by_size => Some(Self::Size {
                min_vcpus,
                min_memory_mb,
            }),
            None => None,
        }
    }

    fn select(&self, flavors: Vec<Flavor>) -> OpResult<Flavor> {
        match self {
            Self::Name(name) => {
                let matches = flavors.into_iter().filter(|f| &f.name == name).collect();
                exactly_one(matches, "flavor", &format!("name '{}'", name))
            }
            Self::Size {
                min_vcpus,
                min_memory_mb,
            } => flavors
                .into_iter()
                .filter(|f| f.vcpus >= min_vcpus.unwrap_or(0))
                .filter(|f| f.memory_mb >= min_memory_mb.unwrap_or(0))
                .min_by(|a, b| {
                    (a.vcpus, a.memory_mb, a.disk_gb, &a.name)
                        .cmp(&(b.vcpus, b.memory_mb, b.disk_gb, &b.name))
                })
                .ok_or_else(|| {
                    Diagnostic::error(
                        "No flavor found",
                        format!(
                            "No flavor has at least {} vCPUs and {} MB of memory",
                            min_vcpus.unwrap_or(0),
                            min_memory_mb.unwrap_or(0)
                        ),
                    )
                    .into()
                }),
        }
    }
}

impl FlavorDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Looks up an instance flavor by name or minimum size")
            .attribute(AttributeBuilder::new("id", AttributeType::String).computed().build())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("min_vcpus", AttributeType::Number)
                    .optional()
                    .validator(NumberRange::integer(1, 1024))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("min_memory_mb", AttributeType::Number)
                    .optional()
                    .validator(NumberRange::integer(1, 16 * 1024 * 1024))
                    .build(),
            )
            .attribute(AttributeBuilder::new("vcpus", AttributeType::Number).computed().build())
            .attribute(AttributeBuilder::new("memory_mb", AttributeType::Number).computed().build())
            .attribute(AttributeBuilder::new("disk_gb", AttributeType::Number).computed().build())
            .build()
    }

    async fn read_flavor(&self, config: &DynamicValue) -> OpResult<DynamicValue> {
        let data = self
            .provider_data
            .as_ref()
            .ok_or_else(|| Failure::from(not_configured()))?;

        let mut reader = ConfigReader::new(config);
        let lookup = FlavorLookup::read(&mut reader);
        reader.finish()?;

        let lookup = lookup.ok_or_else(|| {
            Failure::from(Diagnostic::error(
                "Missing lookup",
                "Set 'name', or 'min_vcpus' and/or 'min_memory_mb', to look up a flavor",
            ))
        })?;

        let flavors = data
            .client
            .catalog()
            .flavors()
            .await
            .map_err(|e| Failure::api("Failed to list flavors", &e))?;
        let flavor = lookup.select(flavors)?;

        tracing::debug!(flavor_id = %flavor.id, ?lookup, "found flavor");
        Self::write_state(config, &flavor)
    }

    fn write_state(config: &DynamicValue, flavor: &Flavor) -> OpResult<DynamicValue> {
        StateBuilder::new(config)
            .string("id", &flavor.id)
            .string("name", &flavor.name)
            .number("vcpus", flavor.vcpus)
            .number("memory_mb", flavor.memory_mb)
            .number("disk_gb", flavor.disk_gb)
            .build()
    }
}

#[async_trait]
impl DataSource for FlavorDataSource {
    fn type_name(&self) -> &str {
        "nimbus_flavor"
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
        FlavorLookup::read(&mut reader);
        ValidateDataSourceConfigResponse {
            diagnostics: reader.into_diagnostics(),
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        read_response(self.read_flavor(&request.config).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for FlavorDataSource {
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

    fn flavor(name: &str, vcpus: u32, memory_mb: u32) -> Flavor {
        Flavor {
            id: format!("fl-{}", name),
            name: name.to_string(),
            vcpus,
            memory_mb,
            disk_gb: 20,
        }
    }

    fn catalog() -> Vec<Flavor> {
        vec![
            flavor("large", 8, 16384),
            flavor("small", 1, 2048),
            flavor("medium", 2, 4096),
            flavor("medium-highmem", 2, 8192),
        ]
    }

    #[test]
    fn smallest_flavor_meeting_minimums_wins() {
        let lookup = FlavorLookup::Size {
            min_vcpus: Some(2),
            min_memory_mb: Some(6000),
        };
        assert_eq!(lookup.select(catalog()).unwrap().name, "medium-highmem");

        let lookup = FlavorLookup::Size {
            min_vcpus: None,
            min_memory_mb: Some(3000),
        };
        assert_eq!(lookup.select(catalog()).unwrap().name, "medium");
    }

    #[test]
    fn unsatisfiable_minimums_are_an_error() {
        let lookup = FlavorLookup::Size {
            min_vcpus: Some(64),
            min_memory_mb: None,
        };
        let failure = lookup.select(catalog()).unwrap_err();
        assert_eq!(failure.diagnostics[0].summary, "No flavor found");
    }

    #[test]
    fn name_lookup_requires_an_exact_match() {
        let lookup = FlavorLookup::Name("medium".to_string());
        assert_eq!(lookup.select(catalog()).unwrap().id, "fl-medium");

        let lookup = FlavorLookup::Name("tiny".to_string());
        assert!(lookup.select(catalog()).is_err());
    }
}
