//! Terraform provider for the Nimbus cloud platform
//!
//! [`NimbusProvider`] implements [`tfplug::Provider`]. Configuration builds
//! one API [`api::Client`] that every resource and data source shares
//! through [`NimbusProviderData`].

pub mod api;
pub mod config;
pub mod data_sources;
pub mod provider_data;
pub mod resources;
pub mod wait;

pub use provider_data::{NimbusProviderData, Polling};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tfplug::context::Context;
use tfplug::data_source::DataSourceWithConfigure;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory, ValidateProviderConfigRequest,
    ValidateProviderConfigResponse,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::Diagnostic;

use crate::api::{Client, RetryConfig};
use crate::config::ProviderConfig;

pub const PROVIDER_NAME: &str = "nimbus";

#[derive(Default)]
pub struct NimbusProvider {
    provider_data: Option<NimbusProviderData>,
    polling: Polling,
}

impl NimbusProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Polling used by resources once configured
    pub fn with_polling(mut self, polling: Polling) -> Self {
        self.polling = polling;
        self
    }

    pub fn provider_data(&self) -> Option<&NimbusProviderData> {
        self.provider_data.as_ref()
    }

    fn schema_static() -> Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();

        SCHEMA
            .get_or_init(|| {
                SchemaBuilder::new()
                    .version(0)
                    .description("Manages infrastructure on the Nimbus cloud platform")
                    .attribute(
                        AttributeBuilder::new("endpoint", AttributeType::String)
                            .description("Nimbus API URL. Defaults to NIMBUS_ENDPOINT")
                            .optional()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("api_key", AttributeType::String)
                            .description("API key. Defaults to NIMBUS_API_KEY, then API_KEY")
                            .optional()
                            .sensitive()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("insecure", AttributeType::Bool)
                            .description("Skip TLS certificate verification. Defaults to NIMBUS_INSECURE")
                            .optional()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("request_timeout", AttributeType::String)
                            .description("Timeout for a single API request, e.g. \"30s\"")
                            .optional()
                            .build(),
                    )
                    .build()
            })
            .clone()
    }

    fn build_client(config: &ProviderConfig) -> Result<Client, Diagnostic> {
        let retry_config = RetryConfig {
            timeout_seconds: config.request_timeout.as_secs().max(1),
            ..RetryConfig::default()
        };
        Client::with_config(&config.endpoint, &config.api_key, config.insecure, retry_config)
            .map_err(|e| {
                Diagnostic::error(
                    "Failed to create API client",
                    format!("Failed to create API client: {}", e),
                )
            })
    }
}

fn resource<R>() -> ResourceFactory
where
    R: ResourceWithConfigure + Default + 'static,
{
    Box::new(|| Box::new(R::default()) as Box<dyn ResourceWithConfigure>)
}

fn data_source<D>() -> DataSourceFactory
where
    D: DataSourceWithConfigure + Default + 'static,
{
    Box::new(|| Box::new(D::default()) as Box<dyn DataSourceWithConfigure>)
}

#[async_trait]
impl Provider for NimbusProvider {
    fn type_name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse {
        ValidateProviderConfigResponse {
            diagnostics: config::validate(&request.config),
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let config = match ProviderConfig::from_value(&request.config) {
            Ok(config) => config,
            Err(diagnostics) => {
                return ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                }
            }
        };

        let client = match Self::build_client(&config) {
            Ok(client) => client,
            Err(diagnostic) => {
                return ConfigureProviderResponse {
                    diagnostics: vec![diagnostic],
                    provider_data: None,
                }
            }
        };

        tracing::info!(
            endpoint = %config.endpoint,
            insecure = config.insecure,
            terraform_version = %request.terraform_version,
            "configured Nimbus provider"
        );

        let data = NimbusProviderData::new(client).with_polling(self.polling);
        self.provider_data = Some(data.clone());

        ConfigureProviderResponse {
            diagnostics: vec![],
            provider_data: Some(Arc::new(data)),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        use resources::*;

        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert("nimbus_vpc".to_string(), resource::<VpcResource>());
        factories.insert("nimbus_router".to_string(), resource::<RouterResource>());
        factories.insert("nimbus_network".to_string(), resource::<NetworkResource>());
        factories.insert("nimbus_volume".to_string(), resource::<VolumeResource>());
        factories.insert("nimbus_instance".to_string(), resource::<InstanceResource>());
        factories.insert("nimbus_floating_ip".to_string(), resource::<FloatingIpResource>());
        factories.insert(
            "nimbus_firewall_policy".to_string(),
            resource::<FirewallPolicyResource>(),
        );
        factories.insert("nimbus_firewall_rule".to_string(), resource::<FirewallRuleResource>());
        factories.insert(
            "nimbus_network_policy".to_string(),
            resource::<NetworkPolicyResource>(),
        );
        factories.insert("nimbus_vpn_gateway".to_string(), resource::<VpnGatewayResource>());
        factories.insert(
            "nimbus_vpn_connection".to_string(),
            resource::<VpnConnectionResource>(),
        );
        factories.insert("nimbus_load_balancer".to_string(), resource::<LoadBalancerResource>());
        factories.insert("nimbus_tag".to_string(), resource::<TagResource>());
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        use data_sources::*;

        let mut factories: HashMap<String, DataSourceFactory> = HashMap::new();
        factories.insert("nimbus_vpc".to_string(), data_source::<VpcDataSource>());
        factories.insert("nimbus_network".to_string(), data_source::<NetworkDataSource>());
        factories.insert("nimbus_image".to_string(), data_source::<ImageDataSource>());
        factories.insert("nimbus_flavor".to_string(), data_source::<FlavorDataSource>());
        factories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tfplug::data_source::DataSourceSchemaRequest;
    use tfplug::resource::ResourceSchemaRequest;
    use tfplug::types::{AttributePath, Dynamic, DynamicValue};

    fn clear_env() {
        for name in [
            config::ENV_ENDPOINT,
            config::ENV_API_KEY,
            config::ENV_API_KEY_FALLBACK,
            config::ENV_INSECURE,
        ] {
            std::env::remove_var(name);
        }
    }

    #[tokio::test]
    async fn factories_build_components_with_matching_type_names() {
        let provider = NimbusProvider::new();

        let resources = provider.resources();
        assert_eq!(resources.len(), 13);
        for (name, factory) in &resources {
            let resource = factory();
            assert_eq!(resource.type_name(), name);
            let schema = resource.schema(Context::new(), ResourceSchemaRequest).await.schema;
            assert!(schema.attribute("id").is_some(), "{} has no id", name);
        }

        let data_sources = provider.data_sources();
        assert_eq!(data_sources.len(), 4);
        for (name, factory) in &data_sources {
            let data_source = factory();
            assert_eq!(data_source.type_name(), name);
            let schema = data_source
                .schema(Context::new(), DataSourceSchemaRequest)
                .await
                .schema;
            assert!(schema.attribute("id").is_some(), "{} has no id", name);
        }
    }

    #[test]
    fn api_key_is_sensitive() {
        let schema = NimbusProvider::schema_static();
        let api_key = schema.attribute("api_key").unwrap();
        assert!(api_key.sensitive);
        assert!(api_key.optional);
    }

    #[tokio::test]
    #[serial]
    async fn configure_shares_provider_data() {
        clear_env();
        std::env::set_var(config::ENV_ENDPOINT, "https://api.nimbus.example");
        std::env::set_var(config::ENV_API_KEY, "secret");

        let mut provider = NimbusProvider::new().with_polling(Polling::Immediate);
        let response = provider
            .configure(
                Context::new(),
                ConfigureProviderRequest {
                    terraform_version: "1.9.0".to_string(),
                    config: DynamicValue::empty_object(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        let shared = response.provider_data.unwrap();
        let data = shared.downcast_ref::<NimbusProviderData>().unwrap();
        assert_eq!(data.client.base_url(), "https://api.nimbus.example/v1");
        assert_eq!(data.polling, Polling::Immediate);
        assert!(provider.provider_data().is_some());
        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn configure_requires_endpoint_and_api_key() {
        clear_env();

        let mut provider = NimbusProvider::new();
        let mut config = DynamicValue::empty_object();
        config
            .set(&AttributePath::new("insecure"), Dynamic::Bool(true))
            .unwrap();

        let response = provider
            .configure(
                Context::new(),
                ConfigureProviderRequest {
                    terraform_version: "1.9.0".to_string(),
                    config,
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 2);
        assert!(response.provider_data.is_none());
        assert!(provider.provider_data().is_none());
    }
}
