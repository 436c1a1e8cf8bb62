//! Protocol-independent dispatch of Terraform operations
//!
//! [`ProviderHost`] owns a provider and routes every Terraform RPC to the
//! right resource or data source: it builds a fresh instance from the
//! factory, hands it the provider data, and calls it. Planning logic that is
//! the same for every resource (defaults, computed attributes, plan
//! modifiers) lives here.

use crate::context::Context;
use crate::data_source::{
    ConfigureDataSourceRequest, DataSourceSchemaRequest,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest,
};
use crate::provider::{
    ConfigureProviderRequest, DataSourceFactory, Provider, ProviderSchemaRequest,
    ResourceFactory, ValidateProviderConfigRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, ResourceSchemaRequest, ResourceWithConfigure, UpdateResourceRequest,
    ValidateResourceConfigRequest,
};
use crate::schema::{DefaultRequest, PlanModifierRequest, Schema};
use crate::types::{has_errors, AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct ProviderSchemas {
    pub provider: Schema,
    pub resources: HashMap<String, Schema>,
    pub data_sources: HashMap<String, Schema>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct PlanResourceChangeResponse {
    pub planned_state: DynamicValue,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ApplyResourceChangeResponse {
    /// None after a successful delete
    pub new_state: Option<DynamicValue>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ProviderHost<P: Provider> {
    provider: RwLock<P>,
    provider_data: RwLock<Option<Arc<dyn Any + Send + Sync>>>,
    resources: HashMap<String, ResourceFactory>,
    data_sources: HashMap<String, DataSourceFactory>,
    stop: Context,
}

impl<P: Provider> ProviderHost<P> {
    pub fn new(provider: P) -> Self {
        let resources = provider.resources();
        let data_sources = provider.data_sources();
        Self {
            provider: RwLock::new(provider),
            provider_data: RwLock::new(None),
            resources,
            data_sources,
            stop: Context::new(),
        }
    }

    /// Cancels every in-flight and future operation, as Terraform's
    /// `StopProvider` does when a run is interrupted
    pub fn stop(&self) {
        tracing::info!("stopping provider operations");
        self.stop.cancel();
    }

    fn context(&self) -> Context {
        self.stop.clone()
    }

    pub async fn get_schema(&self) -> ProviderSchemas {
        let provider = self.provider.read().await;
        let response = provider
            .schema(self.context(), ProviderSchemaRequest)
            .await;
        let mut diagnostics = response.diagnostics;

        let mut resources = HashMap::new();
        for (name, factory) in &self.resources {
            let schema = factory()
                .schema(self.context(), ResourceSchemaRequest)
                .await;
            diagnostics.extend(schema.diagnostics);
            resources.insert(name.clone(), schema.schema);
        }

        let mut data_sources = HashMap::new();
        for (name, factory) in &self.data_sources {
            let schema = factory()
                .schema(self.context(), DataSourceSchemaRequest)
                .await;
            diagnostics.extend(schema.diagnostics);
            data_sources.insert(name.clone(), schema.schema);
        }

        ProviderSchemas {
            provider: response.schema,
            resources,
            data_sources,
            diagnostics,
        }
    }

    pub async fn validate_provider_config(&self, config: DynamicValue) -> Vec<Diagnostic> {
        let provider = self.provider.read().await;
        let schema = provider
            .schema(self.context(), ProviderSchemaRequest)
            .await
            .schema;
        let mut diagnostics = schema.validate(&config);
        let response = provider
            .validate(self.context(), ValidateProviderConfigRequest { config })
            .await;
        diagnostics.extend(response.diagnostics);
        diagnostics
    }

    pub async fn configure(&self, terraform_version: &str, config: DynamicValue) -> Vec<Diagnostic> {
        let mut provider = self.provider.write().await;
        let response = provider
            .configure(
                self.context(),
                ConfigureProviderRequest {
                    terraform_version: terraform_version.to_string(),
                    config,
                },
            )
            .await;

        if !has_errors(&response.diagnostics) {
            *self.provider_data.write().await = response.provider_data;
        }
        response.diagnostics
    }

    pub async fn validate_resource_config(
        &self,
        type_name: &str,
        config: DynamicValue,
    ) -> Vec<Diagnostic> {
        let factory = match self.resources.get(type_name) {
            Some(factory) => factory,
            None => return vec![unknown_type("resource", type_name)],
        };
        let resource = factory();
        let schema = resource
            .schema(self.context(), ResourceSchemaRequest)
            .await
            .schema;

        let mut diagnostics = schema.validate(&config);
        let response = resource
            .validate(
                self.context(),
                ValidateResourceConfigRequest {
                    type_name: type_name.to_string(),
                    config,
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);
        diagnostics
    }

    pub async fn validate_data_source_config(
        &self,
        type_name: &str,
        config: DynamicValue,
    ) -> Vec<Diagnostic> {
        let factory = match self.data_sources.get(type_name) {
            Some(factory) => factory,
            None => return vec![unknown_type("data source", type_name)],
        };
        let data_source = factory();
        let schema = data_source
            .schema(self.context(), DataSourceSchemaRequest)
            .await
            .schema;

        let mut diagnostics = schema.validate(&config);
        let response = data_source
            .validate(
                self.context(),
                ValidateDataSourceConfigRequest {
                    type_name: type_name.to_string(),
                    config,
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);
        diagnostics
    }

    /// Plans a change:
    /// 1. applies defaults to optional+computed attributes left null
    /// 2. marks other computed attributes left null as unknown when something changed
    /// 3. runs plan modifiers and collects requires-replace paths
    pub async fn plan_resource_change(
        &self,
        type_name: &str,
        prior_state: DynamicValue,
        proposed_new_state: DynamicValue,
        config: DynamicValue,
    ) -> PlanResourceChangeResponse {
        let factory = match self.resources.get(type_name) {
            Some(factory) => factory,
            None => {
                return PlanResourceChangeResponse {
                    planned_state: proposed_new_state,
                    requires_replace: vec![],
                    diagnostics: vec![unknown_type("resource", type_name)],
                }
            }
        };

        if proposed_new_state.is_null() {
            return PlanResourceChangeResponse {
                planned_state: proposed_new_state,
                requires_replace: vec![],
                diagnostics: vec![],
            };
        }

        let schema = factory()
            .schema(self.context(), ResourceSchemaRequest)
            .await
            .schema;

        let mut planned = proposed_new_state;
        let mut diagnostics = Vec::new();
        let mut requires_replace = Vec::new();
        let changed = prior_state.is_null() || prior_state != planned;

        for attr in &schema.block.attributes {
            let path = AttributePath::new(&attr.name);
            let config_value = value_at(&config, &path);

            if matches!(config_value, Dynamic::Null) && attr.computed {
                if let Some(default) = attr.default.as_ref().filter(|_| attr.optional) {
                    let value = default.default_value(DefaultRequest { path: path.clone() });
                    set_or_report(&mut planned, &path, value.value.value, &mut diagnostics);
                } else if changed {
                    set_or_report(&mut planned, &path, Dynamic::Unknown, &mut diagnostics);
                }
            }

            for modifier in &attr.plan_modifiers {
                let response = modifier.modify(PlanModifierRequest {
                    config_value: DynamicValue::new(config_value.clone()),
                    state_value: DynamicValue::new(value_at(&prior_state, &path)),
                    plan_value: DynamicValue::new(value_at(&planned, &path)),
                    path: path.clone(),
                });
                diagnostics.extend(response.diagnostics);
                if response.requires_replace && !requires_replace.contains(&path) {
                    requires_replace.push(path.clone());
                }
                set_or_report(&mut planned, &path, response.plan_value.value, &mut diagnostics);
            }
        }

        PlanResourceChangeResponse {
            planned_state: planned,
            requires_replace,
            diagnostics,
        }
    }

    /// Create when there is no prior state, delete when the plan is null,
    /// update otherwise.
    pub async fn apply_resource_change(
        &self,
        type_name: &str,
        prior_state: DynamicValue,
        planned_state: DynamicValue,
        config: DynamicValue,
    ) -> ApplyResourceChangeResponse {
        let resource = match self.configured_resource(type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return ApplyResourceChangeResponse {
                    new_state: (!prior_state.is_null()).then_some(prior_state),
                    diagnostics,
                }
            }
        };

        if prior_state.is_null() {
            tracing::info!(type_name, "creating resource");
            let response = resource
                .create(
                    self.context(),
                    CreateResourceRequest {
                        type_name: type_name.to_string(),
                        planned_state,
                        config,
                    },
                )
                .await;
            ApplyResourceChangeResponse {
                new_state: (!response.new_state.is_null()).then_some(response.new_state),
                diagnostics: response.diagnostics,
            }
        } else if planned_state.is_null() {
            tracing::info!(type_name, "deleting resource");
            let response = resource
                .delete(
                    self.context(),
                    DeleteResourceRequest {
                        type_name: type_name.to_string(),
                        prior_state: prior_state.clone(),
                    },
                )
                .await;
            let new_state = has_errors(&response.diagnostics).then_some(prior_state);
            ApplyResourceChangeResponse {
                new_state,
                diagnostics: response.diagnostics,
            }
        } else {
            tracing::info!(type_name, "updating resource");
            let response = resource
                .update(
                    self.context(),
                    UpdateResourceRequest {
                        type_name: type_name.to_string(),
                        prior_state,
                        planned_state,
                        config,
                    },
                )
                .await;
            ApplyResourceChangeResponse {
                new_state: Some(response.new_state),
                diagnostics: response.diagnostics,
            }
        }
    }

    pub async fn read_resource(
        &self,
        type_name: &str,
        current_state: DynamicValue,
    ) -> ReadResourceResponse {
        let resource = match self.configured_resource(type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return ReadResourceResponse {
                    new_state: Some(current_state),
                    diagnostics,
                }
            }
        };

        resource
            .read(
                self.context(),
                ReadResourceRequest {
                    type_name: type_name.to_string(),
                    current_state,
                },
            )
            .await
    }

    pub async fn import_resource_state(
        &self,
        type_name: &str,
        id: &str,
    ) -> ImportResourceStateResponse {
        let resource = match self.configured_resource(type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return ImportResourceStateResponse {
                    imported_resources: vec![],
                    diagnostics,
                }
            }
        };

        match resource.as_import_state() {
            Some(importer) => {
                importer
                    .import_state(
                        self.context(),
                        ImportResourceStateRequest {
                            type_name: type_name.to_string(),
                            id: id.to_string(),
                        },
                    )
                    .await
            }
            None => ImportResourceStateResponse {
                imported_resources: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Resource Import Not Implemented",
                    format!("{} does not support import", type_name),
                )],
            },
        }
    }

    pub async fn read_data_source(
        &self,
        type_name: &str,
        config: DynamicValue,
    ) -> ReadDataSourceResponse {
        let data_source = match self.configured_data_source(type_name).await {
            Ok(data_source) => data_source,
            Err(diagnostics) => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                }
            }
        };

        data_source
            .read(
                self.context(),
                ReadDataSourceRequest {
                    type_name: type_name.to_string(),
                    config,
                },
            )
            .await
    }

    async fn configured_resource(
        &self,
        type_name: &str,
    ) -> Result<Box<dyn ResourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self
            .resources
            .get(type_name)
            .ok_or_else(|| vec![unknown_type("resource", type_name)])?;

        let mut resource = factory();
        let provider_data = self.provider_data.read().await.clone();
        let response = resource
            .configure(self.context(), ConfigureResourceRequest { provider_data })
            .await;

        if has_errors(&response.diagnostics) {
            Err(response.diagnostics)
        } else {
            Ok(resource)
        }
    }

    async fn configured_data_source(
        &self,
        type_name: &str,
    ) -> Result<Box<dyn DataSourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self
            .data_sources
            .get(type_name)
            .ok_or_else(|| vec![unknown_type("data source", type_name)])?;

        let mut data_source = factory();
        let provider_data = self.provider_data.read().await.clone();
        let response = data_source
            .configure(self.context(), ConfigureDataSourceRequest { provider_data })
            .await;

        if has_errors(&response.diagnostics) {
            Err(response.diagnostics)
        } else {
            Ok(data_source)
        }
    }
}

fn unknown_type(kind: &str, type_name: &str) -> Diagnostic {
    Diagnostic::error(
        format!("Unknown {} type: {}", kind, type_name),
        format!("The provider does not implement {} '{}'", kind, type_name),
    )
}

fn value_at(value: &DynamicValue, path: &AttributePath) -> Dynamic {
    value.get(path).cloned().unwrap_or(Dynamic::Null)
}

fn set_or_report(
    planned: &mut DynamicValue,
    path: &AttributePath,
    value: Dynamic,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if let Err(e) = planned.set(path, value) {
        diagnostics.push(
            Diagnostic::error("Failed to plan attribute", e.to_string()).with_attribute(path.clone()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::{
        ConfigureDataSourceResponse, DataSource, DataSourceSchemaResponse,
        ValidateDataSourceConfigResponse,
    };
    use crate::defaults::StaticDefault;
    use crate::provider::{
        ConfigureProviderResponse, ProviderSchemaResponse, ValidateProviderConfigResponse,
    };
    use crate::resource::{
        ConfigureResourceResponse, CreateResourceResponse, DeleteResourceResponse, Resource,
        ResourceSchemaResponse, UpdateResourceResponse, ValidateResourceConfigResponse,
    };
    use crate::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
    use async_trait::async_trait;
    use std::sync::Mutex;

    type Store = Arc<Mutex<HashMap<String, String>>>;

    struct TestProvider;

    #[async_trait]
    impl Provider for TestProvider {
        fn type_name(&self) -> &str {
            "test"
        }

        async fn schema(&self, _: Context, _: ProviderSchemaRequest) -> ProviderSchemaResponse {
            ProviderSchemaResponse {
                schema: SchemaBuilder::new()
                    .attribute(
                        AttributeBuilder::new("region", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .build(),
                diagnostics: vec![],
            }
        }

        async fn validate(
            &self,
            _: Context,
            _: ValidateProviderConfigRequest,
        ) -> ValidateProviderConfigResponse {
            ValidateProviderConfigResponse {
                diagnostics: vec![],
            }
        }

        async fn configure(
            &mut self,
            _: Context,
            _: ConfigureProviderRequest,
        ) -> ConfigureProviderResponse {
            let store: Store = Arc::new(Mutex::new(HashMap::new()));
            ConfigureProviderResponse {
                diagnostics: vec![],
                provider_data: Some(Arc::new(store)),
            }
        }

        fn resources(&self) -> HashMap<String, ResourceFactory> {
            let mut resources: HashMap<String, ResourceFactory> = HashMap::new();
            resources.insert(
                "test_thing".to_string(),
                Box::new(|| Box::new(ThingResource::default()) as Box<dyn ResourceWithConfigure>),
            );
            resources
        }

        fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
            let mut data_sources: HashMap<String, DataSourceFactory> = HashMap::new();
            data_sources.insert(
                "test_thing".to_string(),
                Box::new(|| {
                    Box::new(ThingDataSource::default()) as Box<dyn DataSourceWithConfigure>
                }),
            );
            data_sources
        }
    }

    #[derive(Default)]
    struct ThingResource {
        store: Option<Store>,
    }

    fn thing_schema() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .use_state_for_unknown()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .requires_replace()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("size", AttributeType::Number)
                    .optional()
                    .computed()
                    .default(StaticDefault::number(10.0))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .build()
    }

    fn path(name: &str) -> AttributePath {
        AttributePath::new(name)
    }

    #[async_trait]
    impl Resource for ThingResource {
        fn type_name(&self) -> &str {
            "test_thing"
        }

        async fn schema(&self, _: Context, _: ResourceSchemaRequest) -> ResourceSchemaResponse {
            ResourceSchemaResponse {
                schema: thing_schema(),
                diagnostics: vec![],
            }
        }

        async fn validate(
            &self,
            _: Context,
            _: ValidateResourceConfigRequest,
        ) -> ValidateResourceConfigResponse {
            ValidateResourceConfigResponse {
                diagnostics: vec![],
            }
        }

        async fn create(&self, _: Context, request: CreateResourceRequest) -> CreateResourceResponse {
            let store = self.store.as_ref().unwrap();
            let name = request.planned_state.get_string(&path("name")).unwrap();
            let mut state = request.planned_state;
            state.set_string(&path("id"), format!("id-{}", name)).unwrap();
            state.set_string(&path("status"), "ready".to_string()).unwrap();
            store.lock().unwrap().insert(format!("id-{}", name), name);
            CreateResourceResponse {
                new_state: state,
                diagnostics: vec![],
            }
        }

        async fn read(&self, _: Context, request: ReadResourceRequest) -> ReadResourceResponse {
            let id = request.current_state.get_string(&path("id")).unwrap();
            let exists = self.store.as_ref().unwrap().lock().unwrap().contains_key(&id);
            ReadResourceResponse {
                new_state: exists.then_some(request.current_state),
                diagnostics: vec![],
            }
        }

        async fn update(&self, _: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
            UpdateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![],
            }
        }

        async fn delete(&self, _: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
            let id = request.prior_state.get_string(&path("id")).unwrap();
            let removed = self.store.as_ref().unwrap().lock().unwrap().remove(&id);
            let diagnostics = match removed {
                Some(_) => vec![],
                None => vec![Diagnostic::error("Delete failed", "already gone")],
            };
            DeleteResourceResponse { diagnostics }
        }
    }

    #[async_trait]
    impl ResourceWithConfigure for ThingResource {
        async fn configure(
            &mut self,
            _: Context,
            request: ConfigureResourceRequest,
        ) -> ConfigureResourceResponse {
            let store = request
                .provider_data
                .and_then(|data| data.downcast_ref::<Store>().cloned());
            let diagnostics = match store {
                Some(_) => vec![],
                None => vec![Diagnostic::error("Provider not configured", "no store")],
            };
            self.store = store;
            ConfigureResourceResponse { diagnostics }
        }
    }

    #[derive(Default)]
    struct ThingDataSource {
        store: Option<Store>,
    }

    #[async_trait]
    impl DataSource for ThingDataSource {
        fn type_name(&self) -> &str {
            "test_thing"
        }

        async fn schema(&self, _: Context, _: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
            DataSourceSchemaResponse {
                schema: SchemaBuilder::new()
                    .attribute(
                        AttributeBuilder::new("count", AttributeType::Number)
                            .computed()
                            .build(),
                    )
                    .build(),
                diagnostics: vec![],
            }
        }

        async fn validate(
            &self,
            _: Context,
            _: ValidateDataSourceConfigRequest,
        ) -> ValidateDataSourceConfigResponse {
            ValidateDataSourceConfigResponse {
                diagnostics: vec![],
            }
        }

        async fn read(&self, _: Context, _: ReadDataSourceRequest) -> ReadDataSourceResponse {
            let count = self.store.as_ref().unwrap().lock().unwrap().len();
            let mut state = DynamicValue::empty_object();
            state.set_number(&path("count"), count as f64).unwrap();
            ReadDataSourceResponse {
                state,
                diagnostics: vec![],
            }
        }
    }

    #[async_trait]
    impl DataSourceWithConfigure for ThingDataSource {
        async fn configure(
            &mut self,
            _: Context,
            request: ConfigureDataSourceRequest,
        ) -> ConfigureDataSourceResponse {
            self.store = request
                .provider_data
                .and_then(|data| data.downcast_ref::<Store>().cloned());
            ConfigureDataSourceResponse {
                diagnostics: vec![],
            }
        }
    }

    fn object(pairs: &[(&str, Dynamic)]) -> DynamicValue {
        let mut value = DynamicValue::empty_object();
        for (name, v) in pairs {
            value.set(&path(name), v.clone()).unwrap();
        }
        value
    }

    fn string(s: &str) -> Dynamic {
        Dynamic::String(s.to_string())
    }

    async fn configured_host() -> ProviderHost<TestProvider> {
        let host = ProviderHost::new(TestProvider);
        let config = object(&[("region", string("eu-1"))]);
        assert!(host.configure("1.9.0", config).await.is_empty());
        host
    }

    #[tokio::test]
    async fn schema_lists_resources_and_data_sources() {
        let host = ProviderHost::new(TestProvider);
        let schemas = host.get_schema().await;

        assert!(schemas.provider.attribute("region").is_some());
        assert!(schemas.resources.contains_key("test_thing"));
        assert!(schemas.data_sources.contains_key("test_thing"));
    }

    #[tokio::test]
    async fn provider_config_is_validated_against_schema() {
        let host = ProviderHost::new(TestProvider);
        let diagnostics = host
            .validate_provider_config(DynamicValue::empty_object())
            .await;

        assert!(has_errors(&diagnostics));
        assert!(diagnostics[0].summary.contains("region"));
    }

    #[tokio::test]
    async fn create_plan_applies_defaults_and_marks_computed_unknown() {
        let host = configured_host().await;
        let config = object(&[("name", string("web"))]);

        let plan = host
            .plan_resource_change("test_thing", DynamicValue::null(), config.clone(), config)
            .await;

        assert!(plan.diagnostics.is_empty());
        assert!(plan.requires_replace.is_empty());
        assert_eq!(plan.planned_state.get(&path("size")), Some(&Dynamic::Number(10.0)));
        assert_eq!(plan.planned_state.get(&path("id")), Some(&Dynamic::Unknown));
        assert_eq!(plan.planned_state.get(&path("status")), Some(&Dynamic::Unknown));
    }

    #[tokio::test]
    async fn update_plan_keeps_id_and_flags_replacement() {
        let host = configured_host().await;
        let prior = object(&[
            ("id", string("id-web")),
            ("name", string("web")),
            ("size", Dynamic::Number(10.0)),
            ("status", string("ready")),
        ]);
        let config = object(&[("name", string("api"))]);
        let proposed = object(&[
            ("id", string("id-web")),
            ("name", string("api")),
            ("size", Dynamic::Number(10.0)),
            ("status", string("ready")),
        ]);

        let plan = host
            .plan_resource_change("test_thing", prior, proposed, config)
            .await;

        assert_eq!(plan.requires_replace, vec![path("name")]);
        assert_eq!(plan.planned_state.get(&path("id")), Some(&string("id-web")));
        assert_eq!(plan.planned_state.get(&path("status")), Some(&Dynamic::Unknown));
    }

    #[tokio::test]
    async fn unchanged_plan_is_left_alone() {
        let host = configured_host().await;
        let state = object(&[
            ("id", string("id-web")),
            ("name", string("web")),
            ("size", Dynamic::Number(10.0)),
            ("status", string("ready")),
        ]);
        let config = object(&[("name", string("web"))]);

        let plan = host
            .plan_resource_change("test_thing", state.clone(), state.clone(), config)
            .await;

        assert_eq!(plan.planned_state, state);
        assert!(plan.requires_replace.is_empty());
    }

    #[tokio::test]
    async fn apply_routes_create_read_and_delete() {
        let host = configured_host().await;
        let config = object(&[("name", string("web"))]);
        let plan = host
            .plan_resource_change("test_thing", DynamicValue::null(), config.clone(), config.clone())
            .await;

        let created = host
            .apply_resource_change("test_thing", DynamicValue::null(), plan.planned_state, config.clone())
            .await;
        let state = created.new_state.unwrap();
        assert_eq!(state.get_string(&path("id")).unwrap(), "id-web");

        let read = host.read_resource("test_thing", state.clone()).await;
        assert!(read.new_state.is_some());

        let data = host.read_data_source("test_thing", DynamicValue::empty_object()).await;
        assert_eq!(data.state.get_number(&path("count")).unwrap(), 1.0);

        let deleted = host
            .apply_resource_change("test_thing", state.clone(), DynamicValue::null(), DynamicValue::null())
            .await;
        assert!(deleted.new_state.is_none());
        assert!(deleted.diagnostics.is_empty());

        let read = host.read_resource("test_thing", state.clone()).await;
        assert!(read.new_state.is_none());

        let failed = host
            .apply_resource_change("test_thing", state.clone(), DynamicValue::null(), DynamicValue::null())
            .await;
        assert!(has_errors(&failed.diagnostics));
        assert_eq!(failed.new_state, Some(state));
    }

    #[tokio::test]
    async fn unconfigured_host_reports_resource_configure_errors() {
        let host = ProviderHost::new(TestProvider);
        let config = object(&[("name", string("web"))]);

        let response = host
            .apply_resource_change("test_thing", DynamicValue::null(), config.clone(), config)
            .await;

        assert!(response.new_state.is_none());
        assert_eq!(response.diagnostics[0].summary, "Provider not configured");
    }

    #[tokio::test]
    async fn unknown_types_and_missing_import_are_reported() {
        let host = configured_host().await;

        let read = host.read_resource("test_missing", DynamicValue::null()).await;
        assert!(read.diagnostics[0].summary.contains("test_missing"));

        let import = host.import_resource_state("test_thing", "id-web").await;
        assert!(import.imported_resources.is_empty());
        assert_eq!(import.diagnostics[0].summary, "Resource Import Not Implemented");
    }
}
