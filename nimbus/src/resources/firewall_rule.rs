//! Firewall rule resource implementation
//!
//! Rules live inside a policy and every change re-syncs the whole policy,
//! so all rule mutations hold the policy's lock and wait on the policy's
//! `sync_status`.

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
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
use tfplug::timeouts::Timeouts;
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::{CidrBlock, NumberRange, StringLength};

use super::firewall_policy::wait_policy_synced;
use super::{
    attr, configure_slot, create_response, delete_response, deleted, found, id_from_state,
    not_configured, partial_state, read_response, timeouts_from, update_response, ConfigReader,
    Failure, OpResult, StateBuilder, DEFAULT_TIMEOUTS, MUTATING_TIMEOUTS,
};
use crate::api::firewall::{FirewallRule, FirewallRuleRequest};
use crate::api::{Action, Direction, Protocol};
use crate::provider_data::NimbusProviderData;
use crate::wait::{OperationError, PollSpec};

const RULE_POLL: PollSpec = PollSpec::new(1, 2);

const DEFAULT_PRIORITY: u32 = 100;

#[derive(Default)]
pub struct FirewallRuleResource {
    provider_data: Option<NimbusProviderData>,
}

#[derive(Debug, Clone, PartialEq)]
struct FirewallRuleModel {
    policy_id: String,
    rule: FirewallRuleRequest,
    timeouts: Timeouts,
}

impl FirewallRuleModel {
    fn read(reader: &mut ConfigReader<'_>) -> Self {
        let policy_id = reader.string("policy_id");
        let direction = reader.required_enum("direction", Direction::Ingress);
        let action = reader.required_enum("action", Action::Allow);
        let protocol = reader.required_enum("protocol", Protocol::Any);
        let port_range_min: Option<u16> = reader.optional_integer("port_range_min");
        let mut port_range_max: Option<u16> = reader.optional_integer("port_range_max");

        match (port_range_min, port_range_max) {
            (Some(_), _) | (_, Some(_)) if !protocol.has_ports() => reader.error(
                "protocol",
                "Ports not supported",
                format!("Port ranges apply to tcp and udp rules, not {}", protocol),
            ),
            (None, Some(_)) => reader.error(
                "port_range_min",
                "Missing port_range_min",
                "port_range_max requires port_range_min",
            ),
            (Some(min), Some(max)) if min > max => reader.error(
                "port_range_max",
                "Invalid port range",
                format!("port_range_max ({}) is lower than port_range_min ({})", max, min),
            ),
            // A single port.
            (Some(min), None) => port_range_max = Some(min),
            _ => {}
        }

        let rule = FirewallRuleRequest {
            direction,
            action,
            protocol,
            port_range_min,
            port_range_max,
            remote_cidr: reader.optional_string("remote_cidr"),
            priority: reader
                .optional_integer("priority")
                .unwrap_or(DEFAULT_PRIORITY),
            description: reader.optional_string("description"),
        };

        Self {
            policy_id,
            rule,
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

impl FirewallRuleResource {
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
            .description("Manages one rule of a firewall policy")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .use_state_for_unknown()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("policy_id", AttributeType::String)
                    .required()
                    .requires_replace()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("direction", AttributeType::String)
                    .description("ingress or egress")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("action", AttributeType::String)
                    .description("allow or deny")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("protocol", AttributeType::String)
                    .description("tcp, udp, icmp or any")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("port_range_min", AttributeType::Number)
                    .optional()
                    .validator(NumberRange::integer(1, 65535))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("port_range_max", AttributeType::Number)
                    .description("Defaults to port_range_min, i.e. a single port")
                    .optional()
                    .computed()
                    .validator(NumberRange::integer(1, 65535))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("remote_cidr", AttributeType::String)
                    .description("Peer address range; any address when unset")
                    .optional()
                    .validator(CidrBlock::new())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("priority", AttributeType::Number)
                    .description("Lower numbers are evaluated first")
                    .optional()
                    .computed()
                    .default(StaticDefault::number(DEFAULT_PRIORITY as f64))
                    .validator(NumberRange::integer(1, 1000))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .validator(StringLength::between(0, 255))
                    .build(),
            )
            .block(Timeouts::block(MUTATING_TIMEOUTS))
            .build()
    }

    fn write_state(base: &DynamicValue, policy_id: &str, rule: &FirewallRule) -> OpResult<DynamicValue> {
        StateBuilder::new(base)
            .string("id", &rule.id)
            .string("policy_id", policy_id)
            .string("direction", rule.direction.as_str())
            .string("action", rule.action.as_str())
            .string("protocol", rule.protocol.as_str())
            .optional_number("port_range_min", rule.port_range_min)
            .optional_number("port_range_max", rule.port_range_max)
            .optional_string("remote_cidr", rule.remote_cidr.clone())
            .number("priority", rule.priority)
            .optional_string("description", rule.description.clone())
            .build()
    }

    fn policy_id_from_state(state: &DynamicValue) -> OpResult<String> {
        match state.get_string_opt(&attr("policy_id")) {
            Ok(Some(id)) if !id.is_empty() => Ok(id),
            _ => Err(Diagnostic::error(
                "Missing policy ID",
                "The 'policy_id' attribute is not set in state",
            )
            .with_attribute(attr("policy_id"))
            .into()),
        }
    }

    async fn create_rule(&self, ctx: &Context, planned: &DynamicValue) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let model = FirewallRuleModel::from_value(planned)?;
        let policy_id = model.policy_id.as_str();

        let _lock = data.locks.lock(policy_id).await;

        let rule = data
            .client
            .firewall()
            .create_rule(policy_id, &model.rule)
            .await
            .map_err(|e| Failure::api("Failed to create firewall rule", &e))?;
        let id = rule.id;
        tracing::info!(%policy_id, rule_id = %id, "created firewall rule");

        wait_policy_synced(ctx, data, policy_id, RULE_POLL, model.timeouts.create)
            .await
            .map_err(|e| {
                Failure::wait("Error waiting for firewall rule to be applied", &e)
                    .with_state(partial_state(planned, &id))
            })?;

        let rule = data.client.firewall().get_rule(policy_id, &id).await.map_err(|e| {
            Failure::api("Failed to read firewall rule", &e).with_state(partial_state(planned, &id))
        })?;
        Self::write_state(planned, policy_id, &rule)
    }

    async fn read_rule(&self, current: &DynamicValue) -> OpResult<Option<DynamicValue>> {
        let data = self.data()?;
        let id = id_from_state(current)?;
        let policy_id = Self::policy_id_from_state(current)?;

        let result = data.client.firewall().get_rule(&policy_id, &id).await;
        match found(result, "Failed to read firewall rule")? {
            Some(rule) => Self::write_state(current, &policy_id, &rule).map(Some),
            None => Ok(None),
        }
    }

    async fn update_rule(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> OpResult<DynamicValue> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let old = FirewallRuleModel::from_value(prior)?;
        let new = FirewallRuleModel::from_value(planned)?;
        let policy_id = new.policy_id.as_str();

        if old.rule != new.rule {
            let _lock = data.locks.lock(policy_id).await;
            data.client
                .firewall()
                .update_rule(policy_id, &id, &new.rule)
                .await
                .map_err(|e| Failure::api("Failed to update firewall rule", &e))?;
            wait_policy_synced(ctx, data, policy_id, RULE_POLL, new.timeouts.update)
                .await
                .map_err(|e| Failure::wait("Error waiting for firewall rule to be applied", &e))?;
        }

        let rule = data
            .client
            .firewall()
            .get_rule(policy_id, &id)
            .await
            .map_err(|e| Failure::api("Failed to read firewall rule", &e))?;
        Self::write_state(planned, policy_id, &rule)
    }

    async fn delete_rule(&self, ctx: &Context, prior: &DynamicValue) -> OpResult<()> {
        let data = self.data()?;
        let id = id_from_state(prior)?;
        let policy_id = Self::policy_id_from_state(prior)?;
        let timeouts = timeouts_from(prior, DEFAULT_TIMEOUTS)?;

        let _lock = data.locks.lock(policy_id.as_str()).await;

        let result = data.client.firewall().delete_rule(&policy_id, &id).await;
        if deleted(result, "Failed to delete firewall rule")?.is_none() {
            return Ok(());
        }

        // The policy itself may be deleted in the same run.
        match wait_policy_synced(ctx, data, &policy_id, RULE_POLL, timeouts.delete).await {
            Ok(()) | Err(OperationError::Vanished(_)) => Ok(()),
            Err(e) => Err(Failure::wait("Error waiting for firewall rule to be removed", &e)),
        }
    }
}

#[async_trait]
impl Resource for FirewallRuleResource {
    fn type_name(&self) -> &str {
        "nimbus_firewall_rule"
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
        FirewallRuleModel::read(&mut reader);
        ValidateResourceConfigResponse {
            diagnostics: reader.into_diagnostics(),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.create_rule(&ctx, &request.planned_state).await)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = self.read_rule(&request.current_state).await;
        read_response(request.current_state, result)
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let result = self
            .update_rule(&ctx, &request.prior_state, &request.planned_state)
            .await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_rule(&ctx, &request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for FirewallRuleResource {
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
impl ResourceWithImportState for FirewallRuleResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_parts(&[attr("policy_id"), attr("id")], &request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfplug::types::Dynamic;

    fn rule_config(protocol: &str, ports: &[(&str, f64)]) -> DynamicValue {
        let mut config = DynamicValue::empty_object();
        for (name, value) in [
            ("policy_id", "fwp-1"),
            ("direction", "ingress"),
            ("action", "allow"),
            ("protocol", protocol),
        ] {
            config.set_string(&attr(name), value.to_string()).unwrap();
        }
        for (name, port) in ports {
            config.set(&attr(name), Dynamic::Number(*port)).unwrap();
        }
        config
    }

    #[test]
    fn single_port_fills_range_max() {
        let model = FirewallRuleModel::from_value(&rule_config("tcp", &[("port_range_min", 443.0)]))
            .unwrap();
        assert_eq!(model.rule.port_range_min, Some(443));
        assert_eq!(model.rule.port_range_max, Some(443));
        assert_eq!(model.rule.priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn icmp_rules_take_no_ports() {
        let failure =
            FirewallRuleModel::from_value(&rule_config("icmp", &[("port_range_min", 22.0)]))
                .unwrap_err();
        assert_eq!(failure.diagnostics[0].summary, "Ports not supported");
    }

    #[test]
    fn inverted_range_is_rejected() {
        let config = rule_config("udp", &[("port_range_min", 9000.0), ("port_range_max", 8000.0)]);
        let failure = FirewallRuleModel::from_value(&config).unwrap_err();
        assert_eq!(failure.diagnostics[0].summary, "Invalid port range");
    }

    #[test]
    fn unknown_direction_names_accepted_values() {
        let mut config = rule_config("tcp", &[]);
        config
            .set_string(&attr("direction"), "inbound".to_string())
            .unwrap();

        let failure = FirewallRuleModel::from_value(&config).unwrap_err();
        assert_eq!(failure.diagnostics[0].summary, "Invalid direction");
        assert!(failure.diagnostics[0].detail.contains("ingress, egress"));
    }
}
