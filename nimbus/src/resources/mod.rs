//! Nimbus resources
//!
//! Every resource reads its configuration into a typed model through
//! [`ConfigReader`], calls the API, waits for the change to settle, and
//! writes the remote object back with [`StateBuilder`].

pub mod firewall_policy;
pub mod firewall_rule;
pub mod floating_ip;
pub mod instance;
pub mod load_balancer;
pub mod network;
pub mod network_policy;
pub mod router;
pub mod tag;
pub mod volume;
pub mod vpc;
pub mod vpn_connection;
pub mod vpn_gateway;

pub use firewall_policy::FirewallPolicyResource;
pub use firewall_rule::FirewallRuleResource;
pub use floating_ip::FloatingIpResource;
pub use instance::InstanceResource;
pub use load_balancer::LoadBalancerResource;
pub use network::NetworkResource;
pub use network_policy::NetworkPolicyResource;
pub use router::RouterResource;
pub use tag::TagResource;
pub use volume::VolumeResource;
pub use vpc::VpcResource;
pub use vpn_connection::VpnConnectionResource;
pub use vpn_gateway::VpnGatewayResource;

use crate::api::{ApiError, TaskRef};
use crate::provider_data::NimbusProviderData;
use crate::wait::OperationError;
use std::any::Any;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tfplug::resource::{
    CreateResourceResponse, DeleteResourceResponse, ReadResourceResponse, UpdateResourceResponse,
};
use tfplug::timeouts::{TimeoutKind, Timeouts, TIMEOUTS_BLOCK};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

pub(crate) const DEFAULT_TIMEOUTS: Timeouts = Timeouts::uniform(Duration::from_secs(10 * 60));
pub(crate) const LONG_TIMEOUTS: Timeouts = Timeouts::uniform(Duration::from_secs(30 * 60));

pub(crate) const MUTATING_TIMEOUTS: &[TimeoutKind] =
    &[TimeoutKind::Create, TimeoutKind::Update, TimeoutKind::Delete];

pub(crate) fn attr(name: &str) -> AttributePath {
    AttributePath::new(name)
}

/// A failed operation. `state` is what Terraform should keep, e.g. a
/// resource that was created before a later step failed.
#[derive(Debug)]
pub(crate) struct Failure {
    pub diagnostics: Vec<Diagnostic>,
    pub state: Option<DynamicValue>,
}

pub(crate) type OpResult<T> = Result<T, Failure>;

impl Failure {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            diagnostics,
            state: None,
        }
    }

    pub fn api(summary: &str, error: &ApiError) -> Self {
        Diagnostic::error(summary, format!("API error: {}", error)).into()
    }

    pub fn wait(summary: &str, error: &OperationError) -> Self {
        Diagnostic::error(summary, error.to_string()).into()
    }

    pub fn with_state(mut self, state: DynamicValue) -> Self {
        self.state = Some(state);
        self
    }

    /// State to report for a failed create: whatever was created, else null
    pub fn into_create_state(self) -> (DynamicValue, Vec<Diagnostic>) {
        (self.state.unwrap_or_else(DynamicValue::null), self.diagnostics)
    }

    /// State to report for a failed update: the partial result, else the
    /// prior state
    pub fn into_update_state(self, prior: DynamicValue) -> (DynamicValue, Vec<Diagnostic>) {
        (self.state.unwrap_or(prior), self.diagnostics)
    }
}

impl From<Diagnostic> for Failure {
    fn from(diagnostic: Diagnostic) -> Self {
        Self::new(vec![diagnostic])
    }
}

pub(crate) fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}

/// Shared `configure` body: extracts [`NimbusProviderData`]
pub(crate) fn provider_data_from(
    provider_data: Option<Arc<dyn Any + Send + Sync>>,
) -> Result<NimbusProviderData, Diagnostic> {
    match provider_data {
        Some(data) => data
            .downcast_ref::<NimbusProviderData>()
            .cloned()
            .ok_or_else(|| {
                Diagnostic::error(
                    "Invalid provider data",
                    "Failed to extract NimbusProviderData from provider data",
                )
            }),
        None => Err(Diagnostic::error(
            "No provider data",
            "No provider data was provided to the resource",
        )),
    }
}

pub(crate) fn configure_slot(
    slot: &mut Option<NimbusProviderData>,
    provider_data: Option<Arc<dyn Any + Send + Sync>>,
) -> Vec<Diagnostic> {
    match provider_data_from(provider_data) {
        Ok(data) => {
            *slot = Some(data);
            vec![]
        }
        Err(diagnostic) => vec![diagnostic],
    }
}

pub(crate) fn id_from_state(state: &DynamicValue) -> OpResult<String> {
    match state.get_string_opt(&attr("id")) {
        Ok(Some(id)) if !id.is_empty() => Ok(id),
        _ => Err(Diagnostic::error("Missing resource ID", "The 'id' attribute is not set in state")
            .with_attribute(attr("id"))
            .into()),
    }
}

pub(crate) fn timeouts_from(value: &DynamicValue, defaults: Timeouts) -> OpResult<Timeouts> {
    Timeouts::from_value(defaults, value).map_err(|e| {
        Diagnostic::error("Invalid timeouts", e.to_string())
            .with_attribute(attr(TIMEOUTS_BLOCK))
            .into()
    })
}

/// The ID a task-based create produced, from the task reference or, when
/// the API only fills it in later, from the task record
pub(crate) async fn task_resource_id(
    data: &NimbusProviderData,
    task: &TaskRef,
    kind: &str,
) -> OpResult<String> {
    if let Some(id) = task.resource_id.as_ref().filter(|id| !id.is_empty()) {
        return Ok(id.clone());
    }

    let record = data
        .client
        .tasks()
        .get(&task.task_id)
        .await
        .map_err(|e| Failure::api(&format!("Failed to read {} creation task", kind), &e))?;

    record.resource_id.filter(|id| !id.is_empty()).ok_or_else(|| {
        Diagnostic::error(
            format!("Failed to create {}", kind),
            format!("Task {} completed without reporting a resource ID", task.task_id),
        )
        .into()
    })
}

/// The ID behind a create task whose wait failed, if the API knows it yet
pub(crate) async fn pending_resource_id(data: &NimbusProviderData, task: &TaskRef) -> Option<String> {
    if let Some(id) = task.resource_id.as_ref().filter(|id| !id.is_empty()) {
        return Some(id.clone());
    }

    match data.client.tasks().get(&task.task_id).await {
        Ok(record) => record.resource_id.filter(|id| !id.is_empty()),
        Err(e) => {
            tracing::warn!(task_id = %task.task_id, error = %e, "could not read creation task");
            None
        }
    }
}

/// The plan with the new ID filled in, kept when a later create step fails
pub(crate) fn partial_state(planned: &DynamicValue, id: &str) -> DynamicValue {
    StateBuilder::new(planned)
        .string("id", id)
        .build()
        .unwrap_or_else(|_| planned.clone())
}

/// NotFound means the object is gone and drops out of state
pub(crate) fn found<T>(result: Result<T, ApiError>, summary: &str) -> OpResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => {
            tracing::info!(error = %e, "remote object no longer exists, removing from state");
            Ok(None)
        }
        Err(e) => Err(Failure::api(summary, &e)),
    }
}

/// Deleting something already gone is success
pub(crate) fn deleted<T>(result: Result<T, ApiError>, summary: &str) -> OpResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => {
            tracing::debug!(error = %e, "already deleted");
            Ok(None)
        }
        Err(e) => Err(Failure::api(summary, &e)),
    }
}

pub(crate) fn create_response(result: OpResult<DynamicValue>) -> CreateResourceResponse {
    match result {
        Ok(new_state) => CreateResourceResponse {
            new_state,
            diagnostics: vec![],
        },
        Err(failure) => {
            let (new_state, diagnostics) = failure.into_create_state();
            CreateResourceResponse {
                new_state,
                diagnostics,
            }
        }
    }
}

pub(crate) fn read_response(
    current_state: DynamicValue,
    result: OpResult<Option<DynamicValue>>,
) -> ReadResourceResponse {
    match result {
        Ok(new_state) => ReadResourceResponse {
            new_state,
            diagnostics: vec![],
        },
        Err(failure) => ReadResourceResponse {
            new_state: Some(failure.state.unwrap_or(current_state)),
            diagnostics: failure.diagnostics,
        },
    }
}

pub(crate) fn update_response(
    prior_state: DynamicValue,
    result: OpResult<DynamicValue>,
) -> UpdateResourceResponse {
    match result {
        Ok(new_state) => UpdateResourceResponse {
            new_state,
            diagnostics: vec![],
        },
        Err(failure) => {
            let (new_state, diagnostics) = failure.into_update_state(prior_state);
            UpdateResourceResponse {
                new_state,
                diagnostics,
            }
        }
    }
}

pub(crate) fn delete_response(result: OpResult<()>) -> DeleteResourceResponse {
    DeleteResourceResponse {
        diagnostics: result.err().map(|f| f.diagnostics).unwrap_or_default(),
    }
}

/// Reads a configuration or plan into typed values, collecting every
/// problem instead of stopping at the first.
///
/// Unknown values are not errors: they read as absent. In validation mode
/// a missing required attribute is also not reported, since the schema
/// check already does that.
pub(crate) struct ConfigReader<'a> {
    value: &'a DynamicValue,
    diagnostics: Vec<Diagnostic>,
    validating: bool,
}

impl<'a> ConfigReader<'a> {
    pub fn new(value: &'a DynamicValue) -> Self {
        Self {
            value,
            diagnostics: Vec::new(),
            validating: false,
        }
    }

    pub fn for_validation(value: &'a DynamicValue) -> Self {
        Self {
            validating: true,
            ..Self::new(value)
        }
    }

    pub fn error(&mut self, name: &str, summary: impl Into<String>, detail: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::error(summary, detail).with_attribute(attr(name)));
    }

    fn is_unknown(&self, name: &str) -> bool {
        matches!(self.value.get(&attr(name)), Some(Dynamic::Unknown))
    }

    fn missing(&mut self, name: &str) {
        if !self.validating && !self.is_unknown(name) {
            self.error(
                name,
                format!("Missing {}", name),
                format!("The '{}' attribute is required", name),
            );
        }
    }

    pub fn optional_string(&mut self, name: &str) -> Option<String> {
        match self.value.get_string_opt(&attr(name)) {
            Ok(value) => value,
            Err(e) => {
                self.error(name, format!("Invalid {}", name), e.to_string());
                None
            }
        }
    }

    pub fn string(&mut self, name: &str) -> String {
        match self.optional_string(name) {
            Some(value) => value,
            None => {
                self.missing(name);
                String::new()
            }
        }
    }

    pub fn optional_bool(&mut self, name: &str) -> Option<bool> {
        match self.value.get_bool_opt(&attr(name)) {
            Ok(value) => value,
            Err(e) => {
                self.error(name, format!("Invalid {}", name), e.to_string());
                None
            }
        }
    }

    pub fn bool_or(&mut self, name: &str, default: bool) -> bool {
        self.optional_bool(name).unwrap_or(default)
    }

    /// Whole number that fits `T`
    pub fn optional_integer<T>(&mut self, name: &str) -> Option<T>
    where
        T: TryFrom<i64>,
    {
        let number = match self.value.get_number_opt(&attr(name)) {
            Ok(number) => number?,
            Err(e) => {
                self.error(name, format!("Invalid {}", name), e.to_string());
                return None;
            }
        };

        if number.fract() != 0.0 {
            self.error(name, format!("Invalid {}", name), format!("{} is not a whole number", number));
            return None;
        }

        match T::try_from(number as i64) {
            Ok(value) => Some(value),
            Err(_) => {
                self.error(name, format!("Invalid {}", name), format!("{} is out of range", number));
                None
            }
        }
    }

    pub fn integer<T>(&mut self, name: &str) -> T
    where
        T: TryFrom<i64> + Default,
    {
        if matches!(
            self.value.get(&attr(name)),
            None | Some(Dynamic::Null) | Some(Dynamic::Unknown)
        ) {
            self.missing(name);
            return T::default();
        }
        self.optional_integer(name).unwrap_or_default()
    }

    pub fn strings(&mut self, name: &str) -> Vec<String> {
        match self.value.get_string_list(&attr(name)) {
            Ok(values) => values,
            Err(e) => {
                self.error(name, format!("Invalid {}", name), e.to_string());
                Vec::new()
            }
        }
    }

    /// `None` while the list is null or not yet known
    pub fn optional_strings(&mut self, name: &str) -> Option<Vec<String>> {
        match self.value.get(&attr(name)) {
            None | Some(Dynamic::Null) | Some(Dynamic::Unknown) => None,
            Some(_) => Some(self.strings(name)),
        }
    }

    /// Reads each element of a list block with `read`. Diagnostics from an
    /// element are re-rooted under `name[index]`.
    pub fn blocks<T>(&mut self, name: &str, read: impl Fn(&mut ConfigReader<'_>) -> T) -> Vec<T> {
        let elements = match self.value.get(&attr(name)) {
            Some(Dynamic::List(elements)) => elements.clone(),
            None | Some(Dynamic::Null) | Some(Dynamic::Unknown) => return Vec::new(),
            Some(_) => {
                self.error(name, format!("Invalid {}", name), "expected a list of blocks");
                return Vec::new();
            }
        };

        let mut items = Vec::with_capacity(elements.len());
        for (index, element) in elements.into_iter().enumerate() {
            let element = DynamicValue::new(element);
            let mut nested = ConfigReader {
                value: &element,
                diagnostics: Vec::new(),
                validating: self.validating,
            };
            items.push(read(&mut nested));

            let base = attr(name).index(index as i64);
            for mut diagnostic in nested.diagnostics {
                let mut path = base.clone();
                if let Some(inner) = diagnostic.attribute.take() {
                    path.steps.extend(inner.steps);
                }
                self.diagnostics.push(diagnostic.with_attribute(path));
            }
        }
        items
    }

    /// Parses an enum-like string; the diagnostic lists accepted values
    pub fn optional_enum<T>(&mut self, name: &str) -> Option<T>
    where
        T: FromStr<Err = ApiError>,
    {
        let raw = self.optional_string(name)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                let detail = match e {
                    ApiError::InvalidValue { message, .. } => message,
                    other => other.to_string(),
                };
                self.error(name, format!("Invalid {}", name), detail);
                None
            }
        }
    }

    pub fn enum_or<T>(&mut self, name: &str, default: T) -> T
    where
        T: FromStr<Err = ApiError>,
    {
        self.optional_enum(name).unwrap_or(default)
    }

    pub fn required_enum<T>(&mut self, name: &str, fallback: T) -> T
    where
        T: FromStr<Err = ApiError>,
    {
        if self.value.get_string_opt(&attr(name)).ok().flatten().is_none() {
            self.missing(name);
            return fallback;
        }
        self.optional_enum(name).unwrap_or(fallback)
    }

    pub fn timeouts(&mut self, defaults: Timeouts) -> Timeouts {
        match timeouts_from(self.value, defaults) {
            Ok(timeouts) => timeouts,
            Err(failure) => {
                self.diagnostics.extend(failure.diagnostics);
                defaults
            }
        }
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn finish(self) -> OpResult<()> {
        if self.diagnostics.is_empty() {
            Ok(())
        } else {
            Err(Failure::new(self.diagnostics))
        }
    }
}

/// Writes attributes onto a base value (the plan, or the prior state).
/// Attributes still unknown at the end become null.
pub(crate) struct StateBuilder {
    state: DynamicValue,
    diagnostics: Vec<Diagnostic>,
}

impl StateBuilder {
    pub fn new(base: &DynamicValue) -> Self {
        let state = if matches!(base.value, Dynamic::Map(_)) {
            base.clone()
        } else {
            DynamicValue::empty_object()
        };
        Self {
            state,
            diagnostics: Vec::new(),
        }
    }

    pub fn value(mut self, name: &str, value: Dynamic) -> Self {
        if let Err(e) = self.state.set(&attr(name), value) {
            self.diagnostics.push(
                Diagnostic::error("Failed to set state", e.to_string()).with_attribute(attr(name)),
            );
        }
        self
    }

    pub fn string(self, name: &str, value: impl Into<String>) -> Self {
        self.value(name, Dynamic::String(value.into()))
    }

    pub fn optional_string(self, name: &str, value: Option<impl Into<String>>) -> Self {
        self.value(
            name,
            value.map(|v| Dynamic::String(v.into())).unwrap_or(Dynamic::Null),
        )
    }

    pub fn number(self, name: &str, value: impl Into<f64>) -> Self {
        self.value(name, Dynamic::Number(value.into()))
    }

    pub fn optional_number(self, name: &str, value: Option<impl Into<f64>>) -> Self {
        self.value(
            name,
            value.map(|v| Dynamic::Number(v.into())).unwrap_or(Dynamic::Null),
        )
    }

    pub fn bool(self, name: &str, value: bool) -> Self {
        self.value(name, Dynamic::Bool(value))
    }

    pub fn strings(self, name: &str, values: &[String]) -> Self {
        self.value(
            name,
            Dynamic::List(values.iter().cloned().map(Dynamic::String).collect()),
        )
    }

    pub fn build(mut self) -> OpResult<DynamicValue> {
        if let Dynamic::Map(attributes) = &mut self.state.value {
            for value in attributes.values_mut() {
                if matches!(value, Dynamic::Unknown) {
                    *value = Dynamic::Null;
                }
            }
        }

        if self.diagnostics.is_empty() {
            Ok(self.state)
        } else {
            Err(Failure::new(self.diagnostics))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Direction;

    fn config(pairs: &[(&str, Dynamic)]) -> DynamicValue {
        let mut value = DynamicValue::empty_object();
        for (name, v) in pairs {
            value.set(&attr(name), v.clone()).unwrap();
        }
        value
    }

    #[test]
    fn reader_collects_every_problem() {
        let value = config(&[
            ("direction", Dynamic::String("sideways".into())),
            ("port", Dynamic::Number(80.5)),
        ]);
        let mut reader = ConfigReader::new(&value);

        let _ = reader.string("name");
        let _: Option<Direction> = reader.optional_enum("direction");
        let _: Option<u16> = reader.optional_integer("port");

        let failure = reader.finish().unwrap_err();
        let summaries: Vec<_> = failure.diagnostics.iter().map(|d| d.summary.clone()).collect();
        assert_eq!(summaries, ["Missing name", "Invalid direction", "Invalid port"]);
        assert!(failure.diagnostics[1].detail.contains("ingress, egress"));
    }

    #[test]
    fn reader_treats_unknown_as_absent() {
        let value = config(&[("name", Dynamic::Unknown)]);
        let mut reader = ConfigReader::new(&value);

        assert_eq!(reader.string("name"), "");
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn validation_mode_skips_required_checks() {
        let value = DynamicValue::empty_object();
        let mut reader = ConfigReader::for_validation(&value);

        let _: u32 = reader.integer("size_gb");
        assert!(reader.into_diagnostics().is_empty());
    }

    #[test]
    fn integers_must_fit_target_type() {
        let value = config(&[("port", Dynamic::Number(70000.0))]);
        let mut reader = ConfigReader::new(&value);

        assert_eq!(reader.optional_integer::<u16>("port"), None);
        assert!(reader.finish().is_err());
    }

    #[test]
    fn builder_resolves_leftover_unknowns() {
        let plan = config(&[
            ("name", Dynamic::String("web".into())),
            ("private_ip", Dynamic::Unknown),
            ("id", Dynamic::Unknown),
        ]);

        let state = StateBuilder::new(&plan).string("id", "i-1").build().unwrap();

        assert_eq!(state.get(&attr("id")), Some(&Dynamic::String("i-1".into())));
        assert_eq!(state.get(&attr("private_ip")), Some(&Dynamic::Null));
        assert_eq!(state.get(&attr("name")), Some(&Dynamic::String("web".into())));
    }

    #[test]
    fn failed_create_without_remote_object_reports_null_state() {
        let (state, diagnostics) = Failure::from(not_configured()).into_create_state();
        assert!(state.is_null());
        assert_eq!(diagnostics[0].summary, "Provider not configured");
    }
}
