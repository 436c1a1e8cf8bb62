//! Built-in plan modifiers

use crate::schema::{PlanModifier, PlanModifierRequest, PlanModifierResponse};
use crate::types::Dynamic;

/// Marks an attribute as requiring replacement when its value changes
/// between prior state and plan. Creation and unknown plans never count as a
/// change.
pub struct RequiresReplace;

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "Changing this value forces a new resource".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let requires_replace = !matches!(
            (&request.state_value.value, &request.plan_value.value),
            (Dynamic::Null, _) | (Dynamic::Unknown, _) | (_, Dynamic::Unknown)
        ) && request.state_value != request.plan_value;

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: Vec::new(),
        }
    }
}

/// Uses the prior state value when the planned value is unknown
///
/// For computed attributes that do not change after creation, such as IDs
/// and assigned addresses.
pub struct UseStateForUnknown;

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "Once set, the value of this attribute in state will not change".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let plan_value = match (&request.plan_value.value, &request.state_value.value) {
            (Dynamic::Unknown, Dynamic::Null) => request.plan_value,
            (Dynamic::Unknown, _) => request.state_value,
            _ => request.plan_value,
        };

        PlanModifierResponse {
            plan_value,
            requires_replace: false,
            diagnostics: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributePath, DynamicValue};

    fn request(state: Dynamic, plan: Dynamic) -> PlanModifierRequest {
        PlanModifierRequest {
            config_value: DynamicValue::new(plan.clone()),
            state_value: DynamicValue::new(state),
            plan_value: DynamicValue::new(plan),
            path: AttributePath::new("cidr"),
        }
    }

    #[test]
    fn requires_replace_on_change() {
        let response = RequiresReplace.modify(request(
            Dynamic::String("10.0.0.0/16".to_string()),
            Dynamic::String("10.1.0.0/16".to_string()),
        ));
        assert!(response.requires_replace);
    }

    #[test]
    fn requires_replace_ignores_create_and_unknown() {
        let create = RequiresReplace.modify(request(
            Dynamic::Null,
            Dynamic::String("10.0.0.0/16".to_string()),
        ));
        assert!(!create.requires_replace);

        let unknown = RequiresReplace.modify(request(
            Dynamic::String("10.0.0.0/16".to_string()),
            Dynamic::Unknown,
        ));
        assert!(!unknown.requires_replace);

        let same = RequiresReplace.modify(request(
            Dynamic::String("10.0.0.0/16".to_string()),
            Dynamic::String("10.0.0.0/16".to_string()),
        ));
        assert!(!same.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_keeps_prior_value() {
        let response = UseStateForUnknown.modify(request(
            Dynamic::String("vpc-123".to_string()),
            Dynamic::Unknown,
        ));
        assert_eq!(
            response.plan_value.value,
            Dynamic::String("vpc-123".to_string())
        );

        let fresh = UseStateForUnknown.modify(request(Dynamic::Null, Dynamic::Unknown));
        assert!(fresh.plan_value.is_unknown());
    }
}
