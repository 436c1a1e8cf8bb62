//! Import helpers for simplifying resource import implementations

use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::types::{AttributePath, Diagnostic, DynamicValue};

/// Sets the import ID to a specific attribute in state
///
/// Example: ID "vpc-123" -> state.id = "vpc-123"
pub fn import_state_passthrough_id(
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
) -> ImportResourceStateResponse {
    import_state_parts(&[attr_path], request)
}

/// Splits a composite import ID on `/` and stores each part in the matching
/// attribute, e.g. "pol-1/rule-9" -> policy_id = "pol-1", id = "rule-9".
pub fn import_state_parts(
    attr_paths: &[AttributePath],
    request: &ImportResourceStateRequest,
) -> ImportResourceStateResponse {
    let parts: Vec<&str> = if attr_paths.len() == 1 {
        vec![request.id.as_str()]
    } else {
        request.id.split('/').collect()
    };

    if parts.len() != attr_paths.len() || parts.iter().any(|p| p.is_empty()) {
        let expected = attr_paths
            .iter()
            .map(|p| format!("<{}>", path_name(p)))
            .collect::<Vec<_>>()
            .join("/");
        return ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![Diagnostic::error(
                "Invalid import ID",
                format!(
                    "Import ID '{}' must be in the format '{}'",
                    request.id, expected
                ),
            )],
        };
    }

    let mut state = DynamicValue::empty_object();
    for (path, part) in attr_paths.iter().zip(parts) {
        if let Err(e) = state.set_string(path, part.to_string()) {
            return ImportResourceStateResponse {
                imported_resources: vec![],
                diagnostics: vec![Diagnostic::error(
                    format!("Failed to set import ID: {}", e),
                    format!(
                        "Could not set attribute '{}' to value '{}'",
                        path_name(path),
                        part
                    ),
                )
                .with_attribute(path.clone())],
            };
        }
    }

    ImportResourceStateResponse {
        imported_resources: vec![ImportedResource {
            type_name: request.type_name.clone(),
            state,
        }],
        diagnostics: vec![],
    }
}

fn path_name(path: &AttributePath) -> String {
    path.steps
        .iter()
        .filter_map(|step| match step {
            crate::types::AttributePathStep::AttributeName(name) => Some(name.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(".")
}
