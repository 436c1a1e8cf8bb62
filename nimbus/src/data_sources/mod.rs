//! Nimbus data sources
//!
//! Read-only lookups of existing remote objects. A lookup that matches
//! nothing, or more than one object, is an error.

pub mod flavor;
pub mod image;
pub mod network;
pub mod vpc;

pub use flavor::FlavorDataSource;
pub use image::ImageDataSource;
pub use network::NetworkDataSource;
pub use vpc::VpcDataSource;

use crate::resources::{ConfigReader, OpResult};
use tfplug::data_source::ReadDataSourceResponse;
use tfplug::types::{Diagnostic, DynamicValue};

pub(crate) fn read_response(result: OpResult<DynamicValue>) -> ReadDataSourceResponse {
    match result {
        Ok(state) => ReadDataSourceResponse {
            state,
            diagnostics: vec![],
        },
        Err(failure) => ReadDataSourceResponse {
            state: DynamicValue::null(),
            diagnostics: failure.diagnostics,
        },
    }
}

/// The single element of a filtered listing
pub(crate) fn exactly_one<T>(mut matches: Vec<T>, kind: &str, query: &str) -> OpResult<T> {
    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(Diagnostic::error(
            format!("No {} found", kind),
            format!("No {} matches {}", kind, query),
        )
        .into()),
        n => Err(Diagnostic::error(
            format!("Multiple {}s found", kind),
            format!("{} {}s match {}; narrow the query", n, kind, query),
        )
        .into()),
    }
}

/// Lookups by `id` or by `name` take one or the other
pub(crate) fn id_or_name(reader: &mut ConfigReader<'_>) -> (Option<String>, Option<String>) {
    let id = reader.optional_string("id");
    let name = reader.optional_string("name");
    if id.is_some() && name.is_some() {
        reader.error(
            "name",
            "Conflicting lookup",
            "Only one of 'id' or 'name' can be set",
        );
    }
    (id, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_match_is_returned() {
        assert_eq!(exactly_one(vec!["img-1"], "image", "name 'debian'").unwrap(), "img-1");
    }

    #[test]
    fn no_match_and_ambiguous_match_are_errors() {
        let none = exactly_one(Vec::<&str>::new(), "image", "name 'debian'").unwrap_err();
        assert_eq!(none.diagnostics[0].summary, "No image found");

        let many = exactly_one(vec!["a", "b"], "image", "name 'debian'").unwrap_err();
        assert_eq!(many.diagnostics[0].summary, "Multiple images found");
        assert!(many.diagnostics[0].detail.starts_with("2 images"));
    }
}
