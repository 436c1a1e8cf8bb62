//! Default values for optional attributes
//!
//! Defaults are applied while planning, for optional+computed attributes
//! that the configuration leaves null.
//!
//! ```ignore
//! let priority = AttributeBuilder::new("priority", AttributeType::Number)
//!     .optional()
//!     .computed()
//!     .default(StaticDefault::number(100.0))
//!     .build();
//! ```

use crate::schema::{Default, DefaultRequest, DefaultResponse};
use crate::types::{Dynamic, DynamicValue};

pub struct StaticDefault {
    value: Dynamic,
}

impl StaticDefault {
    pub fn create(value: Dynamic) -> Box<dyn Default> {
        Box::new(Self { value })
    }

    pub fn string(value: &str) -> Box<dyn Default> {
        Self::create(Dynamic::String(value.to_string()))
    }

    pub fn number(value: f64) -> Box<dyn Default> {
        Self::create(Dynamic::Number(value))
    }

    pub fn bool(value: bool) -> Box<dyn Default> {
        Self::create(Dynamic::Bool(value))
    }
}

impl Default for StaticDefault {
    fn description(&self) -> String {
        format!("static default value: {:?}", self.value)
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        DefaultResponse {
            value: DynamicValue::new(self.value.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributePath;

    #[test]
    fn static_defaults_return_their_value() {
        let request = || DefaultRequest {
            path: AttributePath::new("enable_dhcp"),
        };

        assert_eq!(
            StaticDefault::bool(true).default_value(request()).value.value,
            Dynamic::Bool(true)
        );
        assert_eq!(
            StaticDefault::string("round_robin")
                .default_value(request())
                .value
                .value,
            Dynamic::String("round_robin".to_string())
        );
        assert_eq!(
            StaticDefault::number(100.0).default_value(request()).value.value,
            Dynamic::Number(100.0)
        );
    }
}
