//! Built-in attribute validators
//!
//! Validators only see known, non-null values; [`Schema::validate`] skips
//! the rest.
//!
//! [`Schema::validate`]: crate::schema::Schema::validate

use crate::schema::{Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{Diagnostic, Dynamic};
use regex::Regex;
use std::net::IpAddr;

fn path_label(request: &ValidatorRequest) -> String {
    request
        .path
        .steps
        .iter()
        .map(|step| match step {
            crate::types::AttributePathStep::AttributeName(name) => name.clone(),
            crate::types::AttributePathStep::ElementKeyString(key) => format!("[\"{}\"]", key),
            crate::types::AttributePathStep::ElementKeyInt(idx) => format!("[{}]", idx),
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn single(diagnostic: Diagnostic, request: &ValidatorRequest) -> ValidatorResponse {
    ValidatorResponse {
        diagnostics: vec![diagnostic.with_attribute(request.path.clone())],
    }
}

fn ok() -> ValidatorResponse {
    ValidatorResponse {
        diagnostics: Vec::new(),
    }
}

/// Accepts only the listed strings
pub struct StringOneOf {
    allowed: Vec<String>,
}

impl StringOneOf {
    pub fn new<I, S>(allowed: I) -> Box<dyn Validator>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Box::new(Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        })
    }
}

impl Validator for StringOneOf {
    fn description(&self) -> String {
        format!("value must be one of: {}", self.allowed.join(", "))
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        match &request.config_value.value {
            Dynamic::String(s) if !self.allowed.iter().any(|a| a == s) => single(
                Diagnostic::error(
                    format!("Invalid value for {}", path_label(&request)),
                    format!("'{}' is not valid, {}", s, self.description()),
                ),
                &request,
            ),
            _ => ok(),
        }
    }
}

pub struct StringLength {
    min: Option<usize>,
    max: Option<usize>,
}

impl StringLength {
    pub fn between(min: usize, max: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: Some(max),
        })
    }

    pub fn at_least(min: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: None,
        })
    }
}

impl Validator for StringLength {
    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("length must be between {} and {}", min, max),
            (Some(min), None) => format!("length must be at least {}", min),
            (None, Some(max)) => format!("length must be at most {}", max),
            (None, None) => "any length".to_string(),
        }
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Dynamic::String(s) = &request.config_value.value else {
            return ok();
        };
        let len = s.chars().count();
        let too_short = self.min.is_some_and(|min| len < min);
        let too_long = self.max.is_some_and(|max| len > max);

        if too_short || too_long {
            single(
                Diagnostic::error(
                    format!("Invalid length for {}", path_label(&request)),
                    format!("{}, got {}", self.description(), len),
                ),
                &request,
            )
        } else {
            ok()
        }
    }
}

/// Matches the whole string against a regular expression
///
/// An invalid pattern is reported as an error diagnostic for every value.
pub struct StringMatches {
    pattern: Result<Regex, regex::Error>,
    message: String,
}

impl StringMatches {
    pub fn new(pattern: &str, message: &str) -> Box<dyn Validator> {
        Box::new(Self {
            pattern: Regex::new(pattern),
            message: message.to_string(),
        })
    }
}

impl Validator for StringMatches {
    fn description(&self) -> String {
        self.message.clone()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let pattern = match &self.pattern {
            Ok(pattern) => pattern,
            Err(e) => {
                return single(
                    Diagnostic::error("Invalid validator pattern", e.to_string()),
                    &request,
                )
            }
        };
        match &request.config_value.value {
            Dynamic::String(s) if !pattern.is_match(s) => single(
                Diagnostic::error(
                    format!("Invalid value for {}", path_label(&request)),
                    format!("'{}': {}", s, self.message),
                ),
                &request,
            ),
            _ => ok(),
        }
    }
}

pub struct NumberRange {
    min: f64,
    max: f64,
    integer: bool,
}

impl NumberRange {
    pub fn new(min: f64, max: f64) -> Box<dyn Validator> {
        Box::new(Self {
            min,
            max,
            integer: false,
        })
    }

    /// Whole numbers in `min..=max`
    pub fn integer(min: i64, max: i64) -> Box<dyn Validator> {
        Box::new(Self {
            min: min as f64,
            max: max as f64,
            integer: true,
        })
    }
}

impl Validator for NumberRange {
    fn description(&self) -> String {
        if self.integer {
            format!("must be a whole number between {} and {}", self.min, self.max)
        } else {
            format!("must be between {} and {}", self.min, self.max)
        }
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let n = match &request.config_value.value {
            Dynamic::Number(n) => *n,
            _ => return ok(),
        };
        let out_of_range = n < self.min || n > self.max;
        let fractional = self.integer && n.fract() != 0.0;

        if out_of_range || fractional {
            single(
                Diagnostic::error(
                    format!("Invalid value for {}", path_label(&request)),
                    format!("{} {}", n, self.description()),
                ),
                &request,
            )
        } else {
            ok()
        }
    }
}

/// IPv4 or IPv6 CIDR block such as `10.0.0.0/16`
pub struct CidrBlock;

impl CidrBlock {
    pub fn new() -> Box<dyn Validator> {
        Box::new(Self)
    }

    pub fn is_valid(value: &str) -> bool {
        let Some((addr, prefix)) = value.split_once('/') else {
            return false;
        };
        let Ok(addr) = addr.parse::<IpAddr>() else {
            return false;
        };
        let Ok(prefix) = prefix.parse::<u8>() else {
            return false;
        };
        match addr {
            IpAddr::V4(_) => prefix <= 32,
            IpAddr::V6(_) => prefix <= 128,
        }
    }
}

impl Validator for CidrBlock {
    fn description(&self) -> String {
        "must be a CIDR block such as 10.0.0.0/16".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        match &request.config_value.value {
            Dynamic::String(s) if !Self::is_valid(s) => single(
                Diagnostic::error(
                    format!("Invalid CIDR block for {}", path_label(&request)),
                    format!("'{}' {}", s, self.description()),
                ),
                &request,
            ),
            Dynamic::List(items) => {
                let diagnostics = items
                    .iter()
                    .filter_map(|item| match item {
                        Dynamic::String(s) if !Self::is_valid(s) => Some(
                            Diagnostic::error(
                                format!("Invalid CIDR block for {}", path_label(&request)),
                                format!("'{}' {}", s, self.description()),
                            )
                            .with_attribute(request.path.clone()),
                        ),
                        _ => None,
                    })
                    .collect();
                ValidatorResponse { diagnostics }
            }
            _ => ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributePath, DynamicValue};

    fn run(validator: &dyn Validator, value: Dynamic) -> Vec<Diagnostic> {
        validator
            .validate(ValidatorRequest {
                config_value: DynamicValue::new(value),
                path: AttributePath::new("field"),
            })
            .diagnostics
    }

    #[test]
    fn one_of_lists_accepted_values() {
        let validator = StringOneOf::new(["ingress", "egress"]);

        assert!(run(validator.as_ref(), Dynamic::String("ingress".into())).is_empty());

        let diags = run(validator.as_ref(), Dynamic::String("sideways".into()));
        assert_eq!(diags.len(), 1);
        assert!(diags[0].detail.contains("ingress, egress"));
        assert_eq!(diags[0].attribute, Some(AttributePath::new("field")));
    }

    #[test]
    fn string_length_bounds() {
        let validator = StringLength::between(3, 5);

        assert!(run(validator.as_ref(), Dynamic::String("abcd".into())).is_empty());
        assert_eq!(run(validator.as_ref(), Dynamic::String("ab".into())).len(), 1);
        assert_eq!(run(validator.as_ref(), Dynamic::String("abcdef".into())).len(), 1);
    }

    #[test]
    fn pattern_matches_whole_names() {
        let validator =
            StringMatches::new(r"^[a-z][a-z0-9-]*$", "lowercase letters, digits and dashes");

        assert!(run(validator.as_ref(), Dynamic::String("web-01".into())).is_empty());
        assert_eq!(run(validator.as_ref(), Dynamic::String("Web_01".into())).len(), 1);

        let broken = StringMatches::new("(", "unbalanced");
        let diags = run(broken.as_ref(), Dynamic::String("x".into()));
        assert_eq!(diags[0].summary, "Invalid validator pattern");
    }

    #[test]
    fn integer_range_rejects_fractions() {
        let validator = NumberRange::integer(1, 65535);

        assert!(run(validator.as_ref(), Dynamic::Number(443.0)).is_empty());
        assert_eq!(run(validator.as_ref(), Dynamic::Number(0.0)).len(), 1);
        assert_eq!(run(validator.as_ref(), Dynamic::Number(80.5)).len(), 1);
    }

    #[test]
    fn cidr_blocks() {
        assert!(CidrBlock::is_valid("10.0.0.0/16"));
        assert!(CidrBlock::is_valid("fd00::/64"));
        assert!(!CidrBlock::is_valid("10.0.0.0/33"));
        assert!(!CidrBlock::is_valid("10.0.0.0"));
        assert!(!CidrBlock::is_valid("not-a-cidr/8"));

        let diags = run(
            CidrBlock::new().as_ref(),
            Dynamic::List(vec![
                Dynamic::String("192.168.0.0/24".into()),
                Dynamic::String("bogus".into()),
            ]),
        );
        assert_eq!(diags.len(), 1);
    }
}
