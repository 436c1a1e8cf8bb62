//! Provider configuration: the provider block with environment fallbacks

use std::time::Duration;
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

pub const ENV_ENDPOINT: &str = "NIMBUS_ENDPOINT";
pub const ENV_API_KEY: &str = "NIMBUS_API_KEY";
pub const ENV_API_KEY_FALLBACK: &str = "API_KEY";
pub const ENV_INSECURE: &str = "NIMBUS_INSECURE";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub api_key: String,
    pub insecure: bool,
    pub request_timeout: Duration,
}

impl ProviderConfig {
    /// Reads the provider block, falling back to the environment for unset
    /// attributes. All problems are reported together.
    pub fn from_value(config: &DynamicValue) -> Result<Self, Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();

        let endpoint = string_attr(config, "endpoint", &mut diagnostics)
            .or_else(|| env_string(ENV_ENDPOINT));
        let api_key = string_attr(config, "api_key", &mut diagnostics)
            .or_else(|| env_string(ENV_API_KEY))
            .or_else(|| env_string(ENV_API_KEY_FALLBACK));

        let insecure = match config.get_bool_opt(&AttributePath::new("insecure")) {
            Ok(Some(value)) => value,
            Ok(None) => env_bool(ENV_INSECURE, &mut diagnostics),
            Err(e) => {
                diagnostics.push(invalid("insecure", e.to_string()));
                false
            }
        };

        let request_timeout = match string_attr(config, "request_timeout", &mut diagnostics) {
            Some(raw) => parse_timeout(&raw).unwrap_or_else(|diagnostic| {
                diagnostics.push(diagnostic);
                DEFAULT_REQUEST_TIMEOUT
            }),
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let endpoint = match endpoint {
            Some(endpoint) => {
                if let Err(diagnostic) = check_endpoint(&endpoint) {
                    diagnostics.push(diagnostic);
                }
                endpoint
            }
            None => {
                diagnostics.push(
                    Diagnostic::error(
                        "endpoint is required",
                        format!("Set endpoint in the provider block or the {} environment variable", ENV_ENDPOINT),
                    )
                    .with_attribute(AttributePath::new("endpoint")),
                );
                String::new()
            }
        };

        let api_key = match api_key {
            Some(api_key) => api_key,
            None => {
                diagnostics.push(
                    Diagnostic::error(
                        "api_key is required",
                        format!(
                            "Set api_key in the provider block or the {} environment variable",
                            ENV_API_KEY
                        ),
                    )
                    .with_attribute(AttributePath::new("api_key")),
                );
                String::new()
            }
        };

        if diagnostics.is_empty() {
            Ok(Self {
                endpoint,
                api_key,
                insecure,
                request_timeout,
            })
        } else {
            Err(diagnostics)
        }
    }
}

/// Checks the attributes that are set, without consulting the environment.
/// Missing settings are only reported by [`ProviderConfig::from_value`].
pub fn validate(config: &DynamicValue) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if let Some(endpoint) = string_attr(config, "endpoint", &mut diagnostics) {
        if let Err(diagnostic) = check_endpoint(&endpoint) {
            diagnostics.push(diagnostic);
        }
    }
    let _ = string_attr(config, "api_key", &mut diagnostics);
    if let Err(e) = config.get_bool_opt(&AttributePath::new("insecure")) {
        diagnostics.push(invalid("insecure", e.to_string()));
    }
    if let Some(raw) = string_attr(config, "request_timeout", &mut diagnostics) {
        if let Err(diagnostic) = parse_timeout(&raw) {
            diagnostics.push(diagnostic);
        }
    }

    diagnostics
}

fn check_endpoint(endpoint: &str) -> Result<(), Diagnostic> {
    url::Url::parse(endpoint)
        .map(|_| ())
        .map_err(|e| invalid("endpoint", format!("'{}' is not a valid URL: {}", endpoint, e)))
}

fn parse_timeout(raw: &str) -> Result<Duration, Diagnostic> {
    match humantime::parse_duration(raw) {
        Ok(timeout) if !timeout.is_zero() => Ok(timeout),
        Ok(_) => Err(invalid("request_timeout", "must be greater than zero")),
        Err(e) => Err(invalid("request_timeout", e.to_string())),
    }
}

fn invalid(attribute: &str, detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(format!("Invalid {}", attribute), detail)
        .with_attribute(AttributePath::new(attribute))
}

fn string_attr(config: &DynamicValue, name: &str, diagnostics: &mut Vec<Diagnostic>) -> Option<String> {
    match config.get_string_opt(&AttributePath::new(name)) {
        Ok(value) => value.filter(|s| !s.trim().is_empty()),
        Err(e) => {
            diagnostics.push(invalid(name, e.to_string()));
            None
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn env_bool(name: &str, diagnostics: &mut Vec<Diagnostic>) -> bool {
    match env_string(name) {
        None => false,
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => {
                diagnostics.push(Diagnostic::error(
                    format!("Invalid {}", name),
                    format!("'{}' is not a boolean", raw),
                ));
                false
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tfplug::types::Dynamic;

    fn clear_env() {
        for name in [ENV_ENDPOINT, ENV_API_KEY, ENV_API_KEY_FALLBACK, ENV_INSECURE] {
            std::env::remove_var(name);
        }
    }

    fn block(pairs: &[(&str, Dynamic)]) -> DynamicValue {
        let mut value = DynamicValue::empty_object();
        for (name, v) in pairs {
            value.set(&AttributePath::new(name), v.clone()).unwrap();
        }
        value
    }

    #[test]
    #[serial]
    fn provider_block_wins_over_environment() {
        clear_env();
        std::env::set_var(ENV_ENDPOINT, "https://env.nimbus.example");

        let config = ProviderConfig::from_value(&block(&[
            ("endpoint", Dynamic::String("https://api.nimbus.example".into())),
            ("api_key", Dynamic::String("secret".into())),
            ("request_timeout", Dynamic::String("45s".into())),
        ]))
        .unwrap();

        assert_eq!(config.endpoint, "https://api.nimbus.example");
        assert_eq!(config.api_key, "secret");
        assert!(!config.insecure);
        assert_eq!(config.request_timeout, Duration::from_secs(45));
        clear_env();
    }

    #[test]
    #[serial]
    fn environment_fills_missing_attributes() {
        clear_env();
        std::env::set_var(ENV_ENDPOINT, "https://env.nimbus.example");
        std::env::set_var(ENV_API_KEY_FALLBACK, "fallback-key");
        std::env::set_var(ENV_INSECURE, "true");

        let config = ProviderConfig::from_value(&DynamicValue::empty_object()).unwrap();

        assert_eq!(config.endpoint, "https://env.nimbus.example");
        assert_eq!(config.api_key, "fallback-key");
        assert!(config.insecure);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        clear_env();
    }

    #[test]
    #[serial]
    fn nimbus_api_key_takes_precedence_over_generic_one() {
        clear_env();
        std::env::set_var(ENV_ENDPOINT, "https://env.nimbus.example");
        std::env::set_var(ENV_API_KEY, "nimbus-key");
        std::env::set_var(ENV_API_KEY_FALLBACK, "fallback-key");

        let config = ProviderConfig::from_value(&DynamicValue::empty_object()).unwrap();
        assert_eq!(config.api_key, "nimbus-key");
        clear_env();
    }

    #[test]
    #[serial]
    fn missing_settings_are_all_reported() {
        clear_env();

        let diagnostics = ProviderConfig::from_value(&block(&[(
            "request_timeout",
            Dynamic::String("soon".into()),
        )]))
        .unwrap_err();

        let summaries: Vec<_> = diagnostics.iter().map(|d| d.summary.as_str()).collect();
        assert!(summaries.contains(&"endpoint is required"));
        assert!(summaries.contains(&"api_key is required"));
        assert!(summaries.contains(&"Invalid request_timeout"));
    }

    #[test]
    #[serial]
    fn validation_ignores_settings_left_to_the_environment() {
        clear_env();

        assert!(validate(&DynamicValue::empty_object()).is_empty());

        let diagnostics = validate(&block(&[
            ("endpoint", Dynamic::String("nimbus".into())),
            ("request_timeout", Dynamic::String("0s".into())),
        ]));
        let summaries: Vec<_> = diagnostics.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, ["Invalid endpoint", "Invalid request_timeout"]);
    }

    #[test]
    #[serial]
    fn rejects_malformed_endpoint() {
        clear_env();

        let diagnostics = ProviderConfig::from_value(&block(&[
            ("endpoint", Dynamic::String("nimbus".into())),
            ("api_key", Dynamic::String("secret".into())),
        ]))
        .unwrap_err();

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Invalid endpoint");
    }
}
