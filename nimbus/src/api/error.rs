use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{kind} {id} not found")]
    NotFound { kind: String, id: String },

    #[error("API returned error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Authentication failed, check the API key")]
    Auth,

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// Names the missing object in a NotFound error; other errors pass through
    pub fn for_resource(self, kind: &str, id: &str) -> Self {
        match self {
            ApiError::NotFound { .. } => ApiError::NotFound {
                kind: kind.to_string(),
                id: id.to_string(),
            },
            other => other,
        }
    }

    /// Errors worth another attempt for idempotent requests
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::RateLimited | ApiError::ServiceUnavailable | ApiError::Timeout(_) => true,
            ApiError::Api { status, .. } => *status >= 500,
            ApiError::Request(e) => e.is_connect(),
            _ => false,
        }
    }

    pub fn invalid_value(field: &str, message: impl Into<String>) -> Self {
        ApiError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl tfplug::retry::NotFound for ApiError {
    fn is_not_found(&self) -> bool {
        ApiError::is_not_found(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_resource_rewrites_only_not_found() {
        let err = ApiError::NotFound {
            kind: "resource".to_string(),
            id: "/vpcs/v1".to_string(),
        }
        .for_resource("vpc", "v1");
        assert_eq!(err.to_string(), "vpc v1 not found");

        let err = ApiError::Auth.for_resource("vpc", "v1");
        assert!(matches!(err, ApiError::Auth));
    }

    #[test]
    fn server_errors_are_retryable() {
        assert!(ApiError::Api {
            status: 502,
            message: String::new()
        }
        .is_retryable());
        assert!(!ApiError::Api {
            status: 409,
            message: String::new()
        }
        .is_retryable());
        assert!(ApiError::RateLimited.is_retryable());
        assert!(!ApiError::Auth.is_retryable());
    }
}
