use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::common::{ApiErrorResponse, ApiQueryParams, ApiResponse};
use super::error::ApiError;

/// Correlates a request with the platform's own logs
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Nimbus API client
///
/// Cheap to clone. Only GET requests are retried; a mutating request is
/// sent exactly once and its failure is returned to the caller.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    auth_header: String,
    retry_config: RetryConfig,
}

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 30,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based), doubling up to the cap
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms)
    }
}

impl Client {
    /// Create a new API client with default configuration
    pub fn new(endpoint: &str, api_key: &str, insecure: bool) -> Result<Self, ApiError> {
        Self::with_config(endpoint, api_key, insecure, RetryConfig::default())
    }

    /// Create a new API client with custom retry configuration
    pub fn with_config(
        endpoint: &str,
        api_key: &str,
        insecure: bool,
        retry_config: RetryConfig,
    ) -> Result<Self, ApiError> {
        let parsed = url::Url::parse(endpoint)
            .map_err(|e| ApiError::invalid_value("endpoint", e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::invalid_value(
                "endpoint",
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }

        let http_client = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .timeout(Duration::from_secs(retry_config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .user_agent(concat!("terraform-provider-nimbus/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url = format!("{}/v1", endpoint.trim_end_matches('/'));
        let auth_header = format!("Bearer {}", api_key);

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                auth_header,
                retry_config,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Execute a GET request with retry logic
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute_with_retry(|| self.request(Method::GET, path).send(), path)
            .await
    }

    /// Execute a GET request with query parameters
    pub async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &ApiQueryParams,
    ) -> Result<T, ApiError> {
        let full_path = format!("{}{}", path, params.to_query_string());
        self.get(&full_path).await
    }

    /// Execute a POST request, sent once
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.send_once(self.request(Method::POST, path).json(body)).await?;
        self.handle_response(response, path).await
    }

    /// Execute a PATCH request, sent once
    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.send_once(self.request(Method::PATCH, path).json(body)).await?;
        self.handle_response(response, path).await
    }

    /// Execute a DELETE request whose response carries a body, e.g. a task
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send_once(self.request(Method::DELETE, path)).await?;
        self.handle_response(response, path).await
    }

    /// Execute a DELETE request and ignore any response body
    pub async fn delete_empty(&self, path: &str) -> Result<(), ApiError> {
        let response = self.send_once(self.request(Method::DELETE, path)).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.error_from_response(response, path).await)
        }
    }

    pub fn tasks(&self) -> crate::api::tasks::TasksApi<'_> {
        crate::api::tasks::TasksApi::new(self)
    }

    pub fn vpcs(&self) -> crate::api::vpcs::VpcsApi<'_> {
        crate::api::vpcs::VpcsApi::new(self)
    }

    pub fn routers(&self) -> crate::api::routers::RoutersApi<'_> {
        crate::api::routers::RoutersApi::new(self)
    }

    pub fn networks(&self) -> crate::api::networks::NetworksApi<'_> {
        crate::api::networks::NetworksApi::new(self)
    }

    pub fn volumes(&self) -> crate::api::volumes::VolumesApi<'_> {
        crate::api::volumes::VolumesApi::new(self)
    }

    pub fn instances(&self) -> crate::api::instances::InstancesApi<'_> {
        crate::api::instances::InstancesApi::new(self)
    }

    pub fn floating_ips(&self) -> crate::api::floating_ips::FloatingIpsApi<'_> {
        crate::api::floating_ips::FloatingIpsApi::new(self)
    }

    pub fn firewall(&self) -> crate::api::firewall::FirewallApi<'_> {
        crate::api::firewall::FirewallApi::new(self)
    }

    pub fn network_policies(&self) -> crate::api::network_policies::NetworkPoliciesApi<'_> {
        crate::api::network_policies::NetworkPoliciesApi::new(self)
    }

    pub fn vpn(&self) -> crate::api::vpn::VpnApi<'_> {
        crate::api::vpn::VpnApi::new(self)
    }

    pub fn load_balancers(&self) -> crate::api::load_balancers::LoadBalancersApi<'_> {
        crate::api::load_balancers::LoadBalancersApi::new(self)
    }

    pub fn tags(&self) -> crate::api::tags::TagsApi<'_> {
        crate::api::tags::TagsApi::new(self)
    }

    pub fn catalog(&self) -> crate::api::catalog::CatalogApi<'_> {
        crate::api::catalog::CatalogApi::new(self)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.inner.base_url, path);
        let request_id = Uuid::new_v4().to_string();

        tracing::debug!(%method, %url, %request_id, "sending request");

        self.inner
            .http_client
            .request(method, &url)
            .header(AUTHORIZATION, &self.inner.auth_header)
            .header(REQUEST_ID_HEADER, request_id)
    }

    async fn send_once(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        request.send().await.map_err(|e| self.transport_error(e))
    }

    /// Execute request with retry logic
    async fn execute_with_retry<F, Fut, T>(&self, request_fn: F, path: &str) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
        T: DeserializeOwned,
    {
        let config = &self.inner.retry_config;
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let backoff = config.backoff_ms(attempt);
                tracing::debug!(
                    "Retrying request to {} after {}ms (attempt {})",
                    path,
                    backoff,
                    attempt
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let result = match request_fn().await {
                Ok(response) => self.handle_response(response, path).await,
                Err(e) => Err(self.transport_error(e)),
            };

            match result {
                Err(e) if e.is_retryable() && attempt < config.max_retries => {
                    tracing::warn!(path, error = %e, "request failed, will retry");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        path: &str,
    ) -> Result<T, ApiError> {
        if response.status().is_success() {
            self.parse_success_response(response).await
        } else {
            Err(self.error_from_response(response, path).await)
        }
    }

    /// Parse successful response, with or without the `data` wrapper
    async fn parse_success_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        tracing::trace!("API response body: {}", text);

        match serde_json::from_str::<ApiResponse<T>>(&text) {
            Ok(wrapper) => Ok(wrapper.data),
            Err(_) => serde_json::from_str::<T>(&text).map_err(|e| {
                tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
                ApiError::Parse(format!("Failed to parse response: {}", e))
            }),
        }
    }

    async fn error_from_response(&self, response: reqwest::Response, path: &str) -> ApiError {
        let status = response.status();
        tracing::debug!(path, status = status.as_u16(), "API returned an error");

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return ApiError::Auth,
            StatusCode::NOT_FOUND => {
                return ApiError::NotFound {
                    kind: "resource".to_string(),
                    id: path.to_string(),
                }
            }
            StatusCode::TOO_MANY_REQUESTS => return ApiError::RateLimited,
            StatusCode::SERVICE_UNAVAILABLE => return ApiError::ServiceUnavailable,
            _ => {}
        }

        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let message = match serde_json::from_str::<ApiErrorResponse>(&text) {
            Ok(body) => match body.error.code {
                Some(code) => format!("{}: {}", code, body.error.message),
                None => body.error.message,
            },
            Err(_) => text,
        };

        ApiError::Api {
            status: status.as_u16(),
            message,
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.inner.retry_config.timeout_seconds)
        } else {
            ApiError::Request(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let config = RetryConfig {
            max_retries: 100,
            initial_backoff_ms: 100,
            max_backoff_ms: 1000,
            timeout_seconds: 30,
        };

        assert_eq!(config.backoff_ms(1), 100);
        assert_eq!(config.backoff_ms(2), 200);
        assert_eq!(config.backoff_ms(4), 800);
        assert_eq!(config.backoff_ms(5), 1000);
        assert_eq!(config.backoff_ms(65), 1000);
        assert_eq!(config.backoff_ms(u32::MAX), 1000);
    }

    #[test]
    fn rejects_invalid_endpoints() {
        assert!(matches!(
            Client::new("not a url", "key", false),
            Err(ApiError::InvalidValue { .. })
        ));
        assert!(matches!(
            Client::new("ftp://api.nimbus.example", "key", false),
            Err(ApiError::InvalidValue { .. })
        ));
    }

    #[test]
    fn base_url_gets_version_prefix() {
        let client = Client::new("https://api.nimbus.example/", "key", false).unwrap();
        assert_eq!(client.base_url(), "https://api.nimbus.example/v1");
    }
}
