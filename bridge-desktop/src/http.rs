//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{
        HttpClient, HttpMethod, HttpRequest, HttpResponse, RequestMode, ResponseType, RetryPolicy,
    },
};
use bytes::Bytes;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

const ALLOW_ORIGIN: &str = "access-control-allow-origin";

/// `raw` without query, fragment or credentials.
fn loggable_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            let _ = url.set_username("");
            let _ = url.set_password(None);
            url.to_string()
        }
        Err(_) => raw.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

/// Reqwest-based HTTP client implementation
///
/// Provides HTTP operations with:
/// - Connection pooling via reqwest
/// - Retry with exponential backoff on transport failures
/// - Response origin classification against the application origin
///
/// Any response that arrives is returned as-is, whatever its status. Only
/// transport failures (connect, DNS, TLS, timeout) become
/// [`BridgeError::Network`].
pub struct ReqwestHttpClient {
    client: Client,
    origin: Option<Url>,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration and no origin.
    ///
    /// Every response is classified as [`ResponseType::Basic`].
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a client that classifies responses relative to `origin`.
    pub fn for_origin(origin: &str) -> Result<Self> {
        let origin = Url::parse(origin)
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid origin {origin}: {e}")))?;
        Ok(Self {
            origin: Some(origin),
            ..Self::new()
        })
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("offline-shell/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client configuration");
                Client::new()
            });

        Self {
            client,
            origin: None,
        }
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            origin: None,
        }
    }

    /// Set the origin responses are classified against.
    pub fn with_origin(mut self, origin: Url) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Convert bridge HttpMethod to reqwest Method
    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }

    /// Build reqwest request from bridge request
    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    /// Decide the response type of a response served from `response_url`.
    ///
    /// Cross-origin responses without an `Access-Control-Allow-Origin` grant
    /// are rejected in `cors` mode and made opaque in `no-cors` mode.
    fn classify(
        &self,
        response_url: &Url,
        mode: RequestMode,
        headers: &HashMap<String, String>,
    ) -> Result<ResponseType> {
        let Some(origin) = &self.origin else {
            return Ok(ResponseType::Basic);
        };
        if mode == RequestMode::Navigate || response_url.origin() == origin.origin() {
            return Ok(ResponseType::Basic);
        }
        if mode == RequestMode::NoCors {
            return Ok(ResponseType::Opaque);
        }

        let serialized = origin.origin().ascii_serialization();
        match headers.get(ALLOW_ORIGIN).map(String::as_str) {
            Some("*") => Ok(ResponseType::Cors),
            Some(allowed) if allowed == serialized => Ok(ResponseType::Cors),
            _ => Err(BridgeError::Network(format!(
                "Cross-origin response from {} not readable by {}",
                response_url.origin().ascii_serialization(),
                serialized
            ))),
        }
    }

    async fn read_response(
        &self,
        request: &HttpRequest,
        response: reqwest::Response,
    ) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let response_type = self.classify(&final_url, request.mode, &headers)?;
        if response_type == ResponseType::Opaque {
            return Ok(HttpResponse {
                status: 0,
                headers: HashMap::new(),
                body: Bytes::new(),
                response_type,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| BridgeError::Network(format!("Failed to read body: {e}")))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
            response_type,
        })
    }

    /// Execute request with retry logic
    async fn execute_with_retry_internal(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < max_attempts {
            debug!(
                attempt = attempt + 1,
                max_attempts,
                method = %request.method,
                url = %loggable_url(&request.url),
                "Executing HTTP request"
            );

            match self.build_request(&request).send().await {
                Ok(response) => return self.read_response(&request, response).await,
                Err(e) => {
                    let e = e.without_url();
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        "HTTP request failed"
                    );

                    last_error = Some(if e.is_timeout() {
                        BridgeError::Network("Request timed out".to_string())
                    } else if e.is_connect() {
                        BridgeError::Network(format!("Connection failed: {e}"))
                    } else if e.is_builder() {
                        // Malformed request; retrying will not help.
                        return Err(BridgeError::OperationFailed(e.to_string()));
                    } else {
                        BridgeError::Network(e.to_string())
                    });
                }
            }

            attempt += 1;

            if attempt < max_attempts {
                let delay = policy.delay_for(attempt);

                debug!(delay_ms = delay.as_millis(), "Retrying after delay");
                sleep(delay).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| BridgeError::Network("All retry attempts exhausted".to_string())))
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_retry_internal(request, RetryPolicy::no_retry())
            .await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        self.execute_with_retry_internal(request, policy).await
    }
}
