//! Signed request execution
//!
//! Every call is serialized once, signed once, and then sent up to
//! `max_retries + 1` times. Only HTTP 429 is retried; the body signature is
//! reused across attempts while the correlation id is fresh per attempt.

use bunq_crypto::CryptoError;
use bunq_types::ResponseEnvelope;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, CONTENT_TYPE, RETRY_AFTER, USER_AGENT};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::{HeaderConfig, RetryConfig};
use crate::error::{classify, ApiError, SdkError, SdkResult};
use crate::session::Credentials;
use crate::transport::{HttpRequest, HttpResponse, Transport};

pub const HEADER_REQUEST_ID: &str = "x-bunq-client-request-id";
pub const HEADER_GEOLOCATION: &str = "x-bunq-geolocation";
pub const HEADER_LANGUAGE: &str = "x-bunq-language";
pub const HEADER_REGION: &str = "x-bunq-region";
pub const HEADER_AUTHENTICATION: &str = "x-bunq-client-authentication";
pub const HEADER_CLIENT_SIGNATURE: &str = "x-bunq-client-signature";
pub const HEADER_SERVER_SIGNATURE: &str = "x-bunq-server-signature";
pub const HEADER_RESPONSE_ID: &str = "x-bunq-client-response-id";

/// A logical API call, before signing
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the environment base URL, e.g. `user/1/monetary-account`
    pub path: String,
    pub query: Vec<(&'static str, String)>,
    /// Raw JSON body; empty for GET and DELETE
    pub body: Vec<u8>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self::without_body(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::without_body(Method::DELETE, path)
    }

    pub fn post<T: Serialize + ?Sized>(path: impl Into<String>, body: &T) -> SdkResult<Self> {
        Self::with_body(Method::POST, path, body)
    }

    pub fn put<T: Serialize + ?Sized>(path: impl Into<String>, body: &T) -> SdkResult<Self> {
        Self::with_body(Method::PUT, path, body)
    }

    /// Append query parameters
    pub fn with_query(mut self, query: Vec<(&'static str, String)>) -> Self {
        self.query.extend(query);
        self
    }

    fn without_body(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: Vec::new(),
        }
    }

    fn with_body<T: Serialize + ?Sized>(
        method: Method,
        path: impl Into<String>,
        body: &T,
    ) -> SdkResult<Self> {
        Ok(Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: serde_json::to_vec(body)?,
        })
    }
}

/// A verified 2xx response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub response_id: Option<String>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Parse the body as a `Response` envelope
    pub fn envelope(&self) -> SdkResult<ResponseEnvelope> {
        Ok(ResponseEnvelope::parse(&self.body)?)
    }
}

/// Builds, signs, sends and verifies API calls
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    base_url: String,
    retry: RetryConfig,
    headers: HeaderConfig,
}

impl RequestExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        retry: RetryConfig,
        headers: HeaderConfig,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
            headers,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execute a call, retrying rate-limited attempts
    pub async fn execute(
        &self,
        request: &ApiRequest,
        credentials: &Credentials,
    ) -> SdkResult<ApiResponse> {
        let url = self.url_for(request)?;
        let signature = match (&credentials.token, &credentials.keypair) {
            (Some(_), Some(keypair)) => Some(bunq_crypto::sign(keypair, &request.body)?),
            _ => None,
        };

        let mut attempt = 0u32;
        loop {
            let http_request = self.build(request, &url, credentials, signature.as_deref())?;
            let request_id = http_request
                .header(HEADER_REQUEST_ID)
                .unwrap_or_default()
                .to_string();

            tracing::debug!(
                method = %request.method,
                path = %request.path,
                request_id = %request_id,
                attempt,
                "Sending request"
            );

            let response = self.transport.send(http_request).await?;
            let status = response.status;

            if status.is_success() {
                tracing::debug!(path = %request.path, status = status.as_u16(), "Request succeeded");
                return self.verify(response, credentials);
            }

            let error = Self::classify(&response);
            if status != StatusCode::TOO_MANY_REQUESTS {
                tracing::debug!(
                    path = %request.path,
                    status = status.as_u16(),
                    response_id = %error.response_id,
                    "Request failed"
                );
                return Err(SdkError::Api(error));
            }

            if attempt >= self.retry.max_retries {
                tracing::warn!(
                    path = %request.path,
                    attempts = attempt + 1,
                    "Rate limit persisted, giving up"
                );
                return Err(SdkError::RateLimited(error));
            }

            let delay = self.retry.delay_for(attempt, retry_after(&response));
            tracing::warn!(
                path = %request.path,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Rate limited, backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn url_for(&self, request: &ApiRequest) -> SdkResult<Url> {
        let raw = format!("{}/{}", self.base_url, request.path.trim_start_matches('/'));
        let mut url = Url::parse(&raw)
            .map_err(|e| SdkError::Config(format!("invalid request URL {raw:?}: {e}")))?;
        if !request.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(request.query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    fn build(
        &self,
        request: &ApiRequest,
        url: &Url,
        credentials: &Credentials,
        signature: Option<&str>,
    ) -> SdkResult<HttpRequest> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, header_value(&self.headers.user_agent)?);
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        insert(&mut headers, HEADER_REQUEST_ID, &Uuid::new_v4().to_string())?;
        insert(&mut headers, HEADER_GEOLOCATION, &self.headers.geolocation)?;
        insert(&mut headers, HEADER_LANGUAGE, &self.headers.language)?;
        insert(&mut headers, HEADER_REGION, &self.headers.region)?;

        if let Some(token) = credentials.token.as_deref().filter(|t| !t.is_empty()) {
            insert(&mut headers, HEADER_AUTHENTICATION, token)?;
        }
        if let Some(signature) = signature {
            insert(&mut headers, HEADER_CLIENT_SIGNATURE, signature)?;
        }

        Ok(HttpRequest {
            method: request.method.clone(),
            url: url.to_string(),
            headers,
            body: request.body.clone(),
        })
    }

    fn verify(&self, response: HttpResponse, credentials: &Credentials) -> SdkResult<ApiResponse> {
        let response_id = response.header(HEADER_RESPONSE_ID).map(String::from);

        if let (Some(server_key), Some(raw)) = (
            credentials.server_public_key.as_deref(),
            response.headers.get(HEADER_SERVER_SIGNATURE),
        ) {
            let checked = raw
                .to_str()
                .map_err(|e| CryptoError::InvalidSignatureEncoding(e.to_string()))
                .and_then(|signature| bunq_crypto::verify(server_key, &response.body, signature));

            if let Err(source) = checked {
                tracing::error!(
                    response_id = response_id.as_deref().unwrap_or_default(),
                    error = %source,
                    "Server signature mismatch"
                );
                return Err(SdkError::ResponseIntegrity {
                    response_id: response_id.unwrap_or_default(),
                    source,
                });
            }
        }

        Ok(ApiResponse {
            status: response.status,
            response_id,
            headers: response.headers,
            body: response.body,
        })
    }

    fn classify(response: &HttpResponse) -> ApiError {
        classify(
            response.status.as_u16(),
            response.header(HEADER_RESPONSE_ID),
            &response.body,
        )
    }
}

/// `Retry-After` in whole seconds
fn retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn header_value(value: &str) -> SdkResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| SdkError::Config(format!("invalid header value {value:?}: {e}")))
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) -> SdkResult<()> {
    headers.insert(HeaderName::from_static(name), header_value(value)?);
    Ok(())
}
