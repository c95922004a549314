//! Sandbox user provisioning
//!
//! The sandbox hands out throwaway users over an unauthenticated endpoint;
//! the returned API key is then used with [`Config`] like a real one.

use serde::Deserialize;
use std::sync::Arc;

use crate::config::{Config, Environment};
use crate::error::{SdkError, SdkResult};
use crate::executor::{ApiRequest, RequestExecutor};
use crate::session::Credentials;
use crate::transport::{ReqwestTransport, Transport};

#[derive(Deserialize)]
struct ApiKeyPayload {
    api_key: String,
}

/// Create a sandbox user and return its API key
pub async fn create_sandbox_api_key(config: &Config) -> SdkResult<String> {
    let transport = Arc::new(ReqwestTransport::new(config.timeout)?);
    create_sandbox_api_key_with(transport, config).await
}

/// Same as [`create_sandbox_api_key`] over a caller-provided transport
pub async fn create_sandbox_api_key_with(
    transport: Arc<dyn Transport>,
    config: &Config,
) -> SdkResult<String> {
    if config.environment == Environment::Production {
        return Err(SdkError::Config(
            "sandbox users can only be created outside production".to_string(),
        ));
    }

    let executor = RequestExecutor::new(
        transport,
        config.environment.base_url(),
        config.retry.clone(),
        config.headers.clone(),
    );
    let request = ApiRequest::post("sandbox-user-person", &serde_json::json!({}))?;
    let envelope = executor
        .execute(&request, &Credentials::anonymous())
        .await?
        .envelope()?;

    let api_key = envelope
        .find::<ApiKeyPayload>("ApiKey")?
        .map(|payload| payload.api_key)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| SdkError::Bootstrap("no API key in sandbox response".to_string()))?;

    tracing::info!("Sandbox user created");
    Ok(api_key)
}
