//! Installation handshake
//!
//! Linear, no loops back:
//!
//! ```text
//! generate key pair → POST installation → POST device-server
//!                   → POST session-server → GET user/{id}/monetary-account
//! ```
//!
//! Any failing step aborts; there is no partially bootstrapped state.

use async_trait::async_trait;
use bunq_crypto::{KeyPair, PublicKey};
use bunq_types::ResponseEnvelope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{SdkError, SdkResult};
use crate::executor::{ApiRequest, RequestExecutor};
use crate::session::{Credentials, Session, SessionGrant, SessionOpener};

#[derive(Serialize)]
struct InstallationRequest<'a> {
    client_public_key: &'a str,
}

#[derive(Serialize)]
struct DeviceServerRequest<'a> {
    description: &'a str,
    secret: &'a str,
    permitted_ips: Vec<String>,
}

#[derive(Serialize)]
struct SessionServerRequest<'a> {
    secret: &'a str,
}

#[derive(Deserialize)]
struct TokenPayload {
    token: String,
}

#[derive(Deserialize)]
struct ServerPublicKeyPayload {
    server_public_key: String,
}

#[derive(Deserialize)]
struct UserPayload {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    session_timeout: u64,
}

#[derive(Deserialize)]
struct AccountPayload {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    status: String,
}

/// Runs the handshake and re-opens sessions on refresh
pub struct Bootstrapper {
    executor: Arc<RequestExecutor>,
    config: Arc<Config>,
}

impl Bootstrapper {
    pub fn new(executor: Arc<RequestExecutor>, config: Arc<Config>) -> Self {
        Self { executor, config }
    }

    /// Run the full handshake with a freshly generated key pair
    pub async fn bootstrap(&self) -> SdkResult<(Arc<KeyPair>, Session)> {
        let bits = self.config.key_bits;
        let keypair = tokio::task::spawn_blocking(move || KeyPair::generate_with_bits(bits))
            .await
            .map_err(|e| bunq_crypto::CryptoError::KeyGenerationFailed(e.to_string()))??;

        let keypair = Arc::new(keypair);
        let session = self.bootstrap_with(keypair.clone()).await?;
        Ok((keypair, session))
    }

    /// Run the full handshake with an existing key pair
    pub async fn bootstrap_with(&self, keypair: Arc<KeyPair>) -> SdkResult<Session> {
        let (installation_token, server_public_key) = self
            .install(&keypair)
            .await
            .map_err(|e| step_failed("installation", e))?;

        let installation = Credentials::authenticated(
            installation_token.clone(),
            keypair.clone(),
            server_public_key.clone(),
        );

        self.register_device(&installation)
            .await
            .map_err(|e| step_failed("device-server", e))?;

        let grant = self
            .open_session(&installation)
            .await
            .map_err(|e| step_failed("session-server", e))?;

        let resource = Credentials::authenticated(
            grant.token.clone(),
            keypair.clone(),
            server_public_key.clone(),
        );
        let primary_account_id = self
            .resolve_primary_account(&resource, grant.user_id)
            .await
            .map_err(|e| step_failed("primary account", e))?;

        tracing::info!(
            user_id = grant.user_id,
            primary_account_id,
            expires_at = %grant.expires_at,
            "Bootstrap complete"
        );

        Ok(Session {
            installation_token,
            session_token: grant.token,
            server_public_key,
            user_id: grant.user_id,
            primary_account_id,
            expires_at: grant.expires_at,
        })
    }

    /// Step 1: register our public key, receive a token and the server key
    async fn install(&self, keypair: &Arc<KeyPair>) -> SdkResult<(String, Arc<PublicKey>)> {
        let pem = keypair.public_key().to_pem()?;
        let request = ApiRequest::post("installation", &InstallationRequest { client_public_key: &pem })?;
        let response = self
            .executor
            .execute(&request, &Credentials::installing(keypair.clone()))
            .await?;
        let envelope = response.envelope()?;

        let token = envelope
            .find::<TokenPayload>("Token")?
            .map(|t| t.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SdkError::Bootstrap("no installation token in response".to_string()))?;

        let server_pem = envelope
            .find::<ServerPublicKeyPayload>("ServerPublicKey")?
            .map(|k| k.server_public_key)
            .ok_or_else(|| SdkError::Bootstrap("no server public key in response".to_string()))?;
        let server_public_key = PublicKey::from_pem(&server_pem)?;

        tracing::info!(
            server_key_fingerprint = %server_public_key.fingerprint()?,
            "Installation registered"
        );
        Ok((token, Arc::new(server_public_key)))
    }

    /// Step 2: register this device for the API key
    async fn register_device(&self, installation: &Credentials) -> SdkResult<()> {
        let request = ApiRequest::post(
            "device-server",
            &DeviceServerRequest {
                description: self.config.device_description(),
                secret: &self.config.api_key,
                permitted_ips: self.config.permitted_ips(),
            },
        )?;
        self.executor.execute(&request, installation).await?;

        tracing::info!(description = self.config.device_description(), "Device registered");
        Ok(())
    }

    /// Step 4: first active monetary account with a nonzero id
    async fn resolve_primary_account(&self, session: &Credentials, user_id: u64) -> SdkResult<u64> {
        let request = ApiRequest::get(format!("user/{user_id}/monetary-account"));
        let envelope = self.executor.execute(&request, session).await?.envelope()?;

        primary_account_id(&envelope)
            .ok_or_else(|| SdkError::Bootstrap("no active monetary account found".to_string()))
    }
}

#[async_trait]
impl SessionOpener for Bootstrapper {
    /// Step 3: open a session, also used for refresh
    async fn open_session(&self, installation: &Credentials) -> SdkResult<SessionGrant> {
        let request = ApiRequest::post(
            "session-server",
            &SessionServerRequest {
                secret: &self.config.api_key,
            },
        )?;
        let envelope = self.executor.execute(&request, installation).await?.envelope()?;

        parse_session_grant(&envelope, Utc::now(), self.config.session.default_timeout)
    }
}

/// Extract the session token, user id and expiry from a session response
///
/// The user object arrives under its concrete type key (`UserPerson`,
/// `UserCompany`, `UserApiKey`, ...), so every key other than `Id` and
/// `Token` is tried.
pub fn parse_session_grant(
    envelope: &ResponseEnvelope,
    now: DateTime<Utc>,
    default_timeout: Duration,
) -> SdkResult<SessionGrant> {
    let token = envelope
        .find::<TokenPayload>("Token")?
        .map(|t| t.token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| SdkError::Bootstrap("no session token in response".to_string()))?;

    let user = envelope
        .entries()
        .filter(|(key, _)| *key != "Id" && *key != "Token")
        .filter_map(|(_, value)| UserPayload::deserialize(value).ok())
        .find(|user| user.id > 0)
        .ok_or_else(|| SdkError::Bootstrap("no user id in response".to_string()))?;

    let timeout = match user.session_timeout {
        0 => default_timeout,
        seconds => Duration::from_secs(seconds),
    };
    let expires_at = chrono::Duration::from_std(timeout)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| {
            SdkError::Bootstrap(format!("session timeout {}s out of range", timeout.as_secs()))
        })?;

    Ok(SessionGrant {
        token,
        user_id: user.id,
        expires_at,
    })
}

fn primary_account_id(envelope: &ResponseEnvelope) -> Option<u64> {
    envelope
        .entries()
        .filter_map(|(_, value)| AccountPayload::deserialize(value).ok())
        .find(|account| account.status == "ACTIVE" && account.id > 0)
        .map(|account| account.id)
}

fn step_failed(step: &str, error: SdkError) -> SdkError {
    tracing::error!(step, error = %error, "Bootstrap step failed");
    match error {
        SdkError::Bootstrap(message) => SdkError::Bootstrap(format!("{step}: {message}")),
        other => other,
    }
}
