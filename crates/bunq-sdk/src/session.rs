//! Session state and the guard that owns it
//!
//! The [`Session`] is the only mutable state shared between concurrent
//! callers. It lives behind a single `RwLock` inside [`SessionGuard`]:
//! credential snapshots take the shared lock, refresh takes the exclusive
//! lock, so at most one re-authentication is ever in flight.

use async_trait::async_trait;
use bunq_crypto::{KeyPair, PublicKey};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::SdkResult;

/// Authenticated session material
#[derive(Debug, Clone)]
pub struct Session {
    /// Proves the key pair is registered; used only for device/session calls
    pub installation_token: String,
    /// Authorizes resource calls; refreshed before expiry
    pub session_token: String,
    pub server_public_key: Arc<PublicKey>,
    pub user_id: u64,
    pub primary_account_id: u64,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Time left before expiry, zero once expired
    pub fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether less than `margin` remains
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.remaining() < margin
    }
}

/// Result of opening a session on the server
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub token: String,
    pub user_id: u64,
    pub expires_at: DateTime<Utc>,
}

/// Credentials for one outbound request
///
/// A request is signed only when both a token and a key pair are present;
/// the response is verified only when a server key is present.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub token: Option<String>,
    pub keypair: Option<Arc<KeyPair>>,
    pub server_public_key: Option<Arc<PublicKey>>,
}

impl Credentials {
    /// No token, no signing, no verification
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Unauthenticated, but holding the key pair being installed
    pub fn installing(keypair: Arc<KeyPair>) -> Self {
        Self {
            keypair: Some(keypair),
            ..Self::default()
        }
    }

    /// Authenticated with `token`, signing with `keypair`
    pub fn authenticated(
        token: impl Into<String>,
        keypair: Arc<KeyPair>,
        server_public_key: Arc<PublicKey>,
    ) -> Self {
        Self {
            token: Some(token.into()),
            keypair: Some(keypair),
            server_public_key: Some(server_public_key),
        }
    }
}

/// Opens a new session with installation credentials
///
/// Implemented by the bootstrapper; the guard calls it to refresh.
#[async_trait]
pub trait SessionOpener: Send + Sync {
    async fn open_session(&self, installation: &Credentials) -> SdkResult<SessionGrant>;
}

/// Owns the session for the lifetime of a client
pub struct SessionGuard {
    session: RwLock<Session>,
    keypair: Arc<KeyPair>,
    refresh_margin: Duration,
}

impl SessionGuard {
    pub fn new(session: Session, keypair: Arc<KeyPair>, refresh_margin: Duration) -> Self {
        Self {
            session: RwLock::new(session),
            keypair,
            refresh_margin,
        }
    }

    /// Session-token credentials for a resource call
    pub async fn snapshot(&self) -> Credentials {
        let session = self.session.read().await;
        Credentials::authenticated(
            session.session_token.clone(),
            self.keypair.clone(),
            session.server_public_key.clone(),
        )
    }

    /// Installation-token credentials for device/session calls
    pub async fn installation_credentials(&self) -> Credentials {
        let session = self.session.read().await;
        self.installation_credentials_for(&session)
    }

    /// Copy of the current session
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    /// Refresh the session if it expires within the margin
    ///
    /// Callers that find the session expiring queue on the exclusive lock;
    /// the first one refreshes and the rest observe its result. A failed
    /// refresh leaves the previous session in place.
    pub async fn ensure_active(&self, opener: &dyn SessionOpener) -> SdkResult<()> {
        if !self.session.read().await.expires_within(self.refresh_margin) {
            return Ok(());
        }

        let mut session = self.session.write().await;
        if !session.expires_within(self.refresh_margin) {
            tracing::debug!(user_id = session.user_id, "Session already refreshed");
            return Ok(());
        }

        tracing::info!(
            user_id = session.user_id,
            expires_at = %session.expires_at,
            "Session expiring, refreshing"
        );

        let installation = self.installation_credentials_for(&session);
        let grant = opener.open_session(&installation).await.map_err(|e| {
            tracing::warn!(user_id = session.user_id, error = %e, "Session refresh failed");
            e
        })?;

        session.session_token = grant.token;
        session.expires_at = grant.expires_at;

        tracing::info!(
            user_id = session.user_id,
            expires_at = %session.expires_at,
            "Session refreshed"
        );
        Ok(())
    }

    fn installation_credentials_for(&self, session: &Session) -> Credentials {
        Credentials::authenticated(
            session.installation_token.clone(),
            self.keypair.clone(),
            session.server_public_key.clone(),
        )
    }
}
