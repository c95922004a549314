//! The bunq client
//!
//! Construction runs the full handshake; afterwards every call goes through
//! the session guard (refreshing when close to expiry), then the signed
//! request executor.

use bunq_crypto::KeyPair;
use bunq_types::{ListOptions, ListResponse};
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::bootstrap::Bootstrapper;
use crate::config::Config;
use crate::error::{SdkError, SdkResult};
use crate::executor::{ApiRequest, ApiResponse, RequestExecutor};
use crate::pagination::paginate;
use crate::session::SessionGuard;
use crate::transport::{ReqwestTransport, Transport};

/// Authenticated bunq API client
///
/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct BunqClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: Arc<Config>,
    executor: Arc<RequestExecutor>,
    bootstrapper: Bootstrapper,
    guard: SessionGuard,
    user_id: u64,
    primary_account_id: u64,
}

/// Builder for [`BunqClient`]
pub struct BunqClientBuilder {
    config: Config,
    transport: Option<Arc<dyn Transport>>,
    keypair: Option<KeyPair>,
}

impl BunqClientBuilder {
    /// Use a custom transport instead of `reqwest`
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Install an existing key pair instead of generating one
    pub fn with_keypair(mut self, keypair: KeyPair) -> Self {
        self.keypair = Some(keypair);
        self
    }

    /// Validate the configuration and run the handshake
    pub async fn connect(self) -> SdkResult<BunqClient> {
        self.config
            .validate()
            .map_err(|errors| SdkError::Config(errors.join("; ")))?;

        let config = Arc::new(self.config);
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(config.timeout)?),
        };
        let executor = Arc::new(RequestExecutor::new(
            transport,
            config.environment.base_url(),
            config.retry.clone(),
            config.headers.clone(),
        ));
        let bootstrapper = Bootstrapper::new(executor.clone(), config.clone());

        tracing::info!(base_url = executor.base_url(), "Connecting to bunq");
        let (keypair, session) = match self.keypair {
            Some(keypair) => {
                let keypair = Arc::new(keypair);
                let session = bootstrapper.bootstrap_with(keypair.clone()).await?;
                (keypair, session)
            }
            None => bootstrapper.bootstrap().await?,
        };

        let user_id = session.user_id;
        let primary_account_id = session.primary_account_id;
        let guard = SessionGuard::new(session, keypair, config.session.refresh_margin);

        Ok(BunqClient {
            inner: Arc::new(ClientInner {
                config,
                executor,
                bootstrapper,
                guard,
                user_id,
                primary_account_id,
            }),
        })
    }
}

impl BunqClient {
    /// Connect with the default `reqwest` transport
    pub async fn connect(config: Config) -> SdkResult<Self> {
        Self::builder(config).connect().await
    }

    pub fn builder(config: Config) -> BunqClientBuilder {
        BunqClientBuilder {
            config,
            transport: None,
            keypair: None,
        }
    }

    /// Execute a session-scoped request
    pub async fn request(&self, request: ApiRequest) -> SdkResult<ApiResponse> {
        self.inner.guard.ensure_active(&self.inner.bootstrapper).await?;
        let credentials = self.inner.guard.snapshot().await;
        self.inner.executor.execute(&request, &credentials).await
    }

    /// Fetch a single object stored under `key`
    pub async fn get<T: DeserializeOwned>(&self, path: &str, key: &str) -> SdkResult<T> {
        let envelope = self.request(ApiRequest::get(path)).await?.envelope()?;
        Ok(envelope.decode_object(key)?)
    }

    /// Fetch one page of a listing
    pub async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        key: &str,
        options: ListOptions,
    ) -> SdkResult<ListResponse<T>> {
        let request = ApiRequest::get(path).with_query(options.to_query());
        let envelope = self.request(request).await?.envelope()?;
        Ok(envelope.into_list(key)?)
    }

    /// Lazily stream every item of a listing, newest first
    pub fn stream<T>(
        &self,
        path: impl Into<String>,
        key: impl Into<String>,
    ) -> impl Stream<Item = SdkResult<T>> + Send + 'static
    where
        T: DeserializeOwned + Send + 'static,
    {
        let client = self.clone();
        let path: Arc<str> = path.into().into();
        let key: Arc<str> = key.into().into();

        paginate(self.inner.config.page_size, move |options| {
            let client = client.clone();
            let path = path.clone();
            let key = key.clone();
            async move { client.list::<T>(&path, &key, options).await }
        })
    }

    /// Create an object, returning its id
    pub async fn create<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> SdkResult<u64> {
        let envelope = self.request(ApiRequest::post(path, body)?).await?.envelope()?;
        Ok(envelope.decode_id()?)
    }

    /// Create an object identified by UUID
    pub async fn create_uuid<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> SdkResult<String> {
        let envelope = self.request(ApiRequest::post(path, body)?).await?.envelope()?;
        Ok(envelope.decode_uuid()?)
    }

    /// Update an object, returning its id
    pub async fn update<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> SdkResult<u64> {
        let envelope = self.request(ApiRequest::put(path, body)?).await?.envelope()?;
        Ok(envelope.decode_id()?)
    }

    pub async fn delete(&self, path: &str) -> SdkResult<()> {
        self.request(ApiRequest::delete(path)).await?;
        Ok(())
    }

    /// Authenticated user id
    pub fn user_id(&self) -> u64 {
        self.inner.user_id
    }

    /// First active monetary account found at bootstrap
    pub fn primary_monetary_account_id(&self) -> u64 {
        self.inner.primary_account_id
    }

    /// `id`, or the primary account when `id` is zero
    pub fn resolve_monetary_account_id(&self, id: u64) -> u64 {
        if id == 0 {
            self.inner.primary_account_id
        } else {
            id
        }
    }

    /// Current session expiry
    pub async fn session_expires_at(&self) -> DateTime<Utc> {
        self.inner.guard.session().await.expires_at
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}
