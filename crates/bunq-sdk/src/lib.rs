//! bunq SDK - Authenticated session core for the bunq API
//!
//! The API does not use bearer tokens. A client proves its identity with an
//! RSA key pair registered during a handshake, signs every request body, and
//! checks the server's signature on every response.
//!
//! # Quick Start
//!
//! ```ignore
//! use bunq_sdk::{BunqClient, Config, Environment};
//! use futures::TryStreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), bunq_sdk::SdkError> {
//!     // Installation, device registration, session and primary account
//!     let client = BunqClient::connect(Config::new("api-key", Environment::Sandbox)).await?;
//!
//!     // Every page of payments, fetched lazily
//!     let path = format!(
//!         "user/{}/monetary-account/{}/payment",
//!         client.user_id(),
//!         client.primary_monetary_account_id()
//!     );
//!     let payments: Vec<serde_json::Value> = client.stream(path, "Payment").try_collect().await?;
//!     println!("{} payments", payments.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Guarantees
//!
//! - **Single-flight refresh**: concurrent callers near expiry trigger one
//!   session refresh, not one each
//! - **Verified responses**: a server signature mismatch is always an error
//! - **Rate limits**: HTTP 429 is retried with exponential backoff (1s, 2s,
//!   4s, ...) honoring `Retry-After`; nothing else is retried
//! - **Lazy pagination**: pages are requested only as items are consumed

pub mod bootstrap;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod pagination;
pub mod sandbox;
pub mod session;
pub mod transport;

pub use bootstrap::Bootstrapper;
pub use client::{BunqClient, BunqClientBuilder};
pub use config::{Config, Environment, HeaderConfig, RetryConfig, SessionConfig};
pub use error::{classify, ApiError, ApiErrorKind, SdkError, SdkResult};
pub use executor::{ApiRequest, ApiResponse, RequestExecutor};
pub use pagination::paginate;
pub use sandbox::{create_sandbox_api_key, create_sandbox_api_key_with};
pub use session::{Credentials, Session, SessionGrant, SessionGuard, SessionOpener};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

pub use bunq_crypto::{CryptoError, KeyPair, PublicKey};
pub use bunq_types::*;
