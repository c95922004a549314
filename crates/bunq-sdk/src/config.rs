//! Client configuration
//!
//! Centralized configuration for the handshake, request headers, retries and
//! session refresh, with defaults matching what the API expects.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{SdkError, SdkResult};

/// Production API base URL
pub const PRODUCTION_URL: &str = "https://api.bunq.com/v1";

/// Sandbox API base URL
pub const SANDBOX_URL: &str = "https://public-api.sandbox.bunq.com/v1";

/// Device description used when none is configured
pub const DEFAULT_DESCRIPTION: &str = "bunq-rs";

/// API environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Sandbox,
    /// Any other base URL (proxies, recorded fixtures)
    Custom(String),
}

impl Environment {
    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        match self {
            Self::Production => PRODUCTION_URL,
            Self::Sandbox => SANDBOX_URL,
            Self::Custom(url) => url.trim_end_matches('/'),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::Sandbox
    }
}

impl FromStr for Environment {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "sandbox" => Ok(Self::Sandbox),
            url if url.starts_with("http://") || url.starts_with("https://") => {
                Ok(Self::Custom(s.trim().to_string()))
            }
            other => Err(SdkError::Config(format!("unknown environment {other:?}"))),
        }
    }
}

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API key used as the device and session secret
    pub api_key: String,
    /// Target environment
    pub environment: Environment,
    /// Device description registered with the server
    pub description: String,
    /// IPs allowed to use the session; empty means any (`*`)
    pub allowed_ips: Vec<String>,
    /// Per-request transport timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// RSA modulus size for the client key pair
    pub key_bits: usize,
    /// Items requested per list page
    pub page_size: u32,
    /// Rate-limit retry configuration
    pub retry: RetryConfig,
    /// Session lifetime configuration
    pub session: SessionConfig,
    /// Fixed request metadata headers
    pub headers: HeaderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(), // Must be set
            environment: Environment::default(),
            description: DEFAULT_DESCRIPTION.to_string(),
            allowed_ips: Vec::new(),
            timeout: Duration::from_secs(30),
            key_bits: bunq_crypto::DEFAULT_KEY_BITS,
            page_size: bunq_types::MAX_PAGE_SIZE,
            retry: RetryConfig::default(),
            session: SessionConfig::default(),
            headers: HeaderConfig::default(),
        }
    }
}

/// Rate-limit retry configuration
///
/// Only HTTP 429 is retried. Delays start at `base_delay` and double per
/// attempt up to `max_delay`; a server `Retry-After` replaces the computed
/// delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Upper bound on the computed delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint;
        }
        let factor = 1u32 << attempt.min(20);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Session lifetime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Refresh when less than this remains before expiry
    #[serde(with = "humantime_serde")]
    pub refresh_margin: Duration,
    /// Lifetime assumed when the server reports none
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_margin: Duration::from_secs(30),
            default_timeout: Duration::from_secs(1800),
        }
    }
}

/// Fixed metadata sent with every request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderConfig {
    pub user_agent: String,
    /// `X-Bunq-Geolocation`: "lng lat altitude radius country"
    pub geolocation: String,
    pub language: String,
    pub region: String,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("bunq-rs/", env!("CARGO_PKG_VERSION")).to_string(),
            geolocation: "0 0 0 0 NL".to_string(),
            language: "en_US".to_string(),
            region: "nl_NL".to_string(),
        }
    }
}

impl Config {
    /// Configuration for an API key in the given environment
    pub fn new(api_key: impl Into<String>, environment: Environment) -> Self {
        Self {
            api_key: api_key.into(),
            environment,
            ..Default::default()
        }
    }

    /// Load configuration from the environment (and `.env` if present)
    ///
    /// Reads `BUNQ_API_KEY`, `BUNQ_ENVIRONMENT`, `BUNQ_DEVICE_DESCRIPTION` and
    /// `BUNQ_ALLOWED_IPS` (comma separated).
    pub fn from_env() -> SdkResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SdkResult<Self> {
        let mut config = Self::default();

        if let Some(api_key) = lookup("BUNQ_API_KEY") {
            config.api_key = api_key;
        }
        if let Some(environment) = lookup("BUNQ_ENVIRONMENT") {
            config.environment = environment.parse()?;
        }
        if let Some(description) = lookup("BUNQ_DEVICE_DESCRIPTION") {
            config.description = description;
        }
        if let Some(ips) = lookup("BUNQ_ALLOWED_IPS") {
            config.allowed_ips = ips
                .split(',')
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(config)
    }

    /// IPs to register, substituting the wildcard for an empty list
    pub fn permitted_ips(&self) -> Vec<String> {
        if self.allowed_ips.is_empty() {
            vec!["*".to_string()]
        } else {
            self.allowed_ips.clone()
        }
    }

    /// Device description, substituting the default for an empty one
    pub fn device_description(&self) -> &str {
        if self.description.trim().is_empty() {
            DEFAULT_DESCRIPTION
        } else {
            &self.description
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.api_key.trim().is_empty() {
            errors.push("API key must be set".to_string());
        }
        if self.key_bits < bunq_crypto::MIN_KEY_BITS {
            errors.push(format!(
                "Key size must be at least {} bits",
                bunq_crypto::MIN_KEY_BITS
            ));
        }
        if self.page_size == 0 || self.page_size > bunq_types::MAX_PAGE_SIZE {
            errors.push(format!(
                "Page size must be between 1 and {}",
                bunq_types::MAX_PAGE_SIZE
            ));
        }
        if self.retry.max_delay < self.retry.base_delay {
            errors.push("Retry max delay must not be below the base delay".to_string());
        }
        if self.session.refresh_margin >= self.session.default_timeout {
            errors.push("Session refresh margin must be shorter than the session timeout".to_string());
        }
        if let Environment::Custom(url) = &self.environment {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(format!("Custom base URL {url:?} must be http(s)"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.session.refresh_margin, Duration::from_secs(30));
        assert_eq!(config.session.default_timeout, Duration::from_secs(1800));
        assert_eq!(config.page_size, 200);
        assert_eq!(config.key_bits, 2048);
    }

    #[test]
    fn test_config_validation_missing_api_key() {
        let errors = Config::default().validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("API key")));
    }

    #[test]
    fn test_config_validation_valid() {
        let config = Config::new("sandbox_key", Environment::Sandbox);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_collects_all_errors() {
        let mut config = Config::new("", Environment::Custom("ftp://x".to_string()));
        config.page_size = 500;
        config.key_bits = 1024;
        assert_eq!(config.validate().unwrap_err().len(), 4);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetryConfig::default();
        let delays: Vec<u64> = (0..7).map(|a| retry.delay_for(a, None).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 32]);
    }

    #[test]
    fn test_retry_after_replaces_backoff() {
        let retry = RetryConfig::default();
        assert_eq!(
            retry.delay_for(3, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("Sandbox".parse::<Environment>().unwrap(), Environment::Sandbox);
        assert_eq!(
            "http://localhost:9000/v1/".parse::<Environment>().unwrap().base_url(),
            "http://localhost:9000/v1"
        );
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("BUNQ_API_KEY", "key-123"),
            ("BUNQ_ENVIRONMENT", "production"),
            ("BUNQ_ALLOWED_IPS", "10.0.0.1, 10.0.0.2,"),
        ]);
        let config = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.api_key, "key-123");
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.permitted_ips(), vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(config.device_description(), DEFAULT_DESCRIPTION);
    }

    #[test]
    fn test_empty_allowed_ips_is_wildcard() {
        assert_eq!(Config::default().permitted_ips(), vec!["*"]);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = Config::new("k", Environment::Sandbox);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"timeout\":\"30s\""));
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.retry.base_delay, Duration::from_secs(1));
    }
}
