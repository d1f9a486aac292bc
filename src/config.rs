//! Validator configuration.
//!
//! Built in code with the `with_*` methods, or loaded from `FRONTEGG_*`
//! environment variables. Invalid tunables are rejected when loading rather
//! than replaced by defaults. The API key is redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use reqwest::Client;
use reqwest::Url;

use crate::error::Error;
use crate::error::Result;
use crate::key_cache::KeyRefreshPolicy;
use crate::retry::RetryPolicy;

pub const DEFAULT_API_GATEWAY_URL: &str = "https://api.frontegg.com/";

/// Attempts made to fetch the public key before giving up
pub const KEY_FETCH_ATTEMPTS: u32 = 10;

/// Pause between public key fetch attempts
pub const KEY_FETCH_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Timeout applied to every outbound vendor request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

const AUTHENTICATION_PATH: &str = "auth/vendor/";
const VENDOR_CONFIG_PATH: &str = "identity/resources/configurations/v1";
const INTROSPECTION_PATH: &str = "identity/resources/vendor-only/access-tokens/v1/introspect";

pub const ENV_CLIENT_ID: &str = "FRONTEGG_CLIENT_ID";
pub const ENV_API_KEY: &str = "FRONTEGG_API_KEY";
pub const ENV_API_GATEWAY_URL: &str = "FRONTEGG_API_GATEWAY_URL";
pub const ENV_AUTHENTICATION_SERVICE_URL: &str = "FRONTEGG_AUTHENTICATION_SERVICE_URL";
pub const ENV_JWT_DECODE_RETRY: &str = "FRONTEGG_JWT_DECODE_RETRY";
pub const ENV_JWT_DECODE_RETRY_DELAY_MS: &str = "FRONTEGG_JWT_DECODE_RETRY_DELAY_MS";
pub const ENV_PUBLIC_KEY_TTL_SECONDS: &str = "FRONTEGG_PUBLIC_KEY_TTL_SECONDS";
pub const ENV_REFETCH_KEY_ON_SIGNATURE_FAILURE: &str = "FRONTEGG_REFETCH_KEY_ON_SIGNATURE_FAILURE";

/// Configuration for the identity validator
#[derive(Clone)]
pub struct IdentityConfig {
    /// Vendor client id used to authenticate against the vendor API
    pub(crate) client_id: String,
    /// Vendor API key, sent as the client secret
    pub(crate) api_key: String,
    pub(crate) api_gateway_url: String,
    /// Overrides `<gateway>/auth/vendor/`
    pub(crate) authentication_url: Option<String>,
    /// Overrides the default access token introspection endpoint
    pub(crate) introspection_url: Option<String>,
    /// Retry applied to each JWT decode (default: one attempt, no delay)
    pub(crate) decode_retry: RetryPolicy,
    /// Retry applied to public key fetching (default: 10 attempts, 1 second apart)
    pub(crate) key_fetch_retry: RetryPolicy,
    pub(crate) request_timeout: Duration,
    pub(crate) key_refresh: KeyRefreshPolicy,
    /// Refetch the key and retry once when a token fails signature verification
    pub(crate) refetch_key_on_signature_failure: bool,
    /// Optional custom HTTP client; a default one is created otherwise
    pub(crate) http_client: Option<Client>,
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("client_id", &self.client_id)
            .field("api_key", &"[REDACTED]")
            .field("api_gateway_url", &self.api_gateway_url)
            .field("authentication_url", &self.authentication_url)
            .field("introspection_url", &self.introspection_url)
            .field("decode_retry", &self.decode_retry)
            .field("key_fetch_retry", &self.key_fetch_retry)
            .field("request_timeout", &self.request_timeout)
            .field("key_refresh", &self.key_refresh)
            .field(
                "refetch_key_on_signature_failure",
                &self.refetch_key_on_signature_failure,
            )
            .finish()
    }
}

impl IdentityConfig {
    /// Create a configuration with the default gateway and retry policies
    pub fn new(client_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            api_key: api_key.into(),
            api_gateway_url: DEFAULT_API_GATEWAY_URL.to_string(),
            authentication_url: None,
            introspection_url: None,
            decode_retry: RetryPolicy::once(),
            key_fetch_retry: RetryPolicy::new(KEY_FETCH_ATTEMPTS, KEY_FETCH_RETRY_DELAY),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            key_refresh: KeyRefreshPolicy::Never,
            refetch_key_on_signature_failure: false,
            http_client: None,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a map of variables
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let client_id = required(vars, ENV_CLIENT_ID)?;
        let api_key = required(vars, ENV_API_KEY)?;
        let mut config = Self::new(client_id, api_key);

        if let Some(url) = vars.get(ENV_API_GATEWAY_URL) {
            config = config.with_api_gateway_url(url);
        }

        if let Some(url) = vars.get(ENV_AUTHENTICATION_SERVICE_URL) {
            config = config.with_authentication_url(url);
        }

        if let Some(value) = vars.get(ENV_JWT_DECODE_RETRY) {
            let attempts: u32 = value.trim().parse().map_err(|e| {
                Error::InvalidConfig(format!(
                    "{ENV_JWT_DECODE_RETRY} must be a positive integer, got '{value}': {e}"
                ))
            })?;
            if attempts == 0 {
                return Err(Error::InvalidConfig(format!(
                    "{ENV_JWT_DECODE_RETRY} must be at least 1"
                )));
            }
            config.decode_retry = RetryPolicy::new(attempts, config.decode_retry.delay());
        }

        if let Some(value) = vars.get(ENV_JWT_DECODE_RETRY_DELAY_MS) {
            let millis: f64 = value.trim().parse().map_err(|e| {
                Error::InvalidConfig(format!(
                    "{ENV_JWT_DECODE_RETRY_DELAY_MS} must be a number of milliseconds, got '{value}': {e}"
                ))
            })?;
            if !millis.is_finite() || millis < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{ENV_JWT_DECODE_RETRY_DELAY_MS} must be a non-negative number, got {millis}"
                )));
            }
            let delay = Duration::try_from_secs_f64(millis / 1000.0).map_err(|e| {
                Error::InvalidConfig(format!(
                    "{ENV_JWT_DECODE_RETRY_DELAY_MS} is out of range, got {millis}: {e}"
                ))
            })?;
            config.decode_retry = RetryPolicy::new(config.decode_retry.max_attempts(), delay);
        }

        if let Some(value) = vars.get(ENV_PUBLIC_KEY_TTL_SECONDS) {
            let seconds: u64 = value.trim().parse().map_err(|e| {
                Error::InvalidConfig(format!(
                    "{ENV_PUBLIC_KEY_TTL_SECONDS} must be a positive integer, got '{value}': {e}"
                ))
            })?;
            if seconds == 0 {
                return Err(Error::InvalidConfig(format!(
                    "{ENV_PUBLIC_KEY_TTL_SECONDS} must be greater than 0"
                )));
            }
            config.key_refresh = KeyRefreshPolicy::Ttl(Duration::from_secs(seconds));
        }

        if let Some(value) = vars.get(ENV_REFETCH_KEY_ON_SIGNATURE_FAILURE) {
            config.refetch_key_on_signature_failure = value.trim().parse().map_err(|e| {
                Error::InvalidConfig(format!(
                    "{ENV_REFETCH_KEY_ON_SIGNATURE_FAILURE} must be 'true' or 'false', got '{value}': {e}"
                ))
            })?;
        }

        VendorEndpoints::resolve(&config)?;

        Ok(config)
    }

    pub fn with_api_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.api_gateway_url = url.into();
        self
    }

    pub fn with_authentication_url(mut self, url: impl Into<String>) -> Self {
        self.authentication_url = Some(url.into());
        self
    }

    pub fn with_introspection_url(mut self, url: impl Into<String>) -> Self {
        self.introspection_url = Some(url.into());
        self
    }

    pub fn with_decode_retry(mut self, policy: RetryPolicy) -> Self {
        self.decode_retry = policy;
        self
    }

    pub fn with_key_fetch_retry(mut self, policy: RetryPolicy) -> Self {
        self.key_fetch_retry = policy;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_key_refresh_policy(mut self, policy: KeyRefreshPolicy) -> Self {
        self.key_refresh = policy;
        self
    }

    pub fn with_refetch_key_on_signature_failure(mut self, enabled: bool) -> Self {
        self.refetch_key_on_signature_failure = enabled;
        self
    }

    /// Set a custom HTTP client
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn decode_retry(&self) -> RetryPolicy {
        self.decode_retry
    }

    pub fn key_fetch_retry(&self) -> RetryPolicy {
        self.key_fetch_retry
    }

    pub fn key_refresh_policy(&self) -> KeyRefreshPolicy {
        self.key_refresh
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String> {
    vars.get(name)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| Error::InvalidConfig(format!("Missing required environment variable: {name}")))
}

/// Absolute URLs of the vendor endpoints the validator talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorEndpoints {
    pub authentication: Url,
    pub vendor_config: Url,
    pub introspection: Url,
}

impl VendorEndpoints {
    pub fn resolve(config: &IdentityConfig) -> Result<Self> {
        let gateway = parse_url(&config.api_gateway_url)?;
        let gateway = with_trailing_slash(gateway);

        let authentication = match &config.authentication_url {
            Some(url) => parse_url(url)?,
            None => join(&gateway, AUTHENTICATION_PATH)?,
        };

        let introspection = match &config.introspection_url {
            Some(url) => parse_url(url)?,
            None => join(&gateway, INTROSPECTION_PATH)?,
        };

        Ok(Self {
            authentication,
            vendor_config: join(&gateway, VENDOR_CONFIG_PATH)?,
            introspection,
        })
    }
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| Error::InvalidConfig(format!("Invalid URL '{url}': {e}")))
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| Error::InvalidConfig(format!("Cannot join '{path}' onto '{base}': {e}")))
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (ENV_CLIENT_ID.to_string(), "client-id".to_string()),
            (ENV_API_KEY.to_string(), "api-key".to_string()),
        ])
    }

    fn with_var(name: &str, value: &str) -> HashMap<String, String> {
        let mut vars = base_vars();
        vars.insert(name.to_string(), value.to_string());
        vars
    }

    #[test]
    fn defaults_when_only_credentials_are_set() {
        let config = IdentityConfig::from_vars(&base_vars()).unwrap();

        assert_eq!(config.decode_retry(), RetryPolicy::new(1, Duration::ZERO));
        assert_eq!(
            config.key_fetch_retry(),
            RetryPolicy::new(10, Duration::from_secs(1))
        );
        assert_eq!(config.key_refresh_policy(), KeyRefreshPolicy::Never);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert!(!config.refetch_key_on_signature_failure);
    }

    #[test]
    fn decode_retry_tunables_are_parsed() {
        let mut vars = with_var(ENV_JWT_DECODE_RETRY, "3");
        vars.insert(ENV_JWT_DECODE_RETRY_DELAY_MS.to_string(), "12.5".to_string());

        let config = IdentityConfig::from_vars(&vars).unwrap();
        assert_eq!(config.decode_retry().max_attempts(), 3);
        assert_eq!(config.decode_retry().delay().as_micros(), 12_500);
    }

    #[test]
    fn invalid_tunables_fail_fast() {
        for (name, value) in [
            (ENV_JWT_DECODE_RETRY, "abc"),
            (ENV_JWT_DECODE_RETRY, "0"),
            (ENV_JWT_DECODE_RETRY, "-1"),
            (ENV_JWT_DECODE_RETRY_DELAY_MS, "soon"),
            (ENV_JWT_DECODE_RETRY_DELAY_MS, "-5"),
            (ENV_JWT_DECODE_RETRY_DELAY_MS, "NaN"),
            (ENV_JWT_DECODE_RETRY_DELAY_MS, "1e30"),
            (ENV_PUBLIC_KEY_TTL_SECONDS, "0"),
            (ENV_REFETCH_KEY_ON_SIGNATURE_FAILURE, "yes"),
            (ENV_API_GATEWAY_URL, "not a url"),
        ] {
            let result = IdentityConfig::from_vars(&with_var(name, value));
            assert!(
                matches!(result, Err(Error::InvalidConfig(_))),
                "{name}={value} should be rejected"
            );
        }
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let mut vars = base_vars();
        vars.remove(ENV_API_KEY);
        assert!(matches!(
            IdentityConfig::from_vars(&vars),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn key_ttl_and_refetch_flag_are_parsed() {
        let mut vars = with_var(ENV_PUBLIC_KEY_TTL_SECONDS, "600");
        vars.insert(ENV_REFETCH_KEY_ON_SIGNATURE_FAILURE.to_string(), "true".to_string());

        let config = IdentityConfig::from_vars(&vars).unwrap();
        assert_eq!(
            config.key_refresh_policy(),
            KeyRefreshPolicy::Ttl(Duration::from_secs(600))
        );
        assert!(config.refetch_key_on_signature_failure);
    }

    #[test]
    fn endpoints_are_joined_onto_the_gateway() {
        let config = IdentityConfig::new("id", "key").with_api_gateway_url("http://localhost:9000/api");
        let endpoints = VendorEndpoints::resolve(&config).unwrap();

        assert_eq!(
            endpoints.vendor_config.as_str(),
            "http://localhost:9000/api/identity/resources/configurations/v1"
        );
        assert_eq!(
            endpoints.authentication.as_str(),
            "http://localhost:9000/api/auth/vendor/"
        );
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = IdentityConfig::new("client-id", "super-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
