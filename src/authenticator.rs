use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::Url;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::claims::IdentityClaims;
use crate::config::IdentityConfig;
use crate::config::VendorEndpoints;
use crate::error::introspection_error;
use crate::error::vendor_auth_error;
use crate::error::Error;
use crate::error::Result;

/// Share of the vendor token lifetime after which it is refreshed
const VENDOR_TOKEN_REFRESH_RATIO: f64 = 0.8;

/// Credentials and remote calls owned by the vendor integration
///
/// The validator needs two things from it: a valid vendor token to call the
/// configuration endpoint with, and introspection of opaque access tokens.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Whether the vendor token is missing or close to expiry
    async fn should_refresh_vendor_token(&self) -> bool;

    /// Obtain a fresh vendor token
    async fn refresh_vendor_token(&self) -> Result<()>;

    /// The current vendor token, if one was obtained
    async fn vendor_token(&self) -> Option<String>;

    /// Validate an opaque access token with its issuer and return its claims
    async fn introspect_access_token(&self, access_token: &str) -> Result<IdentityClaims>;

    /// A vendor token that is valid now, refreshing it first when needed
    async fn ensure_vendor_token(&self) -> Result<String> {
        if self.should_refresh_vendor_token().await {
            self.refresh_vendor_token().await?;
        }

        self.vendor_token()
            .await
            .ok_or_else(|| Error::VendorAuthentication("No vendor token available".to_string()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VendorAuthRequest<'a> {
    client_id: &'a str,
    secret: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VendorAuthResponse {
    token: String,
    /// Lifetime in seconds
    expires_in: u64,
}

#[derive(Debug, Serialize)]
struct IntrospectionRequest<'a> {
    token: &'a str,
}

struct VendorToken {
    value: String,
    refresh_at: Instant,
}

/// [`Authenticator`] backed by the vendor REST API
pub struct VendorAuthenticator {
    client: Client,
    client_id: String,
    api_key: String,
    authentication_url: Url,
    introspection_url: Url,
    request_timeout: Duration,
    token: RwLock<Option<VendorToken>>,
}

impl VendorAuthenticator {
    pub fn new(config: &IdentityConfig, endpoints: &VendorEndpoints, client: Client) -> Self {
        Self {
            client,
            client_id: config.client_id.clone(),
            api_key: config.api_key.clone(),
            authentication_url: endpoints.authentication.clone(),
            introspection_url: endpoints.introspection.clone(),
            request_timeout: config.request_timeout,
            token: RwLock::new(None),
        }
    }
}

#[async_trait]
impl Authenticator for VendorAuthenticator {
    async fn should_refresh_vendor_token(&self) -> bool {
        match self.token.read().await.as_ref() {
            Some(token) => Instant::now() >= token.refresh_at,
            None => true,
        }
    }

    #[tracing::instrument(skip(self))]
    async fn refresh_vendor_token(&self) -> Result<()> {
        tracing::debug!(target: "identity.authenticator", "authenticating vendor");

        let VendorAuthResponse { token, expires_in } = self
            .client
            .post(self.authentication_url.clone())
            .timeout(self.request_timeout)
            .json(&VendorAuthRequest {
                client_id: &self.client_id,
                secret: &self.api_key,
            })
            .send()
            .await
            .map_err(vendor_auth_error)?
            .error_for_status()
            .map_err(vendor_auth_error)?
            .json()
            .await
            .map_err(vendor_auth_error)?;

        *self.token.write().await = Some(VendorToken {
            value: token,
            refresh_at: refresh_deadline(Instant::now(), expires_in),
        });

        tracing::info!(target: "identity.authenticator", expires_in, "vendor authenticated");
        Ok(())
    }

    async fn vendor_token(&self) -> Option<String> {
        self.token.read().await.as_ref().map(|t| t.value.clone())
    }

    #[tracing::instrument(skip_all)]
    async fn introspect_access_token(&self, access_token: &str) -> Result<IdentityClaims> {
        let vendor_token = self.ensure_vendor_token().await?;

        let claims: IdentityClaims = self
            .client
            .post(self.introspection_url.clone())
            .timeout(self.request_timeout)
            .bearer_auth(vendor_token)
            .json(&IntrospectionRequest {
                token: access_token,
            })
            .send()
            .await
            .map_err(introspection_error)?
            .error_for_status()
            .map_err(introspection_error)?
            .json()
            .await
            .map_err(introspection_error)?;

        Ok(claims)
    }
}

/// When a token issued at `issued_at` should be refreshed. A lifetime too large
/// to represent makes it due immediately, so the next call authenticates again.
fn refresh_deadline(issued_at: Instant, expires_in: u64) -> Instant {
    Duration::try_from_secs_f64(expires_in as f64 * VENDOR_TOKEN_REFRESH_RATIO)
        .ok()
        .and_then(|lifetime| issued_at.checked_add(lifetime))
        .unwrap_or(issued_at)
}
