use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::Url;
use serde::Deserialize;

use crate::authenticator::Authenticator;
use crate::config::KEY_FETCH_ATTEMPTS;
use crate::config::KEY_FETCH_RETRY_DELAY;
use crate::error::vendor_config_error;
use crate::error::Error;
use crate::error::Result;
use crate::key_cache::KeyRefreshPolicy;
use crate::key_cache::PublicKey;
use crate::key_cache::PublicKeyCache;
use crate::retry::with_retry;
use crate::retry::RetryPolicy;

/// Where the issuer public key comes from. One call is one fetch attempt.
#[async_trait]
pub trait PublicKeySource: Send + Sync {
    async fn fetch_public_key(&self) -> Result<PublicKey>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VendorConfigResponse {
    public_key: Option<String>,
}

/// Reads the public key from the vendor configuration endpoint
pub struct VendorConfigSource {
    client: Client,
    authenticator: Arc<dyn Authenticator>,
    url: Url,
    timeout: Duration,
}

impl VendorConfigSource {
    pub fn new(
        client: Client,
        authenticator: Arc<dyn Authenticator>,
        url: Url,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            authenticator,
            url,
            timeout,
        }
    }
}

#[async_trait]
impl PublicKeySource for VendorConfigSource {
    async fn fetch_public_key(&self) -> Result<PublicKey> {
        let vendor_token = self.authenticator.ensure_vendor_token().await?;

        let VendorConfigResponse { public_key } = self
            .client
            .get(self.url.clone())
            .timeout(self.timeout)
            .bearer_auth(vendor_token)
            .send()
            .await
            .map_err(vendor_config_error)?
            .error_for_status()
            .map_err(vendor_config_error)?
            .json()
            .await
            .map_err(vendor_config_error)?;

        let pem = public_key.ok_or(Error::MissingPublicKey)?;
        PublicKey::from_pem(&pem)
    }
}

/// Serves the issuer public key from cache, fetching it with bounded retry on a miss
pub struct PublicKeyProvider {
    cache: PublicKeyCache,
    source: Arc<dyn PublicKeySource>,
    retry: RetryPolicy,
}

impl PublicKeyProvider {
    /// A provider with an empty cache that never expires and the default fetch retry
    pub fn new(source: Arc<dyn PublicKeySource>) -> Self {
        Self {
            cache: PublicKeyCache::default(),
            source,
            retry: RetryPolicy::new(KEY_FETCH_ATTEMPTS, KEY_FETCH_RETRY_DELAY),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the cache with an empty one using the given policy
    pub fn with_refresh_policy(mut self, policy: KeyRefreshPolicy) -> Self {
        self.cache = PublicKeyCache::new(policy);
        self
    }

    pub fn cache(&self) -> &PublicKeyCache {
        &self.cache
    }

    /// The cached key, or a freshly fetched one when the cache is empty or expired
    pub async fn get_public_key(&self) -> Result<PublicKey> {
        if let Some(key) = self.cache.get().await {
            return Ok(key);
        }

        tracing::info!(target: "identity.key_provider", "public key not cached, fetching");
        self.fetch_and_store().await
    }

    /// Drop the cached key so the next lookup fetches again
    pub async fn invalidate(&self) {
        tracing::info!(target: "identity.key_provider", "public key invalidated");
        self.cache.invalidate().await;
    }

    /// Fetch a new key right away. The cached key is only replaced when the fetch succeeds.
    pub async fn refresh(&self) -> Result<PublicKey> {
        tracing::info!(target: "identity.key_provider", "refreshing public key");
        self.fetch_and_store().await
    }

    #[tracing::instrument(skip(self), fields(max_attempts = self.retry.max_attempts()))]
    async fn fetch_and_store(&self) -> Result<PublicKey> {
        // No cache lock is held here; the retry sleeps must not block readers
        let key = with_retry(&self.retry, "fetch public key", || {
            self.source.fetch_public_key()
        })
        .await
        .map_err(|exhausted| {
            tracing::error!(
                target: "identity.key_provider",
                attempts = exhausted.attempts,
                error = %exhausted.last_error,
                "failed to get public key in all retries"
            );
            Error::KeyFetch {
                attempts: exhausted.attempts,
                reason: exhausted.last_error.to_string(),
            }
        })?;

        self.cache.set(key.clone()).await;
        Ok(key)
    }
}
