use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use jsonwebtoken::DecodingKey;
use tokio::sync::RwLock;

use crate::error::Result;

/// The issuer's RSA public key, kept both as PEM text and parsed for verification
#[derive(Clone)]
pub struct PublicKey {
    pem: Arc<str>,
    decoding_key: Arc<DecodingKey>,
}

impl PublicKey {
    /// Parse a PEM-encoded RSA public key
    pub fn from_pem(pem: &str) -> Result<Self> {
        let decoding_key = DecodingKey::from_rsa_pem(pem.as_bytes())?;

        Ok(Self {
            pem: Arc::from(pem),
            decoding_key: Arc::new(decoding_key),
        })
    }

    pub fn as_pem(&self) -> &str {
        &self.pem
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("pem_len", &self.pem.len())
            .finish()
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.pem == other.pem
    }
}

/// When a cached key stops being served
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyRefreshPolicy {
    /// Keep the key until it is explicitly invalidated
    #[default]
    Never,
    /// Treat the key as missing once it is older than the given duration
    Ttl(Duration),
}

struct CachedKey {
    key: PublicKey,
    fetched_at: Instant,
}

impl CachedKey {
    fn new(key: PublicKey) -> Self {
        Self {
            key,
            fetched_at: Instant::now(),
        }
    }

    fn is_expired(&self, policy: KeyRefreshPolicy) -> bool {
        match policy {
            KeyRefreshPolicy::Never => false,
            KeyRefreshPolicy::Ttl(ttl) => self.fetched_at.elapsed() >= ttl,
        }
    }
}

/// Single-slot, process-wide cache for the issuer public key
pub struct PublicKeyCache {
    slot: RwLock<Option<CachedKey>>,
    policy: KeyRefreshPolicy,
}

impl PublicKeyCache {
    pub fn new(policy: KeyRefreshPolicy) -> Self {
        Self {
            slot: RwLock::new(None),
            policy,
        }
    }

    pub fn policy(&self) -> KeyRefreshPolicy {
        self.policy
    }

    /// The cached key, unless absent or expired under the refresh policy
    pub async fn get(&self) -> Option<PublicKey> {
        let slot = self.slot.read().await;
        let cached = slot.as_ref()?;

        if cached.is_expired(self.policy) {
            return None;
        }

        Some(cached.key.clone())
    }

    pub async fn set(&self, key: PublicKey) {
        let mut slot = self.slot.write().await;
        *slot = Some(CachedKey::new(key));
    }

    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        *slot = None;
    }
}

impl Default for PublicKeyCache {
    fn default() -> Self {
        Self::new(KeyRefreshPolicy::default())
    }
}
