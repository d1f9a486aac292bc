#![allow(dead_code)]

use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use frontegg_identity::Authenticator;
use frontegg_identity::Error;
use frontegg_identity::IdentityClaims;
use frontegg_identity::PublicKey;
use frontegg_identity::PublicKeySource;
use frontegg_identity::Result;
use frontegg_identity::TokenEntityType;
use jsonwebtoken::Algorithm;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use mockito::ServerGuard;
use serde::Serialize;
use serde_json::json;

// RSA key pairs generated for tests only, DO NOT use in production
pub const SIGNING_PRIVATE_PEM: &str = include_str!("../fixtures/signing_private.pem");
pub const SIGNING_PUBLIC_PEM: &str = include_str!("../fixtures/signing_public.pem");
pub const ROTATED_PRIVATE_PEM: &str = include_str!("../fixtures/rotated_private.pem");
pub const ROTATED_PUBLIC_PEM: &str = include_str!("../fixtures/rotated_public.pem");

pub const VENDOR_CONFIG_PATH: &str = "/identity/resources/configurations/v1";
pub const VENDOR_AUTH_PATH: &str = "/auth/vendor/";

/// Create an RS256 token with the given claims
pub fn create_test_jwt<T: Serialize>(claims: &T, private_pem: &str) -> String {
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("Failed to create encoding key");
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), claims, &key).expect("Failed to encode JWT")
}

/// Same token shape, different first signature character
pub fn tamper_signature(token: &str) -> String {
    let (message, signature) = token.rsplit_once('.').unwrap();
    let mut chars = signature.chars();
    let first = chars.next().unwrap();
    let replacement = if first == 'A' { 'B' } else { 'A' };
    format!("{message}.{replacement}{}", chars.as_str())
}

/// Claims of a user token as the issuer signs them
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestClaims {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub exp: i64,
    pub iat: i64,
}

impl TestClaims {
    /// Create valid claims that expire in 1 hour
    pub fn valid(sub: &str, tenant_id: &str) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: sub.to_string(),
            tenant_id: Some(tenant_id.to_string()),
            roles: vec!["admin".to_string()],
            permissions: vec!["fe.secure.read.*".to_string()],
            entity_type: "userToken".to_string(),
            exp: now + 3600,
            iat: now,
        }
    }

    /// Create expired claims
    pub fn expired(sub: &str, tenant_id: &str) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            exp: now - 3600,
            iat: now - 7200,
            ..Self::valid(sub, tenant_id)
        }
    }
}

/// Key source that fails a set number of times, then serves keys in order
pub struct CountingSource {
    calls: AtomicU32,
    failures_before_success: u32,
    keys: Vec<PublicKey>,
}

impl CountingSource {
    pub fn serving(pem: &str) -> Arc<Self> {
        Self::failing_then_serving(0, &[pem])
    }

    pub fn always_failing() -> Arc<Self> {
        Self::failing_then_serving(u32::MAX, &[])
    }

    pub fn failing_then_serving(failures: u32, pems: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            failures_before_success: failures,
            keys: pems.iter().map(|pem| PublicKey::from_pem(pem).unwrap()).collect(),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PublicKeySource for CountingSource {
    async fn fetch_public_key(&self) -> Result<PublicKey> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if call < self.failures_before_success || self.keys.is_empty() {
            return Err(Error::InvalidConfig(format!("endpoint unavailable (call {})", call + 1)));
        }

        let index = ((call - self.failures_before_success) as usize).min(self.keys.len() - 1);
        Ok(self.keys[index].clone())
    }
}

/// Authenticator that accepts a single opaque access token
pub struct StubAuthenticator {
    pub active_token: String,
    pub introspected: Mutex<Vec<String>>,
}

impl StubAuthenticator {
    pub fn accepting(token: &str) -> Arc<Self> {
        Arc::new(Self {
            active_token: token.to_string(),
            introspected: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Authenticator for StubAuthenticator {
    async fn should_refresh_vendor_token(&self) -> bool {
        false
    }

    async fn refresh_vendor_token(&self) -> Result<()> {
        Ok(())
    }

    async fn vendor_token(&self) -> Option<String> {
        Some("vendor-token".to_string())
    }

    async fn introspect_access_token(&self, access_token: &str) -> Result<IdentityClaims> {
        self.introspected.lock().unwrap().push(access_token.to_string());

        if access_token != self.active_token {
            return Err(Error::InvalidCredential("access token is not active".to_string()));
        }

        Ok(IdentityClaims {
            sub: "access-token-1".to_string(),
            tenant_id: Some("tenant-1".to_string()),
            permissions: vec!["fe.secure.read.*".to_string()],
            entity_type: Some(TokenEntityType::TenantAccessToken),
            ..IdentityClaims::default()
        })
    }
}

/// Mock vendor API serving authentication and the configuration endpoint
pub async fn setup_mock_vendor_server(public_pem: &str) -> ServerGuard {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("POST", VENDOR_AUTH_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"token": "vendor-token", "expiresIn": 3600}).to_string())
        .create_async()
        .await;

    server
        .mock("GET", VENDOR_CONFIG_PATH)
        .match_header("authorization", "Bearer vendor-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"publicKey": public_pem}).to_string())
        .create_async()
        .await;

    server
}
