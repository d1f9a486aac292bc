//! Key fixtures and token builders shared by unit tests.

use jsonwebtoken::Algorithm;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;

pub(crate) const SIGNING_PRIVATE_PEM: &str = include_str!("../tests/fixtures/signing_private.pem");
pub(crate) const SIGNING_PUBLIC_PEM: &str = include_str!("../tests/fixtures/signing_public.pem");
pub(crate) const ROTATED_PRIVATE_PEM: &str = include_str!("../tests/fixtures/rotated_private.pem");

pub(crate) fn sign<T: Serialize>(claims: &T, private_pem: &str) -> String {
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), claims, &key).unwrap()
}

pub(crate) fn user_claims() -> Value {
    json!({
        "sub": "user-1",
        "tenantId": "tenant-1",
        "roles": ["admin"],
        "permissions": ["fe.secure.read.*"],
        "type": "userToken",
        "exp": chrono::Utc::now().timestamp() + 3600
    })
}

/// Swaps the first signature character so the token keeps its shape but no longer verifies
pub(crate) fn tamper_signature(token: &str) -> String {
    let (message, signature) = token.rsplit_once('.').unwrap();
    let mut chars = signature.chars();
    let first = chars.next().unwrap();
    let replacement = if first == 'A' { 'B' } else { 'A' };
    format!("{message}.{replacement}{}", chars.as_str())
}
