//! # frontegg-identity
//!
//! Validation of bearer credentials issued by Frontegg.
//!
//! Given a credential presented by a caller (a signed JWT or an opaque access
//! token) the [`IdentityValidator`] picks the resolver for its declared type,
//! obtains the issuer's RSA public key and resolves the credential into a
//! [`NormalizedIdentity`] that downstream authorization can rely on.
//!
//! ## Features
//!
//! - RS256-only JWT verification; the audience claim is never checked
//! - Public key fetched from the vendor configuration endpoint, with bounded
//!   retry, and cached until invalidated (or for a configurable TTL)
//! - Opaque access tokens validated through the vendor introspection call
//! - Role, permission and tenant constraints per validation
//! - Claim decoding without identity resolution, with an opt-out of signature
//!   checking for trusted internal callers
//!
//! ## Example
//!
//! ```rust,no_run
//! use frontegg_identity::{AuthHeaderType, IdentityConfig, IdentityValidator, ValidateIdentity};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IdentityConfig::from_env()?;
//!     let validator = IdentityValidator::new(config).await?;
//!
//!     let header = "Bearer eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9...";
//!     let identity = validator.validate(header, AuthHeaderType::Jwt, None).await?;
//!
//!     println!("User: {}", identity.subject);
//!     println!("Tenant: {}", identity.tenant_id);
//!
//!     Ok(())
//! }
//! ```

mod authenticator;
mod claims;
mod config;
mod decoder;
mod error;
mod key_cache;
mod key_provider;
pub mod resolvers;
mod retry;
mod validator;

#[cfg(test)]
mod test_support;

// Re-exports for public API
pub use authenticator::Authenticator;
pub use authenticator::VendorAuthenticator;
pub use claims::AuthHeaderType;
pub use claims::IdentityClaims;
pub use claims::NormalizedIdentity;
pub use claims::TokenEntityType;
pub use claims::ValidateTokenOptions;
pub use config::IdentityConfig;
pub use config::VendorEndpoints;
pub use decoder::JwtDecoder;
pub use error::Error;
pub use error::Result;
pub use key_cache::KeyRefreshPolicy;
pub use key_cache::PublicKey;
pub use key_cache::PublicKeyCache;
pub use key_provider::PublicKeyProvider;
pub use key_provider::PublicKeySource;
pub use key_provider::VendorConfigSource;
pub use resolvers::ResolverSet;
pub use resolvers::TokenResolver;
pub use retry::with_retry;
pub use retry::RetryExhausted;
pub use retry::RetryPolicy;
pub use validator::IdentityValidator;
pub use validator::ValidateIdentity;
