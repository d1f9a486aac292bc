//! Credential resolvers.
//!
//! A [`TokenResolver`] recognizes one [`AuthHeaderType`] and turns a credential
//! of that type into a [`NormalizedIdentity`]. Resolvers are registered in a
//! [`ResolverSet`], which is fixed once built and consulted in order: the
//! first resolver whose [`TokenResolver::should_handle`] returns true wins.
//!
//! ## Available Resolvers
//!
//! - [`authorization`]: signed JWTs, verified locally against the issuer key
//! - [`access_token`]: opaque access tokens, validated by the issuer

use std::sync::Arc;

use async_trait::async_trait;

use crate::authenticator::Authenticator;
use crate::claims::AuthHeaderType;
use crate::claims::IdentityClaims;
use crate::claims::NormalizedIdentity;
use crate::claims::ValidateTokenOptions;
use crate::decoder::JwtDecoder;
use crate::error::Error;
use crate::error::Result;
use crate::key_cache::PublicKey;

pub mod access_token;
pub mod authorization;

pub use access_token::AccessTokenResolver;
pub use authorization::AuthorizationJwtResolver;

/// Validates one category of credential
#[async_trait]
pub trait TokenResolver: Send + Sync {
    /// Whether this resolver handles credentials of the declared type. Must not do I/O.
    fn should_handle(&self, declared_type: AuthHeaderType) -> bool;

    /// Validate the credential and resolve it into an identity
    async fn validate_token(
        &self,
        token: &str,
        public_key: &PublicKey,
        options: Option<&ValidateTokenOptions>,
    ) -> Result<NormalizedIdentity>;
}

/// Ordered, immutable set of resolvers
#[derive(Clone)]
pub struct ResolverSet {
    resolvers: Arc<[Arc<dyn TokenResolver>]>,
}

impl ResolverSet {
    pub fn new(resolvers: Vec<Arc<dyn TokenResolver>>) -> Self {
        Self {
            resolvers: resolvers.into(),
        }
    }

    /// JWT resolver first, then the access token resolver
    pub fn standard(decoder: JwtDecoder, authenticator: Arc<dyn Authenticator>) -> Self {
        Self::new(vec![
            Arc::new(AuthorizationJwtResolver::new(decoder)),
            Arc::new(AccessTokenResolver::new(authenticator)),
        ])
    }

    /// The first registered resolver that handles `declared_type`
    pub fn select(&self, declared_type: AuthHeaderType) -> Result<&dyn TokenResolver> {
        self.resolvers
            .iter()
            .find(|resolver| resolver.should_handle(declared_type))
            .map(|resolver| &**resolver)
            .ok_or(Error::NoResolver(declared_type))
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

/// Map resolved claims and apply the caller's constraints
pub(crate) fn into_identity(
    claims: IdentityClaims,
    options: Option<&ValidateTokenOptions>,
) -> Result<NormalizedIdentity> {
    let identity = NormalizedIdentity::try_from(claims)?;

    if let Some(options) = options {
        options.check(&identity)?;
    }

    Ok(identity)
}
