use std::sync::Arc;

use async_trait::async_trait;

use crate::authenticator::Authenticator;
use crate::claims::AuthHeaderType;
use crate::claims::NormalizedIdentity;
use crate::claims::ValidateTokenOptions;
use crate::error::Result;
use crate::key_cache::PublicKey;
use crate::resolvers::into_identity;
use crate::resolvers::TokenResolver;

/// Resolves opaque access tokens through the authenticator's introspection call
///
/// The token is never decoded locally, so the public key goes unused.
pub struct AccessTokenResolver {
    authenticator: Arc<dyn Authenticator>,
}

impl AccessTokenResolver {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }
}

#[async_trait]
impl TokenResolver for AccessTokenResolver {
    fn should_handle(&self, declared_type: AuthHeaderType) -> bool {
        matches!(declared_type, AuthHeaderType::AccessToken)
    }

    async fn validate_token(
        &self,
        token: &str,
        _public_key: &PublicKey,
        options: Option<&ValidateTokenOptions>,
    ) -> Result<NormalizedIdentity> {
        let claims = self.authenticator.introspect_access_token(token).await?;
        into_identity(claims, options)
    }
}
