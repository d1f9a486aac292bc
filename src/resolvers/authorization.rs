use async_trait::async_trait;

use crate::claims::AuthHeaderType;
use crate::claims::IdentityClaims;
use crate::claims::NormalizedIdentity;
use crate::claims::ValidateTokenOptions;
use crate::decoder::JwtDecoder;
use crate::error::Result;
use crate::key_cache::PublicKey;
use crate::resolvers::into_identity;
use crate::resolvers::TokenResolver;

/// Resolves issuer-signed JWTs by verifying them locally with the cached public key
#[derive(Debug, Clone, Default)]
pub struct AuthorizationJwtResolver {
    decoder: JwtDecoder,
}

impl AuthorizationJwtResolver {
    pub fn new(decoder: JwtDecoder) -> Self {
        Self { decoder }
    }
}

#[async_trait]
impl TokenResolver for AuthorizationJwtResolver {
    fn should_handle(&self, declared_type: AuthHeaderType) -> bool {
        matches!(declared_type, AuthHeaderType::Jwt)
    }

    async fn validate_token(
        &self,
        token: &str,
        public_key: &PublicKey,
        options: Option<&ValidateTokenOptions>,
    ) -> Result<NormalizedIdentity> {
        let claims: IdentityClaims = self.decoder.decode(token, public_key, true).await?;
        into_identity(claims, options)
    }
}
