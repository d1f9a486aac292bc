use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::authenticator::Authenticator;
use crate::authenticator::VendorAuthenticator;
use crate::claims::AuthHeaderType;
use crate::claims::NormalizedIdentity;
use crate::claims::ValidateTokenOptions;
use crate::config::IdentityConfig;
use crate::config::VendorEndpoints;
use crate::decoder::JwtDecoder;
use crate::error::Error;
use crate::error::Result;
use crate::key_cache::PublicKey;
use crate::key_provider::PublicKeyProvider;
use crate::key_provider::VendorConfigSource;
use crate::resolvers::ResolverSet;

const BEARER_PREFIX: &str = "Bearer ";

/// Trait for resolving a presented credential into an identity
#[async_trait]
pub trait ValidateIdentity {
    /// Validate `credential` as `declared_type`. Every failure is [`Error::Unauthenticated`].
    async fn validate(
        &self,
        credential: &str,
        declared_type: AuthHeaderType,
        options: Option<&ValidateTokenOptions>,
    ) -> Result<NormalizedIdentity>;
}

/// Validates bearer credentials against the issuer
///
/// Holds the public key provider and the resolver set; both are shared by all
/// concurrent validations.
pub struct IdentityValidator {
    key_provider: Arc<PublicKeyProvider>,
    resolvers: ResolverSet,
    decoder: JwtDecoder,
    refetch_key_on_signature_failure: bool,
}

impl IdentityValidator {
    /// Create a validator that talks to the vendor API described by `config`
    pub async fn new(config: IdentityConfig) -> Result<Self> {
        let endpoints = VendorEndpoints::resolve(&config)?;
        let client = config.http_client.clone().unwrap_or_default();
        let authenticator = Arc::new(VendorAuthenticator::new(&config, &endpoints, client.clone()));

        Ok(Self::assemble(&config, endpoints, client, authenticator))
    }

    /// Create a validator that uses an externally owned authenticator
    pub async fn with_authenticator(
        config: IdentityConfig,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self> {
        let endpoints = VendorEndpoints::resolve(&config)?;
        let client = config.http_client.clone().unwrap_or_default();

        Ok(Self::assemble(&config, endpoints, client, authenticator))
    }

    fn assemble(
        config: &IdentityConfig,
        endpoints: VendorEndpoints,
        client: Client,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let source = VendorConfigSource::new(
            client,
            Arc::clone(&authenticator),
            endpoints.vendor_config,
            config.request_timeout,
        );
        let key_provider = PublicKeyProvider::new(Arc::new(source))
            .with_retry_policy(config.key_fetch_retry)
            .with_refresh_policy(config.key_refresh);

        let decoder = JwtDecoder::new(config.decode_retry);
        let resolvers = ResolverSet::standard(decoder.clone(), authenticator);

        Self::from_parts(Arc::new(key_provider), resolvers, decoder)
            .with_refetch_key_on_signature_failure(config.refetch_key_on_signature_failure)
    }

    /// Assemble a validator from its components
    pub fn from_parts(
        key_provider: Arc<PublicKeyProvider>,
        resolvers: ResolverSet,
        decoder: JwtDecoder,
    ) -> Self {
        Self {
            key_provider,
            resolvers,
            decoder,
            refetch_key_on_signature_failure: false,
        }
    }

    /// On a signature mismatch, refetch the public key and retry the resolver once
    pub fn with_refetch_key_on_signature_failure(mut self, enabled: bool) -> Self {
        self.refetch_key_on_signature_failure = enabled;
        self
    }

    pub fn key_provider(&self) -> &PublicKeyProvider {
        &self.key_provider
    }

    pub async fn get_public_key(&self) -> Result<PublicKey> {
        self.key_provider.get_public_key().await
    }

    /// Resolve a credential into an identity
    ///
    /// Any failure (empty credential, unclaimed type, unreachable key, rejected
    /// credential) is logged with its cause and returned as [`Error::Unauthenticated`].
    #[tracing::instrument(skip_all, fields(declared_type = %declared_type))]
    pub async fn validate_identity_on_token(
        &self,
        token: &str,
        options: Option<&ValidateTokenOptions>,
        declared_type: AuthHeaderType,
    ) -> Result<NormalizedIdentity> {
        self.resolve(token, options, declared_type)
            .await
            .map_err(|error| {
                match &error {
                    Error::NoResolver(_) => {
                        tracing::error!(target: "identity.validator", error = %error, "failed to find token resolver")
                    }
                    Error::KeyFetch { .. } => {
                        tracing::error!(target: "identity.validator", error = %error, "failed to get public key")
                    }
                    _ => {
                        tracing::warn!(target: "identity.validator", error = %error, "credential rejected")
                    }
                }
                Error::Unauthenticated
            })
    }

    async fn resolve(
        &self,
        token: &str,
        options: Option<&ValidateTokenOptions>,
        declared_type: AuthHeaderType,
    ) -> Result<NormalizedIdentity> {
        let token = match declared_type {
            AuthHeaderType::Jwt => strip_bearer(token),
            AuthHeaderType::AccessToken => token,
        };

        if token.trim().is_empty() {
            return Err(Error::InvalidCredential("Credential is missing".to_string()));
        }

        let resolver = self.resolvers.select(declared_type)?;
        let public_key = self.key_provider.get_public_key().await?;

        match resolver.validate_token(token, &public_key, options).await {
            Err(error) if self.refetch_key_on_signature_failure && error.is_signature_mismatch() => {
                tracing::info!(
                    target: "identity.validator",
                    "signature mismatch, refetching public key before one more attempt"
                );
                let public_key = self.key_provider.refresh().await?;
                resolver.validate_token(token, &public_key, options).await
            }
            result => result,
        }
    }

    /// Decode the claims of an `Authorization` header value without resolving an identity
    ///
    /// With `verify` off the signature is not checked. Only use that from trusted
    /// internal call paths. Errors are returned as they are, not normalized.
    #[tracing::instrument(skip(self, authorization_header))]
    pub async fn decode_jwt<C: DeserializeOwned>(
        &self,
        authorization_header: &str,
        verify: bool,
    ) -> Result<C> {
        if authorization_header.trim().is_empty() {
            return Err(Error::MissingAuthorizationHeader);
        }

        let token = strip_bearer(authorization_header);
        let public_key = self.key_provider.get_public_key().await?;
        let claims = self.decoder.decode(token, &public_key, verify).await?;

        tracing::info!(target: "identity.validator", "jwt was decoded successfully");
        Ok(claims)
    }
}

#[async_trait]
impl ValidateIdentity for IdentityValidator {
    async fn validate(
        &self,
        credential: &str,
        declared_type: AuthHeaderType,
        options: Option<&ValidateTokenOptions>,
    ) -> Result<NormalizedIdentity> {
        self.validate_identity_on_token(credential, options, declared_type)
            .await
    }
}

fn strip_bearer(token: &str) -> &str {
    match token.strip_prefix(BEARER_PREFIX) {
        Some(stripped) => stripped,
        None => {
            tracing::debug!(target: "identity.validator", "credential has no Bearer prefix");
            token
        }
    }
}
