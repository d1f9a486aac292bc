use std::fmt::Debug;

use jsonwebtoken::errors::ErrorKind;
use thiserror::Error;

use crate::claims::AuthHeaderType;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("Authorization header is missing")]
    MissingAuthorizationHeader,
    #[error("Vendor configuration response does not contain a 'publicKey' field")]
    MissingPublicKey,
    #[error("Failed to fetch the public key after {attempts} attempts: {reason}")]
    KeyFetch { attempts: u32, reason: String },
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),
    #[error("No token resolver registered for declared type {0}")]
    NoResolver(AuthHeaderType),
    #[error("Request is not authenticated")]
    Unauthenticated,
    #[error("Vendor authentication failed: {0}")]
    VendorAuthentication(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True when the underlying failure is a signature that does not match the key,
    /// which is what a rotated issuer key looks like from the verifying side.
    pub fn is_signature_mismatch(&self) -> bool {
        matches!(self, Error::InvalidToken(e) if matches!(e.kind(), ErrorKind::InvalidSignature))
    }
}

pub(crate) fn vendor_config_error(error: reqwest::Error) -> Error {
    Error::Reqwest(error.without_url())
}

pub(crate) fn introspection_error(error: reqwest::Error) -> Error {
    Error::InvalidCredential(format!("Access token introspection failed: {error}"))
}

pub(crate) fn vendor_auth_error(error: reqwest::Error) -> Error {
    Error::VendorAuthentication(error.to_string())
}
