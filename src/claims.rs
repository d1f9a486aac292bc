use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::Error;
use crate::error::Result;

/// How a presented credential should be interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthHeaderType {
    /// A signed JWT, optionally prefixed with `Bearer `
    #[default]
    #[serde(rename = "JWT")]
    Jwt,
    /// An opaque access token validated by the issuer
    #[serde(rename = "AccessToken")]
    AccessToken,
}

impl fmt::Display for AuthHeaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthHeaderType::Jwt => f.write_str("JWT"),
            AuthHeaderType::AccessToken => f.write_str("AccessToken"),
        }
    }
}

impl FromStr for AuthHeaderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "JWT" => Ok(AuthHeaderType::Jwt),
            "AccessToken" => Ok(AuthHeaderType::AccessToken),
            other => Err(Error::InvalidCredential(format!(
                "Unknown authorization header type: {other}"
            ))),
        }
    }
}

/// Constraints a resolver applies to the identity it resolved
///
/// Empty lists mean "no constraint". When `roles` is non-empty the identity must
/// hold at least one of them; the same goes for `permissions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateTokenOptions {
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl ValidateTokenOptions {
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Check the identity against these constraints
    pub fn check(&self, identity: &NormalizedIdentity) -> Result<()> {
        if let Some(tenant_id) = &self.tenant_id {
            if &identity.tenant_id != tenant_id {
                return Err(Error::InvalidCredential(format!(
                    "Identity belongs to tenant {}, expected {tenant_id}",
                    identity.tenant_id
                )));
            }
        }

        if !self.roles.is_empty() && !holds_any(&identity.roles, &self.roles) {
            return Err(Error::InvalidCredential(
                "Identity holds none of the required roles".to_string(),
            ));
        }

        if !self.permissions.is_empty() && !holds_any(&identity.permissions, &self.permissions) {
            return Err(Error::InvalidCredential(
                "Identity holds none of the required permissions".to_string(),
            ));
        }

        Ok(())
    }
}

fn holds_any(held: &[String], required: &[String]) -> bool {
    required.iter().any(|r| held.contains(r))
}

/// Kind of entity a token was issued to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenEntityType {
    UserToken,
    UserAccessToken,
    TenantAccessToken,
    UserApiToken,
    TenantApiToken,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Claims carried by an issuer token or returned by access token introspection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClaims {
    /// Subject - the user or token id
    #[serde(default)]
    pub sub: String,
    /// Active tenant of the subject
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// All tenants the subject belongs to
    #[serde(default)]
    pub tenant_ids: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "type")]
    pub entity_type: Option<TokenEntityType>,
    /// Expiration time as Unix timestamp
    #[serde(default)]
    pub exp: Option<i64>,
    /// Every other claim, kept for downstream authorization
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The canonical "who is making this request" produced by every resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedIdentity {
    pub subject: String,
    pub tenant_id: String,
    pub tenant_ids: Vec<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub email: Option<String>,
    pub entity_type: TokenEntityType,
    pub expires_at: Option<DateTime<Utc>>,
    pub claims: Map<String, Value>,
}

impl TryFrom<IdentityClaims> for NormalizedIdentity {
    type Error = Error;

    fn try_from(claims: IdentityClaims) -> Result<Self> {
        if claims.sub.is_empty() {
            return Err(Error::InvalidCredential(
                "Token does not carry a subject".to_string(),
            ));
        }

        let tenant_id = claims
            .tenant_id
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::InvalidCredential("Token does not carry a tenant".to_string()))?;

        let expires_at = match claims.exp {
            Some(exp) => Some(DateTime::<Utc>::from_timestamp(exp, 0).ok_or_else(|| {
                Error::InvalidCredential(format!("Expiration {exp} is out of range"))
            })?),
            None => None,
        };

        Ok(Self {
            subject: claims.sub,
            tenant_id,
            tenant_ids: claims.tenant_ids,
            roles: claims.roles,
            permissions: claims.permissions,
            email: claims.email,
            entity_type: claims.entity_type.unwrap_or_default(),
            expires_at,
            claims: claims.extra,
        })
    }
}
