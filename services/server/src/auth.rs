use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::errors::Kind;

/// A caller identity, opaque beyond its string value — the core only needs
/// to know *that* a token was valid, not who it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal(pub String);

#[async_trait]
pub trait AuthValidator: Send + Sync {
    async fn validate(&self, authorization: Option<&str>) -> Result<Principal, Kind>;
}

pub fn extract_bearer(authorization: &str) -> Option<&str> {
    authorization.strip_prefix("Bearer ")
}

/// Compares a SHA-256 digest of the presented token against a fixed,
/// startup-configured secret. Used whenever `STREAM_SERVICE_TOKEN` is set.
pub struct BearerTokenValidator {
    expected_hash: Vec<u8>,
}

impl BearerTokenValidator {
    pub fn new(token: &str) -> Self {
        Self {
            expected_hash: Sha256::digest(token.as_bytes()).to_vec(),
        }
    }
}

#[async_trait]
impl AuthValidator for BearerTokenValidator {
    async fn validate(&self, authorization: Option<&str>) -> Result<Principal, Kind> {
        let header = authorization.ok_or(Kind::Unauthorized)?;
        let token = extract_bearer(header).ok_or(Kind::Unauthorized)?;
        let hash = Sha256::digest(token.as_bytes()).to_vec();
        if hash == self.expected_hash {
            Ok(Principal(token.to_owned()))
        } else {
            Err(Kind::Unauthorized)
        }
    }
}

/// Accepts every request. Only wired up when `STREAM_SERVICE_TOKEN` is
/// unset, which is a dev-only configuration (§6 of the spec).
pub struct NullAuthValidator;

#[async_trait]
impl AuthValidator for NullAuthValidator {
    async fn validate(&self, _authorization: Option<&str>) -> Result<Principal, Kind> {
        Ok(Principal("anonymous".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bearer_validator_accepts_matching_token() {
        let v = BearerTokenValidator::new("secret-123");
        let result = v.validate(Some("Bearer secret-123")).await;
        assert_eq!(result.unwrap(), Principal("secret-123".to_owned()));
    }

    #[tokio::test]
    async fn bearer_validator_rejects_mismatched_token() {
        let v = BearerTokenValidator::new("secret-123");
        assert!(v.validate(Some("Bearer wrong")).await.is_err());
    }

    #[tokio::test]
    async fn bearer_validator_rejects_missing_header() {
        let v = BearerTokenValidator::new("secret-123");
        assert!(v.validate(None).await.is_err());
    }

    #[tokio::test]
    async fn null_validator_accepts_anything() {
        let v = NullAuthValidator;
        assert!(v.validate(None).await.is_ok());
    }
}
