//! Bearer token issuance and verification.
//!
//! Signs HS256 access+refresh pairs bound to an account id. Tokens are
//! stateless; nothing is stored at issuance time.
//!
//! TODO: token revocation is unimplemented; a verified token stays valid
//! until its expiry.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AuthConfig;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Signed access+refresh pair for one account.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Account id
    sub: String,
    exp: i64,
    iat: i64,
    jti: String,
    token_type: String,
}

#[derive(Clone)]
pub struct TokenService {
    access_key: EncodingKey,
    access_decoding: DecodingKey,
    refresh_key: EncodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_key: EncodingKey::from_secret(config.access_secret.as_ref()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_ref()),
            refresh_key: EncodingKey::from_secret(config.refresh_secret.as_ref()),
            access_ttl: Duration::minutes(config.access_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_ttl_days),
        }
    }

    /// Issue a fresh access+refresh pair bound to the given account.
    pub fn issue_pair(&self, account_id: i32) -> Result<TokenPair, TokenError> {
        let access = self.sign(account_id, "access", self.access_ttl, &self.access_key)?;
        let refresh = self.sign(account_id, "refresh", self.refresh_ttl, &self.refresh_key)?;

        Ok(TokenPair { access, refresh })
    }

    /// Verify an access token and return the account id it is bound to.
    pub fn verify_access(&self, token: &str) -> Result<i32, TokenError> {
        let claims = decode::<Claims>(token, &self.access_decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;

        if claims.token_type != "access" {
            return Err(TokenError::Invalid("Not an access token".to_string()));
        }

        claims
            .sub
            .parse()
            .map_err(|_| TokenError::Invalid("Invalid account id in token".to_string()))
    }

    fn sign(
        &self,
        account_id: i32,
        token_type: &str,
        ttl: Duration,
        key: &EncodingKey,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: account_id.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type: token_type.to_string(),
        };

        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, key).map_err(|e| TokenError::Signing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> TokenService {
        TokenService::new(&AuthConfig {
            access_secret: "test_access_secret_key".to_string(),
            refresh_secret: "test_refresh_secret_key".to_string(),
            ..AuthConfig::default()
        })
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let service = test_service();
        let pair = service.issue_pair(42).unwrap();

        assert_eq!(service.verify_access(&pair.access).unwrap(), 42);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let service = test_service();
        let pair = service.issue_pair(7).unwrap();

        // Signed with a different secret and carrying the wrong token_type
        assert!(service.verify_access(&pair.refresh).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let service = test_service();
        assert!(service.verify_access("not-a-token").is_err());
    }

    #[test]
    fn test_tokens_in_pair_differ() {
        let service = test_service();
        let pair = service.issue_pair(1).unwrap();
        assert_ne!(pair.access, pair.refresh);
    }
}
