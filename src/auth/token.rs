//! HS256 bearer tokens carrying the caller's user id and email.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::{AuthError, Identity};
use crate::error::{Result, ServiceError};

/// Maximum bearer token length (8 KiB). Oversized headers are rejected
/// before any decoding work.
pub const MAX_TOKEN_LENGTH: usize = 8192;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    iat: i64,
    exp: i64,
}

/// A freshly issued token.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: &'static str,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

/// Issues and verifies bearer tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs,
        }
    }

    /// Random 256-bit secret, hex encoded.
    pub fn generate_secret() -> String {
        let bytes: [u8; 32] = rand::random();
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Issue a token valid from now for `ttl_secs`.
    pub fn issue(&self, user_id: &str, email: &str) -> Result<IssuedToken> {
        self.issue_at(user_id, email, chrono::Utc::now().timestamp())
    }

    /// Issue a token as if the current time were `issued_at` (epoch secs).
    pub fn issue_at(&self, user_id: &str, email: &str, issued_at: i64) -> Result<IssuedToken> {
        let ttl = i64::try_from(self.ttl_secs)
            .map_err(|_| ServiceError::Config("token ttl is too large".into()))?;
        let claims = Claims {
            sub: user_id.to_owned(),
            email: email.to_owned(),
            iat: issued_at,
            exp: issued_at.saturating_add(ttl),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ServiceError::Internal(format!("token signing failed: {e}")))?;

        Ok(IssuedToken {
            token,
            token_type: "Bearer",
            expires_in: self.ttl_secs,
        })
    }

    /// Verify signature and expiry and return the asserted identity.
    pub fn verify(&self, token: &str) -> std::result::Result<Identity, AuthError> {
        if token.len() > MAX_TOKEN_LENGTH {
            return Err(AuthError::InvalidToken("token too long".into()));
        }

        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let claims = data.claims;
        if claims.sub.trim().is_empty() || claims.email.trim().is_empty() {
            return Err(AuthError::InvalidToken("token is missing identity claims".into()));
        }

        Ok(Identity {
            user_id: claims.sub,
            email: claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", 3600)
    }

    #[test]
    fn issued_token_verifies_to_same_identity() {
        let tokens = service();
        let issued = tokens.issue("user-1", "a@example.com").expect("issue");
        assert_eq!(issued.token_type, "Bearer");
        assert_eq!(issued.expires_in, 3600);

        let identity = tokens.verify(&issued.token).expect("verify");
        assert_eq!(identity.user_id, "user-1");
        assert_eq!(identity.email, "a@example.com");
    }

    #[test]
    fn token_past_its_hour_is_rejected() {
        let tokens = service();
        let now = chrono::Utc::now().timestamp();
        let stale = tokens
            .issue_at("user-1", "a@example.com", now - 3601)
            .expect("issue");
        assert!(matches!(
            tokens.verify(&stale.token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn token_within_its_hour_is_accepted() {
        let tokens = service();
        let now = chrono::Utc::now().timestamp();
        let fresh = tokens
            .issue_at("user-1", "a@example.com", now - 3500)
            .expect("issue");
        assert!(tokens.verify(&fresh.token).is_ok());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let issued = TokenService::new("other-secret", 3600)
            .issue("user-1", "a@example.com")
            .expect("issue");
        assert!(service().verify(&issued.token).is_err());
    }

    #[test]
    fn garbage_and_oversized_tokens_are_rejected() {
        let tokens = service();
        assert!(tokens.verify("not.a.jwt").is_err());
        assert!(tokens.verify(&"a".repeat(MAX_TOKEN_LENGTH + 1)).is_err());
    }

    #[test]
    fn generated_secrets_are_distinct() {
        let a = TokenService::generate_secret();
        let b = TokenService::generate_secret();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
