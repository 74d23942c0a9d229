//! Authentication gate.
//!
//! Every protected handler takes an [`Identity`] argument. Extracting it
//! reads the `Authorization` header and verifies the bearer token:
//! - no token → `Unauthorized`
//! - token present but bad, expired, or malformed → `Forbidden`
//! - otherwise the decoded `{user_id, email}` is handed to the handler,
//!   which scopes every store call by `user_id`.

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password};
pub use token::{IssuedToken, TokenService};

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header;
use axum::http::request::Parts;

use crate::error::ServiceError;

const AUTHORIZATION_BEARER_SCHEME: &str = "Bearer";

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no bearer token provided")]
    MissingCredential,

    #[error("invalid token: {0}")]
    InvalidToken(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredential => {
                ServiceError::Unauthorized("Access denied. No token provided.".into())
            }
            AuthError::InvalidToken(_) => ServiceError::Forbidden("Invalid or expired token.".into()),
        }
    }
}

/// Pull the token out of an `Authorization` header value.
///
/// The `Bearer` scheme (any case) is stripped when present; anything else
/// left in the header is treated as the token and judged by the verifier.
/// A bare scheme with no token counts as missing.
fn extract_bearer_token(auth_header: Option<&str>) -> Result<&str, AuthError> {
    let header = auth_header.unwrap_or_default().trim();
    let token = match header.get(..AUTHORIZATION_BEARER_SCHEME.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(AUTHORIZATION_BEARER_SCHEME) => {
            let rest = &header[AUTHORIZATION_BEARER_SCHEME.len()..];
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                rest.trim()
            } else {
                header
            }
        }
        _ => header,
    };
    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(token)
}

/// Read the `Authorization` header. A header that is present but not
/// visible ASCII is a malformed credential, not a missing one.
fn authorization_header(parts: &Parts) -> Result<Option<&str>, AuthError> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .map(|value| {
            value.to_str().map_err(|_| {
                AuthError::InvalidToken("authorization header is not valid ASCII".into())
            })
        })
        .transpose()
}

/// Run the gate against a raw header value.
pub fn authenticate(
    tokens: &TokenService,
    auth_header: Option<&str>,
) -> Result<Identity, AuthError> {
    let token = extract_bearer_token(auth_header)?;
    tokens.verify(token)
}

impl<S> FromRequestParts<S> for Identity
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = Arc::<TokenService>::from_ref(state);
        let result =
            authorization_header(parts).and_then(|auth_header| authenticate(&tokens, auth_header));

        match result {
            Ok(identity) => Ok(identity),
            Err(err) => {
                tracing::debug!(error = %err, path = %parts.uri.path(), "request rejected by auth gate");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn missing_or_empty_header_is_missing_credential() {
        let tokens = TokenService::new("secret", 3600);
        for header in [
            None,
            Some(""),
            Some("Bearer"),
            Some("Bearer "),
            Some("Bearer    "),
            Some("bearer"),
        ] {
            assert!(
                matches!(authenticate(&tokens, header), Err(AuthError::MissingCredential)),
                "header {header:?}"
            );
        }
    }

    #[test]
    fn bad_token_is_invalid_not_missing() {
        let tokens = TokenService::new("secret", 3600);
        for header in [
            Some("Bearer abc.def.ghi"),
            Some("Basic dXNlcjpwYXNz"),
            Some("Bearerabc"),
        ] {
            assert!(
                matches!(authenticate(&tokens, header), Err(AuthError::InvalidToken(_))),
                "header {header:?}"
            );
        }
    }

    #[test]
    fn valid_bearer_header_yields_identity() {
        let tokens = TokenService::new("secret", 3600);
        let issued = tokens.issue("u-1", "a@example.com").expect("issue");
        let header = format!("Bearer {}", issued.token);
        let identity = authenticate(&tokens, Some(&header)).expect("authenticate");
        assert_eq!(
            identity,
            Identity {
                user_id: "u-1".into(),
                email: "a@example.com".into(),
            }
        );
    }

    #[test]
    fn scheme_is_matched_case_insensitively() {
        let tokens = TokenService::new("secret", 3600);
        let issued = tokens.issue("u-1", "a@example.com").expect("issue");
        let header = format!("bearer   {} ", issued.token);
        let identity = authenticate(&tokens, Some(&header)).expect("authenticate");
        assert_eq!(identity.user_id, "u-1");
    }

    #[test]
    fn non_ascii_header_is_invalid_not_missing() {
        let request = axum::http::Request::builder()
            .header(
                header::AUTHORIZATION,
                axum::http::HeaderValue::from_bytes(b"Bearer \xfftoken").unwrap(),
            )
            .body(())
            .unwrap();
        let (parts, ()) = request.into_parts();
        assert!(matches!(
            authorization_header(&parts),
            Err(AuthError::InvalidToken(_))
        ));

        let (parts, ()) = axum::http::Request::new(()).into_parts();
        assert!(matches!(authorization_header(&parts), Ok(None)));
    }

    #[test]
    fn auth_errors_map_to_taxonomy() {
        assert!(matches!(
            ServiceError::from(AuthError::MissingCredential),
            ServiceError::Unauthorized(_)
        ));
        assert!(matches!(
            ServiceError::from(AuthError::InvalidToken("x".into())),
            ServiceError::Forbidden(_)
        ));
    }
}
