//! `/register` and `/login`.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{AppState, run_blocking};
use crate::auth::{IssuedToken, hash_password, verify_password};
use crate::error::{Result, ServiceError};
use crate::store::StoreError;

const LOGIN_FAILED: &str = "Invalid email or password.";

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Body returned by `/register`.
#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub id: String,
    pub email: String,
}

/// Trim and lower-case an email, requiring a single `@` with non-empty
/// local and domain parts.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ServiceError::InvalidArgument("A valid email is required.".into()));
    }
    Ok(email)
}

pub(super) async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisteredUser>)> {
    let Json(credentials) = payload?;
    let email = normalize_email(&credentials.email)?;
    if credentials.password.chars().count() < state.min_password_len {
        return Err(ServiceError::InvalidArgument(format!(
            "Password must be at least {} characters.",
            state.min_password_len
        )));
    }

    let password = credentials.password;
    let password_hash = run_blocking(move || hash_password(&password)).await??;

    let users = Arc::clone(&state.users);
    let created = run_blocking(move || users.create_user(&email, &password_hash)).await?;
    let user = match created {
        Ok(user) => user,
        Err(StoreError::Duplicate(_)) => {
            return Err(ServiceError::Conflict("User already exists.".into()));
        }
        Err(e) => return Err(e.into()),
    };
    info!(user_id = %user.id, email = %user.email, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisteredUser {
            id: user.id,
            email: user.email,
        }),
    ))
}

pub(super) async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<IssuedToken>> {
    let Json(credentials) = payload?;
    let unauthorized = || ServiceError::Unauthorized(LOGIN_FAILED.into());

    let email = normalize_email(&credentials.email).map_err(|_| unauthorized())?;
    let user = state
        .with_users(move |users| users.find_user_by_email(&email))
        .await?
        .ok_or_else(unauthorized)?;

    let password = credentials.password;
    let stored_hash = user.password_hash.clone();
    let matches = run_blocking(move || verify_password(&password, &stored_hash)).await?;
    if !matches {
        tracing::debug!(user_id = %user.id, "login rejected");
        return Err(unauthorized());
    }

    let issued = state.tokens.issue(&user.id, &user.email)?;
    info!(user_id = %user.id, "login succeeded");
    Ok(Json(issued))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Alice@Example.COM ").unwrap(), "alice@example.com");
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for raw in ["", "alice", "@example.com", "alice@", "a@b@c", "al ice@example.com"] {
            assert!(
                matches!(normalize_email(raw), Err(ServiceError::InvalidArgument(_))),
                "{raw:?}"
            );
        }
    }
}
