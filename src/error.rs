//! Error types for the task service.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Top-level error type for the task service.
///
/// The first five variants are the request-facing taxonomy and carry a
/// message that is safe to show to the caller. The rest are internal
/// failures that render as a generic 500.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// No credential was presented.
    #[error("{0}")]
    Unauthorized(String),

    /// A credential was presented but rejected.
    #[error("{0}")]
    Forbidden(String),

    /// Owner-scoped lookup missed.
    #[error("{0}")]
    NotFound(String),

    /// Bad filter period, malformed body, or field validation failure.
    #[error("{0}")]
    InvalidArgument(String),

    /// Duplicate email at registration.
    #[error("{0}")]
    Conflict(String),

    /// Persistent store failure.
    #[error("store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else that should never reach a client verbatim.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    /// Stable snake_case identifier used in error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Conflict(_) => "conflict",
            Self::Store(_) | Self::Config(_) | Self::Io(_) | Self::Internal(_) => "internal",
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Store(_) | Self::Config(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the message may be shown to the caller.
    fn is_client_facing(&self) -> bool {
        !self.status().is_server_error()
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.is_client_facing() {
            self.to_string()
        } else {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_owned()
        };
        let body = Json(serde_json::json!({
            "error": message,
            "kind": self.kind(),
        }));
        (status, body).into_response()
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidArgument(rejection.body_text())
    }
}

impl From<QueryRejection> for ServiceError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidArgument(rejection.body_text())
    }
}

impl From<PathRejection> for ServiceError {
    fn from(rejection: PathRejection) -> Self {
        Self::InvalidArgument(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn taxonomy_maps_to_expected_status() {
        let cases = [
            (ServiceError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Conflict("x".into()), StatusCode::CONFLICT),
            (ServiceError::Store("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err:?}");
        }
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak_detail() {
        let response = ServiceError::Store("disk I/O error at /var/db".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), 4096)
            .await
            .expect("read body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["error"], "internal server error");
        assert_eq!(body["kind"], "internal");
    }

    #[tokio::test]
    async fn client_errors_carry_their_message() {
        let response = ServiceError::NotFound("Task not found".into()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), 4096)
            .await
            .expect("read body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["error"], "Task not found");
        assert_eq!(body["kind"], "not_found");
    }
}
