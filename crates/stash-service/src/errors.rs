//! Stash service error types.
//!
//! Two layers:
//! - [`AuthError`] is produced by the JWKS cache and the token verifier. It
//!   keeps the distinct failure kind so it can be logged and counted.
//! - [`StashError`] is what request handlers and middleware return. It maps
//!   to an HTTP status code via the `IntoResponse` impl, which is the single
//!   place where error kinds become wire responses.
//!
//! Every `AuthError` collapses to `StashError::Unauthenticated` so callers
//! cannot learn why a token was rejected.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Generic message returned for every 401.
const UNAUTHENTICATED_MESSAGE: &str = "The access token is missing, invalid or expired";

/// Token validation failures, internal to the auth module.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Header undecodable, oversized, or missing `kid`.
    #[error("Malformed token")]
    MalformedToken,

    /// `kid` absent from a freshly fetched JWKS document.
    #[error("Signing key not found")]
    KeyNotFound,

    /// All JWKS fetch attempts failed; carries the last underlying error.
    #[error("JWKS fetch failed: {0}")]
    JwksFetchFailed(String),

    /// Signature, issuer, audience, or expiry check failed, or the signing
    /// key could not be resolved.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Verified payload does not have the expected claim shape.
    #[error("Invalid claims: {0}")]
    InvalidClaims(String),
}

impl AuthError {
    /// Bounded label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MalformedToken => "malformed_token",
            AuthError::KeyNotFound => "key_not_found",
            AuthError::JwksFetchFailed(_) => "jwks_fetch_failed",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::InvalidClaims(_) => "invalid_claims",
        }
    }
}

/// Stash service error type.
///
/// Maps to HTTP status codes:
/// - Unauthenticated: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - MissingParameter, BadRequest: 400 Bad Request
/// - Database, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum StashError {
    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl StashError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            StashError::Unauthenticated => 401,
            StashError::Forbidden(_) => 403,
            StashError::MissingParameter(_) | StashError::BadRequest(_) => 400,
            StashError::Database(_) | StashError::Internal => 500,
        }
    }
}

/// Collapse a token validation failure into the external-facing error.
///
/// The distinct kind and message are logged here, at the guard boundary,
/// and never returned to the caller.
impl From<AuthError> for StashError {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::JwksFetchFailed(_) => {
                tracing::warn!(
                    target: "stash.auth",
                    error_kind = err.kind(),
                    error = %err,
                    "Rejecting request: signing keys unavailable"
                );
            }
            _ => {
                tracing::debug!(
                    target: "stash.auth",
                    error_kind = err.kind(),
                    error = %err,
                    "Rejecting request: token validation failed"
                );
            }
        }
        StashError::Unauthenticated
    }
}

/// Convert sqlx errors to StashError
impl From<sqlx::Error> for StashError {
    fn from(err: sqlx::Error) -> Self {
        StashError::Database(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for StashError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            StashError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                UNAUTHENTICATED_MESSAGE.to_string(),
            ),
            StashError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
            StashError::MissingParameter(name) => (
                StatusCode::BAD_REQUEST,
                "MISSING_PARAMETER",
                format!("Missing required parameter: {}", name),
            ),
            StashError::BadRequest(reason) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone()),
            StashError::Database(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "stash.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            StashError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"teamstash\", error=\"invalid_token\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_auth_error_kinds_are_distinct() {
        let kinds = [
            AuthError::MalformedToken.kind(),
            AuthError::KeyNotFound.kind(),
            AuthError::JwksFetchFailed("x".to_string()).kind(),
            AuthError::InvalidToken("x".to_string()).kind(),
            AuthError::InvalidClaims("x".to_string()).kind(),
        ];
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }

    #[test]
    fn test_every_auth_error_collapses_to_unauthenticated() {
        let errors = vec![
            AuthError::MalformedToken,
            AuthError::KeyNotFound,
            AuthError::JwksFetchFailed("connection refused".to_string()),
            AuthError::InvalidToken("ExpiredSignature".to_string()),
            AuthError::InvalidClaims("team_id: missing".to_string()),
        ];

        for err in errors {
            assert!(matches!(StashError::from(err), StashError::Unauthenticated));
        }
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            StashError::Forbidden("team mismatch".to_string()).to_string(),
            "Forbidden: team mismatch"
        );
        assert_eq!(
            StashError::MissingParameter("teamId".to_string()).to_string(),
            "Missing parameter: teamId"
        );
        assert_eq!(
            AuthError::InvalidClaims("sub: missing".to_string()).to_string(),
            "Invalid claims: sub: missing"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(StashError::Unauthenticated.status_code(), 401);
        assert_eq!(StashError::Forbidden("test".to_string()).status_code(), 403);
        assert_eq!(
            StashError::MissingParameter("test".to_string()).status_code(),
            400
        );
        assert_eq!(StashError::BadRequest("test".to_string()).status_code(), 400);
        assert_eq!(StashError::Database("test".to_string()).status_code(), 500);
        assert_eq!(StashError::Internal.status_code(), 500);
    }

    #[tokio::test]
    async fn test_into_response_unauthenticated() {
        let response = StashError::Unauthenticated.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let www_auth = response
            .headers()
            .get("WWW-Authenticate")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(www_auth.contains("Bearer realm=\"teamstash\""));

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "UNAUTHENTICATED");
        assert_eq!(body_json["error"]["message"], UNAUTHENTICATED_MESSAGE);
    }

    #[tokio::test]
    async fn test_into_response_hides_auth_error_detail() {
        let err: StashError = AuthError::InvalidToken("InvalidSignature".to_string()).into();
        let response = err.into_response();

        let body_json = read_body_json(response.into_body()).await;
        let message = body_json["error"]["message"].as_str().unwrap();
        assert!(!message.contains("InvalidSignature"));
    }

    #[tokio::test]
    async fn test_into_response_forbidden() {
        let response = StashError::Forbidden("Team access denied".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get("WWW-Authenticate").is_none());

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "FORBIDDEN");
        assert_eq!(body_json["error"]["message"], "Team access denied");
    }

    #[tokio::test]
    async fn test_into_response_missing_parameter() {
        let response = StashError::MissingParameter("teamId".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "MISSING_PARAMETER");
        assert_eq!(
            body_json["error"]["message"],
            "Missing required parameter: teamId"
        );
    }

    #[tokio::test]
    async fn test_into_response_database_error_is_generic() {
        let response = StashError::Database("UNIQUE constraint failed".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "DATABASE_ERROR");
        assert_eq!(
            body_json["error"]["message"],
            "An internal database error occurred"
        );
    }

    #[tokio::test]
    async fn test_into_response_internal() {
        let response = StashError::Internal.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "INTERNAL_ERROR");
    }
}
