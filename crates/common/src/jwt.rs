//! JWT utilities shared across TeamStash services.
//!
//! This module provides the pieces of token handling that do not need a
//! verification key:
//! - Size limits for DoS prevention
//! - Key ID extraction from JWT headers
//! - Scope string parsing
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing returned here is trusted; the token MUST still be verified
//! - Error messages are intentionally generic to prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{extract_kid, scope_contains};
//!
//! // Extract key ID for JWKS lookup
//! let kid = extract_kid(token)?;
//!
//! // After verification, check a granted scope
//! if scope_contains(&claims.scope, "links:write") { /* ... */ }
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations.
///
/// - Typical RS256 access tokens from the identity provider are 800-1500 bytes
/// - 8KB leaves room for large role lists while bounding base64/JSON work
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting an unverified JWT.
///
/// Note: Display output is intentionally generic. Detailed information is
/// logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token is missing required `kid` header.
    #[error("The access token is invalid or expired")]
    MissingKid,
}

// =============================================================================
// Functions
// =============================================================================

/// Extract the `kid` (key ID) from a JWT header without verifying the signature.
///
/// This is used to look up the correct signing key for verification when
/// multiple keys may be valid (e.g., during key rotation at the provider).
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
/// - The `kid` value should only be used for key lookup in a trusted JWKS
///
/// # Errors
///
/// Returns `JwtValidationError` variants:
/// - `TokenTooLarge` - Token exceeds size limit
/// - `MalformedToken` - Token format invalid (wrong structure, bad base64, invalid JSON)
/// - `MissingKid` - Token header missing `kid` field, or `kid` is empty or not a string
pub fn extract_kid(token: &str) -> Result<String, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtValidationError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)
}

/// Check whether a space-delimited scope string grants `required`.
///
/// Matching is by whole token: `"links:read"` does not grant `"links"`.
#[must_use]
pub fn scope_contains(scope: &str, required: &str) -> bool {
    scope.split_whitespace().any(|s| s == required)
}

/// Split a space-delimited scope string into its tokens.
#[must_use]
pub fn split_scopes(scope: &str) -> Vec<&str> {
    scope.split_whitespace().collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    // -------------------------------------------------------------------------
    // extract_kid Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_extract_kid_valid_token() {
        let header = r#"{"alg":"RS256","typ":"JWT","kid":"k1"}"#;
        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        let token = format!("{header_b64}.payload.signature");

        assert_eq!(extract_kid(&token).unwrap(), "k1");
    }

    #[test]
    fn test_extract_kid_missing_kid() {
        let header = r#"{"alg":"RS256","typ":"JWT"}"#;
        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        let token = format!("{header_b64}.payload.signature");

        let result = extract_kid(&token);
        assert!(matches!(result, Err(JwtValidationError::MissingKid)));
    }

    #[test]
    fn test_extract_kid_empty_kid() {
        let header = r#"{"alg":"RS256","kid":""}"#;
        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        let token = format!("{header_b64}.payload.signature");

        let result = extract_kid(&token);
        assert!(matches!(result, Err(JwtValidationError::MissingKid)));
    }

    #[test]
    fn test_extract_kid_non_string_kid() {
        let header = r#"{"alg":"RS256","kid":12345}"#;
        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        let token = format!("{header_b64}.payload.signature");

        let result = extract_kid(&token);
        assert!(matches!(result, Err(JwtValidationError::MissingKid)));
    }

    #[test]
    fn test_extract_kid_malformed_token() {
        assert!(matches!(
            extract_kid("not-a-jwt"),
            Err(JwtValidationError::MalformedToken)
        ));
        assert!(matches!(
            extract_kid(""),
            Err(JwtValidationError::MalformedToken)
        ));
        assert!(matches!(
            extract_kid("a.b.c.d"),
            Err(JwtValidationError::MalformedToken)
        ));
    }

    #[test]
    fn test_extract_kid_invalid_base64() {
        let result = extract_kid("!!!invalid!!!.payload.signature");
        assert!(matches!(result, Err(JwtValidationError::MalformedToken)));
    }

    #[test]
    fn test_extract_kid_invalid_json() {
        let header_b64 = URL_SAFE_NO_PAD.encode("not-json");
        let token = format!("{header_b64}.payload.signature");

        let result = extract_kid(&token);
        assert!(matches!(result, Err(JwtValidationError::MalformedToken)));
    }

    #[test]
    fn test_extract_kid_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        let result = extract_kid(&oversized);
        assert!(matches!(result, Err(JwtValidationError::TokenTooLarge)));
    }

    #[test]
    fn test_extract_kid_at_size_limit() {
        let header = r#"{"alg":"RS256","typ":"JWT","kid":"key"}"#;
        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        let remaining = MAX_JWT_SIZE_BYTES - header_b64.len() - 2; // -2 for two dots
        let payload_len = remaining / 2;
        let sig_len = remaining - payload_len;
        let token = format!(
            "{}.{}.{}",
            header_b64,
            "a".repeat(payload_len),
            "b".repeat(sig_len)
        );

        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);
        assert_eq!(extract_kid(&token).unwrap(), "key");
    }

    // -------------------------------------------------------------------------
    // Scope Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_scope_contains_whole_tokens_only() {
        let scope = "openid profile links:read links:write";

        assert!(scope_contains(scope, "links:write"));
        assert!(scope_contains(scope, "openid"));
        assert!(!scope_contains(scope, "links"));
        assert!(!scope_contains(scope, "links:delete"));
    }

    #[test]
    fn test_scope_contains_tolerates_extra_whitespace() {
        assert!(scope_contains("  links:read\tlinks:write \n", "links:write"));
    }

    #[test]
    fn test_scope_contains_empty() {
        assert!(!scope_contains("", "links:read"));
        assert!(!scope_contains("links:read", ""));
    }

    #[test]
    fn test_split_scopes() {
        assert_eq!(split_scopes("openid profile"), vec!["openid", "profile"]);
        assert!(split_scopes("   ").is_empty());
    }
}
