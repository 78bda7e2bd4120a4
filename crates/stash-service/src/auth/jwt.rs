//! JWT validation for the stash service.
//!
//! Validates bearer tokens issued by the identity provider using public keys
//! fetched from its JWKS endpoint.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RS256 is accepted
//! - Issuer must match exactly; audience must equal or contain the configured value
//! - Expiry is enforced with no leeway
//! - Failure detail is logged, never returned to the caller

use crate::auth::claims::TokenClaims;
use crate::auth::jwks::{Jwk, JwksClient};
use crate::errors::AuthError;
use crate::observability::metrics;
use common::jwt::extract_kid;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// JWT validator using keys from the provider's JWKS.
///
/// Holds no mutable state; share it across requests behind `Arc`.
pub struct JwtValidator {
    /// JWKS client for fetching public keys.
    jwks_client: Arc<JwksClient>,

    /// Trusted issuer, compared by exact string match.
    issuer: String,

    /// Expected audience.
    audience: String,
}

impl JwtValidator {
    /// Create a new JWT validator.
    pub fn new(jwks_client: Arc<JwksClient>, issuer: String, audience: String) -> Self {
        Self {
            jwks_client,
            issuer,
            audience,
        }
    }

    /// Validate a JWT and return the claims.
    ///
    /// # Security Checks
    ///
    /// 1. Size check - reject tokens > 8KB before parsing
    /// 2. Extract kid from header to find the correct key
    /// 3. Resolve the public key through the JWKS cache
    /// 4. Verify RS256 signature, issuer, audience and expiry
    /// 5. Validate claim shape and normalize audience
    ///
    /// # Errors
    ///
    /// - `AuthError::MalformedToken` if the header cannot be decoded or has no `kid`
    /// - `AuthError::InvalidToken` for key resolution or verification failures
    /// - `AuthError::InvalidClaims` if the verified payload has the wrong shape
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let start = Instant::now();
        let result = self.validate_inner(token).await;

        match &result {
            Ok(_) => metrics::record_token_validation("success", None, start.elapsed()),
            Err(e) => metrics::record_token_validation("error", Some(e.kind()), start.elapsed()),
        }

        result
    }

    async fn validate_inner(&self, token: &str) -> Result<TokenClaims, AuthError> {
        // 1. Extract kid from JWT header (includes size check via common::jwt)
        let kid = extract_kid(token).map_err(|e| {
            tracing::debug!(target: "stash.auth.jwt", error = ?e, "Token kid extraction failed");
            AuthError::MalformedToken
        })?;

        // 2. Resolve the signing key. Key-level failures look the same as a bad token.
        let jwk = self.jwks_client.get_key(&kid).await.map_err(|e| {
            tracing::warn!(
                target: "stash.auth.jwt",
                kid = %kid,
                error_kind = e.kind(),
                error = %e,
                "Signing key could not be resolved"
            );
            AuthError::InvalidToken(e.to_string())
        })?;

        // 3. Verify signature, issuer, audience and expiry
        let payload = verify_token(token, &jwk, &self.issuer, &self.audience)?;

        // 4. Validate shape and normalize audience
        let claims = TokenClaims::from_payload(&payload, &self.audience).map_err(|e| {
            tracing::debug!(target: "stash.auth.jwt", error = %e, "Token claims rejected");
            e
        })?;

        tracing::debug!(target: "stash.auth.jwt", team_id = %claims.team_id, "Token validated successfully");
        Ok(claims)
    }
}

/// Build an RS256 decoding key from a JWK.
fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, AuthError> {
    if jwk.kty != "RSA" {
        tracing::warn!(target: "stash.auth.jwt", kty = %jwk.kty, "Unexpected JWK key type");
        return Err(AuthError::InvalidToken(format!(
            "unsupported key type {}",
            jwk.kty
        )));
    }
    if let Some(alg) = &jwk.alg {
        if alg != "RS256" {
            tracing::warn!(target: "stash.auth.jwt", alg = %alg, "Unexpected JWK algorithm");
            return Err(AuthError::InvalidToken(format!(
                "unsupported key algorithm {alg}"
            )));
        }
    }

    let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
        tracing::error!(target: "stash.auth.jwt", kid = %jwk.kid, "JWK missing n or e field");
        return Err(AuthError::InvalidToken(
            "signing key missing RSA components".to_string(),
        ));
    };

    DecodingKey::from_rsa_components(n, e).map_err(|err| {
        tracing::error!(target: "stash.auth.jwt", error = %err, "Invalid RSA key components");
        AuthError::InvalidToken(format!("invalid signing key: {err}"))
    })
}

/// Verify JWT signature and standard claims, returning the raw payload.
fn verify_token(token: &str, jwk: &Jwk, issuer: &str, audience: &str) -> Result<Value, AuthError> {
    let decoding_key = decoding_key(jwk)?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    validation.set_required_spec_claims(&["exp", "iss", "aud"]);

    let token_data = decode::<Value>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(target: "stash.auth.jwt", error = %e, "Token verification failed");
        AuthError::InvalidToken(e.to_string())
    })?;

    // jsonwebtoken accepts exp == now; the token must expire strictly in the future.
    reject_unless_future(&token_data.claims, chrono::Utc::now().timestamp())?;

    Ok(token_data.claims)
}

/// Reject a payload whose `exp` is not after `now` (unix seconds).
fn reject_unless_future(payload: &Value, now: i64) -> Result<(), AuthError> {
    let exp = payload.get("exp").and_then(Value::as_f64).ok_or_else(|| {
        AuthError::InvalidToken("exp must be a number".to_string())
    })?;

    if exp <= now as f64 {
        tracing::debug!(target: "stash.auth.jwt", exp = exp, now = now, "Token expired");
        return Err(AuthError::InvalidToken("ExpiredSignature".to_string()));
    }

    Ok(())
}
