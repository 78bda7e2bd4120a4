//! Authorization guard chain for protected routes.
//!
//! Guards run in this order and short-circuit on the first failure:
//!
//! 1. Bearer Presence - `Authorization: Bearer <token>` is required
//! 2. Token Validity - the token passes [`JwtValidator::validate`]
//! 3. User Resolution - the token subject maps to a local user row
//! 4. Team Scoping - the `teamId` query parameter equals the token's `team_id`
//! 5. Scope Check - the token's `scope` grants the route's required scope
//!
//! `require_auth` runs steps 1-3 and inserts an [`AuthContext`] into request
//! extensions. `require_team` and `require_scope` read it and are layered
//! per route.

use crate::auth::{JwtValidator, TokenClaims};
use crate::errors::StashError;
use crate::models::User;
use crate::repositories::UsersRepository;
use axum::{
    extract::{rejection::QueryRejection, Query, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// JWT validator with JWKS client.
    pub jwt_validator: Arc<JwtValidator>,

    /// Pool for user resolution.
    pub pool: SqlitePool,
}

/// Verified identity attached to a request by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: TokenClaims,
    pub user: User,
}

/// Scope a route requires; state for [`require_scope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredScope(pub &'static str);

/// Query parameters read by the team scoping guard.
#[derive(Debug, Deserialize)]
pub struct TeamParams {
    #[serde(rename = "teamId")]
    pub team_id: Option<String>,
}

/// Extract the bearer token from the Authorization header.
///
/// The scheme is matched case-sensitively. A missing header, a header
/// that is not valid UTF-8, a different scheme or an empty token are all
/// `Unauthenticated`.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, StashError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| {
            tracing::debug!(target: "stash.middleware.auth", "Missing Authorization header");
            StashError::Unauthenticated
        })?
        .to_str()
        .map_err(|_| {
            tracing::debug!(target: "stash.middleware.auth", "Authorization header is not valid UTF-8");
            StashError::Unauthenticated
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!(target: "stash.middleware.auth", "Invalid Authorization header format");
        StashError::Unauthenticated
    })?;

    let token = token.trim();
    if token.is_empty() {
        tracing::debug!(target: "stash.middleware.auth", "Empty bearer token");
        return Err(StashError::Unauthenticated);
    }

    Ok(token)
}

/// Team scoping: the requested team must be the token's team.
///
/// # Errors
///
/// - `MissingParameter("teamId")` if no team was requested (absent or empty)
/// - `Forbidden` if it differs from the claims' `team_id`
pub fn check_team(claims: &TokenClaims, requested: Option<&str>) -> Result<(), StashError> {
    let requested = requested
        .filter(|t| !t.is_empty())
        .ok_or_else(|| StashError::MissingParameter("teamId".to_string()))?;

    if requested != claims.team_id {
        tracing::debug!(
            target: "stash.middleware.auth",
            requested_team = %requested,
            token_team = %claims.team_id,
            "Team access denied"
        );
        return Err(StashError::Forbidden("Team access denied".to_string()));
    }

    Ok(())
}

/// Scope check: `required` must be one of the token's granted scopes.
pub fn check_scope(claims: &TokenClaims, required: &str) -> Result<(), StashError> {
    if claims.has_scope(required) {
        return Ok(());
    }

    tracing::debug!(
        target: "stash.middleware.auth",
        required_scope = %required,
        granted = ?claims.scopes(),
        "Insufficient scope"
    );
    Err(StashError::Forbidden(format!(
        "Missing required scope: {required}"
    )))
}

/// Authentication middleware: Bearer Presence, Token Validity, User Resolution.
///
/// # Response
///
/// - 401 Unauthorized if the token is missing or invalid
/// - 500 if the user row cannot be resolved
/// - Otherwise continues with [`AuthContext`] in extensions
#[instrument(skip_all, name = "stash.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StashError> {
    let token = extract_bearer_token(req.headers())?;

    let claims = state.jwt_validator.validate(token).await?;

    let user = UsersRepository::find_or_create(
        &state.pool,
        &claims.sub,
        claims.display_name(),
        claims.email.as_deref(),
    )
    .await?;

    req.extensions_mut().insert(AuthContext { claims, user });

    Ok(next.run(req).await)
}

/// Team scoping middleware. Must be layered inside [`require_auth`].
#[instrument(skip_all, name = "stash.middleware.team")]
pub async fn require_team(
    params: Result<Query<TeamParams>, QueryRejection>,
    req: Request,
    next: Next,
) -> Result<Response, StashError> {
    let Query(params) = params.map_err(|e| {
        tracing::debug!(target: "stash.middleware.auth", error = %e, "Invalid query string");
        StashError::BadRequest("Invalid query string".to_string())
    })?;

    let ctx = auth_context(&req)?;
    check_team(&ctx.claims, params.team_id.as_deref())?;

    Ok(next.run(req).await)
}

/// Scope check middleware. Must be layered inside [`require_auth`].
///
/// ```rust,ignore
/// get(list_links).route_layer(middleware::from_fn_with_state(
///     RequiredScope("links:read"),
///     require_scope,
/// ))
/// ```
#[instrument(skip_all, name = "stash.middleware.scope")]
pub async fn require_scope(
    State(RequiredScope(required)): State<RequiredScope>,
    req: Request,
    next: Next,
) -> Result<Response, StashError> {
    let ctx = auth_context(&req)?;
    check_scope(&ctx.claims, required)?;

    Ok(next.run(req).await)
}

fn auth_context(req: &Request) -> Result<&AuthContext, StashError> {
    req.extensions().get::<AuthContext>().ok_or_else(|| {
        tracing::error!(target: "stash.middleware.auth", "Guard layered without require_auth");
        StashError::Internal
    })
}
