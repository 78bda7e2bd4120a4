//! Current user handler.

use crate::middleware::AuthContext;
use crate::models::{MeResponse, UserResponse};
use axum::{Extension, Json};
use tracing::instrument;

/// Handler for GET /api/v1/me
///
/// Returns the resolved local user and the verified token claims.
///
/// ```json
/// {
///   "user": { "id": 1, "display_name": "Ada" },
///   "claims": { "sub": "u1", "aud": "teamstash-api", "team_id": "web01", ... }
/// }
/// ```
#[instrument(skip_all, name = "stash.handlers.me")]
pub async fn get_me(Extension(ctx): Extension<AuthContext>) -> Json<MeResponse> {
    tracing::debug!(target: "stash.handlers.me", user_id = ctx.user.id, "Returning current user");

    Json(MeResponse {
        user: UserResponse::from(&ctx.user),
        claims: ctx.claims,
    })
}
