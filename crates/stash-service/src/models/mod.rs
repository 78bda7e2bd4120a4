//! Stash service models.
//!
//! Database rows and HTTP request/response bodies.

use crate::auth::TokenClaims;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local user, keyed by the identity provider's subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,

    /// The token `sub`. Unique.
    pub external_id: String,

    pub display_name: String,

    pub email: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Saved link, owned by a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Link {
    pub id: i64,
    pub team_id: String,
    pub url: String,
    pub title: Option<String>,

    /// Local id of the user who saved it.
    pub created_by: i64,

    pub created_at: DateTime<Utc>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status ("healthy" or "unhealthy").
    pub status: String,

    /// Database connectivity status.
    pub database: String,
}

/// Response body of `GET /api/v1/me`.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub user: UserResponse,
    pub claims: TokenClaims,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub display_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Request body of `POST /api/v1/links`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLinkRequest {
    pub url: String,

    #[serde(default)]
    pub title: Option<String>,
}

/// Response body of `GET /api/v1/links`.
#[derive(Debug, Clone, Serialize)]
pub struct LinkListResponse {
    pub team_id: String,
    pub links: Vec<Link>,
}
