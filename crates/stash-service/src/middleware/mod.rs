//! Middleware for the stash service.
//!
//! # Components
//!
//! - `auth` - Authorization guard chain for protected routes
//! - `http_metrics` - HTTP request metrics middleware

pub mod auth;
pub mod http_metrics;

pub use auth::{
    check_scope, check_team, extract_bearer_token, require_auth, require_scope, require_team,
    AuthContext, AuthState, RequiredScope,
};
pub use http_metrics::http_metrics_middleware;
