//! HTTP routes for the stash service.
//!
//! Defines the Axum router and application state.

use crate::auth::{JwksClient, JwksSettings, JwtValidator};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{
    http_metrics_middleware, require_auth, require_scope, require_team, AuthState, RequiredScope,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Scope required to list a team's links.
pub const LINKS_READ_SCOPE: &str = "links:read";

/// Scope required to save a link.
pub const LINKS_WRITE_SCOPE: &str = "links:write";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: SqlitePool,

    /// Service configuration.
    pub config: Config,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Database-backed health check - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/v1/me` - Current user - authentication
/// - `GET /api/v1/links?teamId=` - authentication, team scoping, `links:read`
/// - `POST /api/v1/links?teamId=` - authentication, team scoping, `links:write`
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    // One JWKS cache per process, shared by every request through the validator
    let jwks_client = Arc::new(JwksClient::with_settings(
        state.config.jwks_url.clone(),
        JwksSettings::from_config(&state.config),
    ));
    let jwt_validator = Arc::new(JwtValidator::new(
        jwks_client,
        state.config.oidc_issuer.clone(),
        state.config.oidc_audience.clone(),
    ));
    let auth_state = Arc::new(AuthState {
        jwt_validator,
        pool: state.pool.clone(),
    });

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Team-scoped routes. route_layer wraps outside-in, so the last layer
    // added runs first: team scoping, then the per-method scope check.
    let team_routes = Router::new()
        .route(
            "/api/v1/links",
            get(handlers::list_links)
                .route_layer(middleware::from_fn_with_state(
                    RequiredScope(LINKS_READ_SCOPE),
                    require_scope,
                ))
                .merge(post(handlers::create_link).route_layer(
                    middleware::from_fn_with_state(RequiredScope(LINKS_WRITE_SCOPE), require_scope),
                )),
        )
        .route_layer(middleware::from_fn(require_team));

    // Protected routes (authentication and user resolution required)
    let protected_routes = Router::new()
        .route("/api/v1/me", get(handlers::get_me))
        .merge(team_routes)
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
