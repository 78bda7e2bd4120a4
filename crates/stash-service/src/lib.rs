//! TeamStash Service Library
//!
//! Token validation and authorization for the TeamStash backend:
//!
//! - JWKS fetching and caching with retry/backoff
//! - RS256 bearer token verification and claim shape validation
//! - Authorization guard chain (user resolution, team scoping, scope check)
//! - A small team-scoped link API that exercises the guards
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> handlers/*.rs -> repositories/*.rs
//!                        |
//!                  auth/jwt.rs -> auth/jwks.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - JWKS cache, token verifier, claims
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Guard chain and HTTP metrics
//! - `models` - Database rows and HTTP bodies
//! - `observability` - Metrics
//! - `repositories` - SQLite access
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
