//! Authentication module for the stash service.
//!
//! This module handles bearer token validation against the identity
//! provider's JWKS endpoint.
//!
//! # Components
//!
//! - `jwks` - JWKS client for fetching and caching public keys
//! - `jwt` - JWT validation using cached JWKS keys
//! - `claims` - Verified claims and their shape validation

pub mod claims;
pub mod jwks;
pub mod jwt;

pub use claims::TokenClaims;
pub use jwks::{JwksClient, JwksSettings};
pub use jwt::JwtValidator;
