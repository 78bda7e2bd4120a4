//! # Stash Test Utilities
//!
//! Shared test utilities for the TeamStash service.
//!
//! This crate provides:
//! - RSA signing fixtures (`TestKeypair`)
//! - Token claim builders (`TestTokenBuilder`)
//! - A wiremock-backed JWKS endpoint (`MockJwks`)
//! - Server test harness (`TestStashServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stash_test_utils::*;
//!
//! #[sqlx::test(migrations = "../../migrations")]
//! async fn test_example(pool: SqlitePool) -> Result<()> {
//!     let keypair = TestKeypair::primary("k1");
//!     let jwks = MockJwks::start(&[keypair.jwk_json()]).await;
//!     let server = TestStashServer::spawn(pool, &jwks.jwks_url()).await?;
//!
//!     let token = keypair.sign(&TestTokenBuilder::new().with_scope("links:read").build());
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/v1/links?teamId=web01", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_mock;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_mock::*;
pub use server_harness::*;
pub use token_builders::*;
