//! Test server harness for E2E testing
//!
//! Provides `TestStashServer` for spawning real service instances in tests.

use crate::token_builders::{TEST_AUDIENCE, TEST_ISSUER};
use sqlx::SqlitePool;
use stash_service::config::Config;
use stash_service::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the stash service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[sqlx::test(migrations = "../../migrations")]
/// async fn test_health_flow_e2e(pool: SqlitePool) -> Result<()> {
///     let jwks = MockJwks::start(&[]).await;
///     let server = TestStashServer::spawn(pool, &jwks.jwks_url()).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestStashServer {
    addr: SocketAddr,
    pool: SqlitePool,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestStashServer {
    /// Spawn a server that trusts [`TEST_ISSUER`] / [`TEST_AUDIENCE`] and
    /// fetches keys from `jwks_url`.
    ///
    /// Retry backoff is shortened to keep failing-JWKS tests fast.
    pub async fn spawn(pool: SqlitePool, jwks_url: &str) -> Result<Self, anyhow::Error> {
        Self::spawn_with(pool, jwks_url, &[("JWKS_RETRY_BASE_DELAY_MS", "10")]).await
    }

    /// Spawn with extra environment-style configuration overrides.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn_with(
        pool: SqlitePool,
        jwks_url: &str,
        overrides: &[(&str, &str)],
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("DATABASE_URL".to_string(), "sqlite::memory:".to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("OIDC_ISSUER".to_string(), TEST_ISSUER.to_string()),
            ("OIDC_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
            ("OIDC_JWKS_URL".to_string(), jwks_url.to_string()),
        ]);
        for (name, value) in overrides {
            vars.insert((*name).to_string(), (*value).to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(AppState {
            pool: pool.clone(),
            config: config.clone(),
        });

        // Unregistered recorder: /metrics renders, nothing global is installed
        let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle();

        let app = routes::build_routes(state, metrics_handle);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            pool,
            config,
            _handle: handle,
        })
    }

    /// Get reference to the database pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestStashServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
