//! Wiremock-backed JWKS endpoint.
//!
//! Serves `{"keys": [...]}` at `/jwks/`, the path the service derives from
//! an Authentik-style issuer.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the JWKS document is served on.
pub const JWKS_PATH: &str = "/jwks/";

/// Mock identity provider JWKS endpoint.
pub struct MockJwks {
    server: MockServer,
}

impl MockJwks {
    /// Start a mock server publishing `keys`.
    pub async fn start(keys: &[serde_json::Value]) -> Self {
        let mock = Self::start_empty().await;
        mock.publish(keys).await;
        mock
    }

    /// Start a mock server with nothing mounted (every request is a 404).
    pub async fn start_empty() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Serve `keys` on every request, replacing anything mounted before.
    ///
    /// Also clears the request journal used by [`MockJwks::request_count`].
    pub async fn publish(&self, keys: &[serde_json::Value]) {
        self.server.reset().await;
        self.mount_keys(keys).await;
    }

    /// Mount `keys` as the fallback response, keeping other mocks in place.
    pub async fn mount_keys(&self, keys: &[serde_json::Value]) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "keys": keys })),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer the next `times` requests with `status`, ahead of any mounted keys.
    pub async fn fail_next(&self, times: u64, status: u16) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .up_to_n_times(times)
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Full JWKS URL to configure the service with.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Number of JWKS requests received so far.
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| {
                requests
                    .iter()
                    .filter(|r| r.url.path() == JWKS_PATH)
                    .count()
            })
            .unwrap_or(0)
    }
}
