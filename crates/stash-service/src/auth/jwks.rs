//! JWKS client for fetching and caching the identity provider's public keys.
//!
//! The JWKS (JSON Web Key Set) client fetches public keys from the provider's
//! JWKS endpoint and caches them with a configurable TTL.
//!
//! # Refresh policy
//!
//! - A cached document is served until its TTL expires
//! - A `kid` missing from a fresh document forces a refetch (key rotation)
//! - Each fetch attempt is bounded by a timeout; failed attempts are retried
//!   with exponential backoff (`base * 2^(attempt-1)`)
//! - Refreshes are single-flight: concurrent misses wait for one fetch
//!
//! # Concurrency
//!
//! The cached document is an immutable `Arc` snapshot. A refresh builds a
//! complete new snapshot and swaps it in under the write lock, so readers
//! see either the old or the new document, never a partial one.

use crate::config::Config;
use crate::errors::AuthError;
use crate::observability::metrics;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::instrument;

/// Default cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default per-attempt fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Default number of fetch attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for retry backoff.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// JSON Web Key from the JWKS endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    /// Key type ("RSA" for RS256).
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    pub kid: String,

    /// Algorithm (should be "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded).
    #[serde(default)]
    pub e: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// Usable JSON Web Keys. Entries that do not parse as a [`Jwk`] (for
    /// example a key without a `kid`) are skipped, not fatal.
    #[serde(deserialize_with = "deserialize_usable_keys")]
    pub keys: Vec<Jwk>,
}

fn deserialize_usable_keys<'de, D>(deserializer: D) -> Result<Vec<Jwk>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    let total = raw.len();

    let keys: Vec<Jwk> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<Jwk>(value) {
            Ok(jwk) if !jwk.kid.is_empty() => Some(jwk),
            Ok(_) => {
                tracing::warn!(target: "stash.auth.jwks", index = index, "Skipping JWK with empty kid");
                None
            }
            Err(e) => {
                tracing::warn!(target: "stash.auth.jwks", index = index, error = %e, "Skipping unusable JWK");
                None
            }
        })
        .collect();

    if keys.len() < total {
        tracing::debug!(
            target: "stash.auth.jwks",
            usable = keys.len(),
            total = total,
            "JWKS document contained unusable keys"
        );
    }

    Ok(keys)
}

/// Failure of a single fetch attempt.
#[derive(Debug, Error)]
pub enum JwksFetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("endpoint returned HTTP {0}")]
    Status(u16),

    #[error("invalid JWKS document: {0}")]
    Parse(String),

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
}

impl JwksFetchError {
    fn label(&self) -> &'static str {
        match self {
            JwksFetchError::Transport(_) => "transport",
            JwksFetchError::Status(_) => "status",
            JwksFetchError::Parse(_) => "parse",
            JwksFetchError::Timeout(_) => "timeout",
        }
    }
}

/// Retrieves a JWKS document. One call is one attempt.
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<JwksResponse, JwksFetchError>;
}

/// [`JwksFetcher`] backed by `reqwest`.
pub struct HttpJwksFetcher {
    http_client: reqwest::Client,
}

impl HttpJwksFetcher {
    pub fn new() -> Self {
        // Per-attempt timeouts are applied by the caller; only bound the connect here.
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "stash.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self { http_client }
    }
}

impl Default for HttpJwksFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    async fn fetch(&self, url: &str) -> Result<JwksResponse, JwksFetchError> {
        let response = self
            .http_client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| JwksFetchError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(JwksFetchError::Status(response.status().as_u16()));
        }

        // Read the whole body before parsing so a truncated body is a parse failure.
        let body = response
            .bytes()
            .await
            .map_err(|e| JwksFetchError::Transport(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| JwksFetchError::Parse(e.to_string()))
    }
}

/// Tunables for [`JwksClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwksSettings {
    pub cache_ttl: Duration,
    pub fetch_timeout: Duration,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
}

impl Default for JwksSettings {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

impl JwksSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_ttl: config.jwks_cache_ttl,
            fetch_timeout: config.jwks_fetch_timeout,
            max_attempts: config.jwks_max_attempts,
            retry_base_delay: config.jwks_retry_base_delay,
        }
    }
}

/// Delay to wait after failed attempt number `failed_attempt` (1-based).
fn backoff_delay(base: Duration, failed_attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(failed_attempt.saturating_sub(1));
    base.saturating_mul(factor)
}

/// Cached JWKS snapshot.
struct CachedJwks {
    /// Map of key ID to JWK.
    keys: HashMap<String, Jwk>,

    /// When this snapshot expires.
    expires_at: Instant,

    /// Incremented on every successful refresh.
    generation: u64,
}

impl CachedJwks {
    fn is_fresh(&self) -> bool {
        self.expires_at > Instant::now()
    }
}

/// JWKS client for fetching and caching public keys.
///
/// Owned explicitly and shared via `Arc`; there is no process-global cache.
pub struct JwksClient {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    fetcher: Arc<dyn JwksFetcher>,

    settings: JwksSettings,

    /// Current snapshot, swapped wholesale on refresh.
    cache: RwLock<Option<Arc<CachedJwks>>>,

    /// Serializes refreshes (single-flight).
    refresh_lock: Mutex<()>,
}

impl JwksClient {
    /// Create a JWKS client with default settings and an HTTP fetcher.
    pub fn new(jwks_url: String) -> Self {
        Self::with_settings(jwks_url, JwksSettings::default())
    }

    /// Create a JWKS client with custom settings and an HTTP fetcher.
    pub fn with_settings(jwks_url: String, settings: JwksSettings) -> Self {
        Self::with_fetcher(jwks_url, settings, Arc::new(HttpJwksFetcher::new()))
    }

    /// Create a JWKS client with a custom fetcher.
    pub fn with_fetcher(
        jwks_url: String,
        settings: JwksSettings,
        fetcher: Arc<dyn JwksFetcher>,
    ) -> Self {
        Self {
            jwks_url,
            fetcher,
            settings,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Get a JWK by key ID.
    ///
    /// Serves from cache while the snapshot is fresh. A cache miss (no
    /// snapshot, expired snapshot, or unknown `kid`) triggers a refresh.
    ///
    /// # Errors
    ///
    /// - `AuthError::KeyNotFound` if `kid` is absent from a fresh document
    /// - `AuthError::JwksFetchFailed` if every fetch attempt failed
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, AuthError> {
        let observed = self.snapshot().await;

        if let Some(cached) = observed.as_ref().filter(|c| c.is_fresh()) {
            if let Some(key) = cached.keys.get(kid) {
                tracing::debug!(target: "stash.auth.jwks", kid = %kid, "JWKS cache hit");
                metrics::record_jwks_cache("hit");
                return Ok(key.clone());
            }
            tracing::debug!(target: "stash.auth.jwks", kid = %kid, "Key not in cached JWKS, forcing refresh");
        }
        metrics::record_jwks_cache("miss");

        let refreshed = self.refresh(observed.map(|c| c.generation)).await?;

        refreshed.keys.get(kid).cloned().ok_or_else(|| {
            tracing::warn!(target: "stash.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
            AuthError::KeyNotFound
        })
    }

    /// Force refresh the cache regardless of TTL.
    #[cfg(test)]
    pub async fn force_refresh(&self) -> Result<(), AuthError> {
        let current = self.snapshot().await.map(|c| c.generation);
        self.refresh(current).await.map(|_| ())
    }

    /// Clear the cache.
    #[cfg(test)]
    pub async fn clear_cache(&self) {
        *self.cache.write().await = None;
    }

    async fn snapshot(&self) -> Option<Arc<CachedJwks>> {
        self.cache.read().await.clone()
    }

    /// Replace the cached document, unless another task already did so
    /// after `observed_generation` was read.
    #[instrument(skip(self))]
    async fn refresh(&self, observed_generation: Option<u64>) -> Result<Arc<CachedJwks>, AuthError> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.snapshot().await;
        if let Some(current) = current.as_ref() {
            if Some(current.generation) != observed_generation && current.is_fresh() {
                tracing::debug!(target: "stash.auth.jwks", "JWKS refreshed by concurrent request");
                return Ok(Arc::clone(current));
            }
        }

        let jwks = self.fetch_with_retry().await?;

        let keys: HashMap<String, Jwk> = jwks
            .keys
            .into_iter()
            .map(|key| (key.kid.clone(), key))
            .collect();

        let cached = Arc::new(CachedJwks {
            keys,
            expires_at: Instant::now() + self.settings.cache_ttl,
            generation: current.map_or(1, |c| c.generation + 1),
        });

        tracing::info!(
            target: "stash.auth.jwks",
            key_count = cached.keys.len(),
            generation = cached.generation,
            "JWKS cache refreshed"
        );

        *self.cache.write().await = Some(Arc::clone(&cached));

        Ok(cached)
    }

    /// Fetch the JWKS document, retrying with exponential backoff.
    ///
    /// A timed-out attempt is dropped, so a response arriving after the
    /// deadline is never used.
    async fn fetch_with_retry(&self) -> Result<JwksResponse, AuthError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = backoff_delay(self.settings.retry_base_delay, attempt - 1);
                tracing::debug!(
                    target: "stash.auth.jwks",
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before next JWKS fetch attempt"
                );
                tokio::time::sleep(delay).await;
            }

            tracing::debug!(target: "stash.auth.jwks", url = %self.jwks_url, attempt = attempt, "Fetching JWKS");

            let start = Instant::now();
            let outcome = tokio::time::timeout(
                self.settings.fetch_timeout,
                self.fetcher.fetch(&self.jwks_url),
            )
            .await
            .unwrap_or(Err(JwksFetchError::Timeout(self.settings.fetch_timeout)));

            match outcome {
                Ok(jwks) => {
                    metrics::record_jwks_fetch("success", start.elapsed());
                    return Ok(jwks);
                }
                Err(e) => {
                    metrics::record_jwks_fetch(e.label(), start.elapsed());
                    tracing::warn!(
                        target: "stash.auth.jwks",
                        attempt = attempt,
                        max_attempts = max_attempts,
                        error = %e,
                        "JWKS fetch attempt failed"
                    );
                    last_error = e.to_string();
                }
            }
        }

        tracing::error!(
            target: "stash.auth.jwks",
            attempts = max_attempts,
            error = %last_error,
            "Failed to fetch JWKS"
        );
        Err(AuthError::JwksFetchFailed(last_error))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rsa_jwk(kid: &str) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            kid: kid.to_string(),
            alg: Some("RS256".to_string()),
            key_use: Some("sig".to_string()),
            n: Some("modulus".to_string()),
            e: Some("AQAB".to_string()),
        }
    }

    fn doc(kids: &[&str]) -> JwksResponse {
        JwksResponse {
            keys: kids.iter().map(|kid| rsa_jwk(kid)).collect(),
        }
    }

    enum Step {
        Respond(JwksResponse),
        Fail(u16),
        Hang,
    }

    /// Scripted fetcher; replays steps in order and repeats the last one.
    struct ScriptedFetcher {
        steps: std::sync::Mutex<VecDeque<Step>>,
        last: std::sync::Mutex<Option<JwksResponse>>,
        calls: AtomicUsize,
        latency: Duration,
    }

    impl ScriptedFetcher {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Self::with_latency(steps, Duration::ZERO)
        }

        fn with_latency(steps: Vec<Step>, latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                steps: std::sync::Mutex::new(steps.into()),
                last: std::sync::Mutex::new(None),
                calls: AtomicUsize::new(0),
                latency,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JwksFetcher for ScriptedFetcher {
        async fn fetch(&self, _url: &str) -> Result<JwksResponse, JwksFetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Respond(jwks)) => {
                    *self.last.lock().unwrap() = Some(jwks.clone());
                    Ok(jwks)
                }
                Some(Step::Fail(status)) => Err(JwksFetchError::Status(status)),
                Some(Step::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(JwksFetchError::Transport("unreachable".to_string()))
                }
                None => self
                    .last
                    .lock()
                    .unwrap()
                    .clone()
                    .ok_or_else(|| JwksFetchError::Transport("script exhausted".to_string())),
            }
        }
    }

    fn client(fetcher: Arc<ScriptedFetcher>) -> JwksClient {
        JwksClient::with_fetcher(
            "https://issuer.example/jwks/".to_string(),
            JwksSettings::default(),
            fetcher,
        )
    }

    #[test]
    fn test_jwk_deserialization() {
        let json = r#"{
            "kty": "RSA",
            "kid": "k1",
            "alg": "RS256",
            "use": "sig",
            "n": "pKZg71R-gjFq",
            "e": "AQAB",
            "x5c": ["ignored"]
        }"#;

        let jwk: Jwk = serde_json::from_str(json).unwrap();

        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.kid, "k1");
        assert_eq!(jwk.alg.as_deref(), Some("RS256"));
        assert_eq!(jwk.key_use.as_deref(), Some("sig"));
        assert_eq!(jwk.n.as_deref(), Some("pKZg71R-gjFq"));
        assert_eq!(jwk.e.as_deref(), Some("AQAB"));
    }

    #[test]
    fn test_jwk_deserialization_minimal() {
        let jwk: Jwk = serde_json::from_str(r#"{"kty": "RSA", "kid": "k2"}"#).unwrap();

        assert_eq!(jwk.kid, "k2");
        assert!(jwk.alg.is_none());
        assert!(jwk.key_use.is_none());
        assert!(jwk.n.is_none());
        assert!(jwk.e.is_none());
    }

    #[test]
    fn test_jwks_response_requires_keys_array() {
        assert!(serde_json::from_str::<JwksResponse>(r#"{"keys": "nope"}"#).is_err());
        assert!(serde_json::from_str::<JwksResponse>(r#"{}"#).is_err());
    }

    #[test]
    fn test_jwks_response_skips_unusable_keys() {
        let json = r#"{"keys": [
            {"kty": "RSA", "use": "sig", "n": "pKZg71R-gjFq", "e": "AQAB"},
            {"kty": "RSA", "kid": "", "n": "pKZg71R-gjFq", "e": "AQAB"},
            "not-a-key",
            {"kty": "RSA", "kid": "k1", "alg": "RS256", "n": "pKZg71R-gjFq", "e": "AQAB"}
        ]}"#;

        let jwks: JwksResponse = serde_json::from_str(json).unwrap();

        assert_eq!(jwks.keys.len(), 1);
        assert_eq!(jwks.keys[0].kid, "k1");
    }

    #[test]
    fn test_jwks_response_with_no_usable_keys_is_empty() {
        let jwks: JwksResponse =
            serde_json::from_str(r#"{"keys": [{"kty": "RSA"}]}"#).unwrap();

        assert!(jwks.keys.is_empty());
    }

    #[test]
    fn test_backoff_delay_doubles() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(2000));
    }

    #[test]
    fn test_backoff_delay_saturates() {
        let delay = backoff_delay(Duration::from_secs(u64::MAX / 2), 40);
        assert_eq!(delay, Duration::MAX);
    }

    #[test]
    fn test_default_settings() {
        let settings = JwksSettings::default();
        assert_eq!(settings.cache_ttl, Duration::from_secs(300));
        assert_eq!(settings.fetch_timeout, Duration::from_millis(5_000));
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.retry_base_delay, Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_lookup_within_ttl_is_cache_served() {
        let fetcher = ScriptedFetcher::new(vec![Step::Respond(doc(&["k1"]))]);
        let client = client(fetcher.clone());

        assert_eq!(client.get_key("k1").await.unwrap().kid, "k1");
        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(client.get_key("k1").await.unwrap().kid, "k1");

        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_cache_is_refetched() {
        let fetcher = ScriptedFetcher::new(vec![
            Step::Respond(doc(&["k1"])),
            Step::Respond(doc(&["k1"])),
        ]);
        let client = client(fetcher.clone());

        client.get_key("k1").await.unwrap();
        tokio::time::advance(Duration::from_secs(301)).await;
        client.get_key("k1").await.unwrap();

        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_kid_forces_refresh_within_ttl() {
        let fetcher = ScriptedFetcher::new(vec![
            Step::Respond(doc(&["k1"])),
            Step::Respond(doc(&["k1"])),
        ]);
        let client = client(fetcher.clone());

        client.get_key("k1").await.unwrap();
        let result = client.get_key("k-unknown").await;

        assert_eq!(result, Err(AuthError::KeyNotFound));
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotated_key_is_found_after_forced_refresh() {
        let fetcher = ScriptedFetcher::new(vec![
            Step::Respond(doc(&["k1"])),
            Step::Respond(doc(&["k1", "k2"])),
        ]);
        let client = client(fetcher.clone());

        client.get_key("k1").await.unwrap();
        assert_eq!(client.get_key("k2").await.unwrap().kid, "k2");

        // Both keys now served from the new snapshot.
        client.get_key("k1").await.unwrap();
        client.get_key("k2").await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_backoff_then_succeeds() {
        let fetcher = ScriptedFetcher::new(vec![
            Step::Fail(503),
            Step::Fail(502),
            Step::Respond(doc(&["k1"])),
        ]);
        let client = client(fetcher.clone());

        let start = Instant::now();
        let key = client.get_key("k1").await.unwrap();

        assert_eq!(key.kid, "k1");
        assert_eq!(fetcher.calls(), 3);
        assert!(start.elapsed() >= Duration::from_millis(1500));
        assert!(start.elapsed() < Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_attempts_fail() {
        let fetcher = ScriptedFetcher::new(vec![Step::Fail(500), Step::Fail(500), Step::Fail(503)]);
        let client = client(fetcher.clone());

        let start = Instant::now();
        let result = client.get_key("k1").await;

        match result {
            Err(AuthError::JwksFetchFailed(msg)) => assert!(msg.contains("503"), "got {msg}"),
            other => panic!("expected JwksFetchFailed, got {other:?}"),
        }
        assert_eq!(fetcher.calls(), 3);
        // No sleep after the final attempt.
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_counts_as_failure() {
        let fetcher = ScriptedFetcher::new(vec![Step::Hang, Step::Respond(doc(&["k1"]))]);
        let client = client(fetcher.clone());

        let start = Instant::now();
        client.get_key("k1").await.unwrap();

        assert_eq!(fetcher.calls(), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(5_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_exhaust_attempts() {
        let fetcher = ScriptedFetcher::new(vec![Step::Hang, Step::Hang, Step::Hang]);
        let client = client(fetcher.clone());

        let result = client.get_key("k1").await;

        match result {
            Err(AuthError::JwksFetchFailed(msg)) => assert!(msg.contains("timed out"), "got {msg}"),
            other => panic!("expected JwksFetchFailed, got {other:?}"),
        }
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let fetcher = ScriptedFetcher::new(vec![
            Step::Respond(doc(&["k1"])),
            Step::Fail(500),
            Step::Fail(500),
            Step::Fail(500),
        ]);
        let client = client(fetcher.clone());

        client.get_key("k1").await.unwrap();
        assert!(matches!(
            client.get_key("k-unknown").await,
            Err(AuthError::JwksFetchFailed(_))
        ));

        // Known key still served from the untouched snapshot.
        assert_eq!(client.get_key("k1").await.unwrap().kid, "k1");
        assert_eq!(fetcher.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_fetch() {
        let fetcher = ScriptedFetcher::with_latency(
            vec![Step::Respond(doc(&["k1"]))],
            Duration::from_millis(100),
        );
        let client = Arc::new(client(fetcher.clone()));

        let lookups = (0..10).map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.get_key("k1").await })
        });
        for result in futures::future::join_all(lookups).await {
            assert_eq!(result.unwrap().unwrap().kid, "k1");
        }

        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_refresh_bypasses_ttl() {
        let fetcher = ScriptedFetcher::new(vec![
            Step::Respond(doc(&["k1"])),
            Step::Respond(doc(&["k2"])),
        ]);
        let client = client(fetcher.clone());

        client.get_key("k1").await.unwrap();
        client.force_refresh().await.unwrap();

        assert_eq!(fetcher.calls(), 2);
        assert_eq!(client.get_key("k2").await.unwrap().kid, "k2");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cache_forces_fetch() {
        let fetcher = ScriptedFetcher::new(vec![Step::Respond(doc(&["k1"]))]);
        let client = client(fetcher.clone());

        client.get_key("k1").await.unwrap();
        client.clear_cache().await;
        client.get_key("k1").await.unwrap();

        assert_eq!(fetcher.calls(), 2);
    }
}
