//! Builder patterns for test data construction
//!
//! Provides a fluent API for creating token claims.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Issuer the test server trusts.
pub const TEST_ISSUER: &str = "https://auth.teamstash.test/application/o/teamstash/";

/// Audience the test server expects.
pub const TEST_AUDIENCE: &str = "teamstash-api";

/// Builder for creating test JWT claims
///
/// Defaults form a token the test server accepts: trusted issuer, expected
/// audience, one hour of validity, team `web01`.
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new()
///     .for_user("u1")
///     .with_team("web01")
///     .with_scope("links:read links:write")
///     .build();
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        let claims = json!({
            "sub": "test-subject",
            "iss": TEST_ISSUER,
            "aud": TEST_AUDIENCE,
            "exp": (now + Duration::seconds(3600)).timestamp(),
            "iat": now.timestamp(),
            "team_id": "web01",
            "roles": ["member"],
            "scope": "",
        });

        match claims {
            Value::Object(claims) => Self { claims },
            _ => unreachable!("json! object literal"),
        }
    }

    /// Set the subject
    pub fn for_user(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    /// Set the team
    pub fn with_team(self, team_id: &str) -> Self {
        self.with_claim("team_id", json!(team_id))
    }

    /// Set the scope (space-separated)
    pub fn with_scope(self, scope: &str) -> Self {
        self.with_claim("scope", json!(scope))
    }

    pub fn with_roles(self, roles: &[&str]) -> Self {
        self.with_claim("roles", json!(roles))
    }

    pub fn with_issuer(self, issuer: &str) -> Self {
        self.with_claim("iss", json!(issuer))
    }

    /// Set a single-string audience
    pub fn with_audience(self, audience: &str) -> Self {
        self.with_claim("aud", json!(audience))
    }

    /// Set a list audience
    pub fn with_audiences(self, audiences: &[&str]) -> Self {
        self.with_claim("aud", json!(audiences))
    }

    pub fn with_email(self, email: &str) -> Self {
        self.with_claim("email", json!(email))
    }

    pub fn with_name(self, name: &str) -> Self {
        self.with_claim("name", json!(name))
    }

    pub fn with_nickname(self, nickname: &str) -> Self {
        self.with_claim("nickname", json!(nickname))
    }

    /// Set expiration in seconds from now (negative for an expired token)
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("exp", json!(exp))
    }

    /// Set issued-at timestamp
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.with_claim("iat", json!(timestamp))
    }

    /// Set or replace an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim
    pub fn without(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
