//! Verified token claims.
//!
//! [`TokenClaims`] is only ever built from a payload whose signature, issuer,
//! audience and expiry have already been verified. [`TokenClaims::from_payload`]
//! then checks the payload shape and collects every violation into one
//! `AuthError::InvalidClaims` message.
//!
//! The `sub` and `email` fields are redacted in Debug output.

use crate::errors::AuthError;
use common::jwt::{scope_contains, split_scopes};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::fmt;

/// Claims extracted from a verified access token.
#[derive(Clone, Serialize, PartialEq)]
pub struct TokenClaims {
    /// Subject: the provider's user identifier. Redacted in Debug output.
    pub sub: String,

    /// Issuer.
    pub iss: String,

    /// Audience, normalized to the configured audience.
    pub aud: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: Number,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: Number,

    /// Team the token was issued for.
    pub team_id: String,

    pub roles: Vec<String>,

    /// Space-separated scopes granted to this token.
    pub scope: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Redacted in Debug output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

impl fmt::Debug for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClaims")
            .field("sub", &"[REDACTED]")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("team_id", &self.team_id)
            .field("roles", &self.roles)
            .field("scope", &self.scope)
            .field("jti", &self.jti)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("name", &self.name)
            .field("nickname", &self.nickname)
            .finish()
    }
}

impl TokenClaims {
    /// Check if the token has a specific scope.
    ///
    /// Scopes are space-separated in the token claims.
    pub fn has_scope(&self, scope: &str) -> bool {
        scope_contains(&self.scope, scope)
    }

    /// Get all scopes as a vector.
    pub fn scopes(&self) -> Vec<&str> {
        split_scopes(&self.scope)
    }

    /// Name shown for a local user: `name`, then `nickname`, then `email`,
    /// then `sub`. Empty values are skipped.
    pub fn display_name(&self) -> &str {
        [&self.name, &self.nickname, &self.email]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|s| !s.trim().is_empty())
            .unwrap_or(&self.sub)
    }

    /// Build claims from a verified payload.
    ///
    /// `expected_audience` is the configured audience; an audience list is
    /// normalized to it. The caller has already checked the list contains it.
    ///
    /// # Errors
    ///
    /// `AuthError::InvalidClaims` listing every shape violation as
    /// `"<field>: <reason>"`, joined with `"; "`.
    pub fn from_payload(payload: &Value, expected_audience: &str) -> Result<Self, AuthError> {
        let Some(obj) = payload.as_object() else {
            return Err(AuthError::InvalidClaims(
                "payload: expected a JSON object".to_string(),
            ));
        };

        let mut issues = Vec::new();

        let sub = required_string(obj, "sub", &mut issues);
        let iss = required_string(obj, "iss", &mut issues);
        let aud = audience(obj, expected_audience, &mut issues);
        let exp = required_number(obj, "exp", &mut issues);
        let iat = required_number(obj, "iat", &mut issues);
        let team_id = required_string(obj, "team_id", &mut issues);
        let roles = string_array(obj, "roles", &mut issues);
        let scope = required_string(obj, "scope", &mut issues);
        let jti = optional_string(obj, "jti", &mut issues);
        let email = optional_string(obj, "email", &mut issues);
        let name = optional_string(obj, "name", &mut issues);
        let nickname = optional_string(obj, "nickname", &mut issues);

        match (sub, iss, aud, exp, iat, team_id, roles, scope) {
            (
                Some(sub),
                Some(iss),
                Some(aud),
                Some(exp),
                Some(iat),
                Some(team_id),
                Some(roles),
                Some(scope),
            ) if issues.is_empty() => Ok(Self {
                sub,
                iss,
                aud,
                exp,
                iat,
                team_id,
                roles,
                scope,
                jti,
                email,
                name,
                nickname,
            }),
            _ => Err(AuthError::InvalidClaims(issues.join("; "))),
        }
    }
}

fn required_string(obj: &Map<String, Value>, field: &str, issues: &mut Vec<String>) -> Option<String> {
    match obj.get(field) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            issues.push(format!("{field}: expected a string"));
            None
        }
        None => {
            issues.push(format!("{field}: missing"));
            None
        }
    }
}

fn optional_string(obj: &Map<String, Value>, field: &str, issues: &mut Vec<String>) -> Option<String> {
    match obj.get(field) {
        None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            issues.push(format!("{field}: expected a string"));
            None
        }
    }
}

fn required_number(obj: &Map<String, Value>, field: &str, issues: &mut Vec<String>) -> Option<Number> {
    match obj.get(field) {
        Some(Value::Number(n)) => Some(n.clone()),
        Some(_) => {
            issues.push(format!("{field}: expected a number"));
            None
        }
        None => {
            issues.push(format!("{field}: missing"));
            None
        }
    }
}

fn string_array(obj: &Map<String, Value>, field: &str, issues: &mut Vec<String>) -> Option<Vec<String>> {
    match obj.get(field) {
        Some(Value::Array(items)) => {
            let strings: Vec<String> = items
                .iter()
                .filter_map(|v| v.as_str().map(ToString::to_string))
                .collect();
            if strings.len() == items.len() {
                Some(strings)
            } else {
                issues.push(format!("{field}: expected an array of strings"));
                None
            }
        }
        Some(_) => {
            issues.push(format!("{field}: expected an array of strings"));
            None
        }
        None => {
            issues.push(format!("{field}: missing"));
            None
        }
    }
}

fn audience(obj: &Map<String, Value>, expected: &str, issues: &mut Vec<String>) -> Option<String> {
    match obj.get("aud") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(items)) => {
            if !items.iter().all(Value::is_string) {
                issues.push("aud: expected a string or an array of strings".to_string());
                return None;
            }
            if items.iter().any(|v| v.as_str() == Some(expected)) {
                Some(expected.to_string())
            } else {
                issues.push("aud: expected audience not present".to_string());
                None
            }
        }
        Some(_) => {
            issues.push("aud: expected a string or an array of strings".to_string());
            None
        }
        None => {
            issues.push("aud: missing".to_string());
            None
        }
    }
}
