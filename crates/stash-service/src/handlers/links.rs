//! Team link handlers.
//!
//! Both routes sit behind the full guard chain; by the time a handler runs
//! the `teamId` parameter has been checked against the token's team.

use crate::errors::StashError;
use crate::middleware::AuthContext;
use crate::models::{CreateLinkRequest, Link, LinkListResponse};
use crate::repositories::LinksRepository;
use crate::routes::AppState;
use axum::{extract::State, http::StatusCode, Extension, Json};
use std::sync::Arc;
use tracing::instrument;
use url::Url;

/// Maximum accepted URL length.
pub const MAX_URL_LENGTH: usize = 2048;

/// Maximum accepted title length, in characters.
pub const MAX_TITLE_LENGTH: usize = 500;

/// Handler for GET /api/v1/links?teamId=...
///
/// Lists the caller's team links, newest first.
#[instrument(skip_all, name = "stash.handlers.list_links")]
pub async fn list_links(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<LinkListResponse>, StashError> {
    let team_id = ctx.claims.team_id;
    let links = LinksRepository::list_for_team(&state.pool, &team_id).await?;

    Ok(Json(LinkListResponse { team_id, links }))
}

/// Handler for POST /api/v1/links?teamId=...
///
/// Saves a link for the caller's team. Returns 201 with the created link.
#[instrument(skip_all, name = "stash.handlers.create_link")]
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<Link>), StashError> {
    let url = validate_url(&body.url)?;
    let title = validate_title(body.title.as_deref())?;

    let link = LinksRepository::create(
        &state.pool,
        &ctx.claims.team_id,
        url.as_str(),
        title,
        ctx.user.id,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(link)))
}

/// Parse a link URL. Only absolute http(s) URLs are accepted.
pub fn validate_url(raw: &str) -> Result<Url, StashError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(StashError::BadRequest("url must not be empty".to_string()));
    }
    if raw.len() > MAX_URL_LENGTH {
        return Err(StashError::BadRequest(format!(
            "url must be at most {MAX_URL_LENGTH} bytes"
        )));
    }

    let url = Url::parse(raw)
        .map_err(|e| StashError::BadRequest(format!("url is not valid: {e}")))?;

    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        "http" | "https" => Err(StashError::BadRequest("url must have a host".to_string())),
        other => Err(StashError::BadRequest(format!(
            "url scheme must be http or https, got {other}"
        ))),
    }
}

/// Trim a title; blank titles are stored as absent.
fn validate_title(title: Option<&str>) -> Result<Option<&str>, StashError> {
    let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };

    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(StashError::BadRequest(format!(
            "title must be at most {MAX_TITLE_LENGTH} characters"
        )));
    }

    Ok(Some(title))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_accepts_http_and_https() {
        assert_eq!(
            validate_url("https://example.com/a?b=c").unwrap().as_str(),
            "https://example.com/a?b=c"
        );
        assert_eq!(
            validate_url("  http://example.com  ").unwrap().as_str(),
            "http://example.com/"
        );
    }

    #[test]
    fn test_validate_url_rejects_other_schemes() {
        for raw in ["ftp://example.com", "javascript:alert(1)", "file:///etc/passwd"] {
            assert!(
                matches!(validate_url(raw), Err(StashError::BadRequest(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_url_rejects_garbage() {
        assert!(matches!(validate_url(""), Err(StashError::BadRequest(_))));
        assert!(matches!(validate_url("not a url"), Err(StashError::BadRequest(_))));
        assert!(matches!(validate_url("/relative/path"), Err(StashError::BadRequest(_))));
    }

    #[test]
    fn test_validate_url_rejects_oversized() {
        let raw = format!("https://example.com/{}", "a".repeat(MAX_URL_LENGTH));
        assert!(matches!(validate_url(&raw), Err(StashError::BadRequest(_))));
    }

    #[test]
    fn test_validate_title() {
        assert_eq!(validate_title(None).unwrap(), None);
        assert_eq!(validate_title(Some("   ")).unwrap(), None);
        assert_eq!(validate_title(Some(" Rust book ")).unwrap(), Some("Rust book"));
        assert!(validate_title(Some(&"x".repeat(MAX_TITLE_LENGTH + 1))).is_err());
    }
}
