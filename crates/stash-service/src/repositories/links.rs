//! Links repository for database operations.
//!
//! Every query is filtered by `team_id`; callers must have passed the team
//! scoping guard for that team.

use crate::errors::StashError;
use crate::models::Link;
use crate::observability::metrics;
use chrono::Utc;
use sqlx::SqlitePool;
use std::time::Instant;
use tracing::instrument;

/// Upper bound on links returned by one listing.
pub const MAX_LIST_LIMIT: i64 = 100;

/// Links repository for database operations.
pub struct LinksRepository;

impl LinksRepository {
    /// List a team's links, newest first.
    #[instrument(skip_all, name = "stash.repo.list_links")]
    pub async fn list_for_team(pool: &SqlitePool, team_id: &str) -> Result<Vec<Link>, StashError> {
        let start = Instant::now();

        let links = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, team_id, url, title, created_by, created_at
            FROM links
            WHERE team_id = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(team_id)
        .bind(MAX_LIST_LIMIT)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("list_links", "error", start.elapsed());
            StashError::Database(format!("Failed to list links: {}", e))
        })?;

        metrics::record_db_query("list_links", "success", start.elapsed());

        Ok(links)
    }

    /// Save a link for a team.
    #[instrument(skip_all, name = "stash.repo.create_link")]
    pub async fn create(
        pool: &SqlitePool,
        team_id: &str,
        url: &str,
        title: Option<&str>,
        created_by: i64,
    ) -> Result<Link, StashError> {
        let start = Instant::now();

        let link = sqlx::query_as::<_, Link>(
            r#"
            INSERT INTO links (team_id, url, title, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, team_id, url, title, created_by, created_at
            "#,
        )
        .bind(team_id) // $1
        .bind(url) // $2
        .bind(title) // $3
        .bind(created_by) // $4
        .bind(Utc::now()) // $5
        .fetch_one(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("create_link", "error", start.elapsed());
            StashError::Database(format!("Failed to create link: {}", e))
        })?;

        metrics::record_db_query("create_link", "success", start.elapsed());

        tracing::info!(target: "stash.repo.links", link_id = link.id, team_id = %team_id, "Link saved");

        Ok(link)
    }
}
