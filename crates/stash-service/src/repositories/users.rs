//! Users repository for database operations.
//!
//! Local users mirror identity provider subjects. A user row is created the
//! first time a subject presents a valid token and refreshed on later
//! requests.
//!
//! # Concurrency
//!
//! `find_or_create` is a single `INSERT ... ON CONFLICT DO UPDATE` statement
//! on the unique `external_id`, so concurrent first requests for the same
//! subject converge on one row.

use crate::errors::StashError;
use crate::models::User;
use crate::observability::metrics;
use chrono::Utc;
use sqlx::SqlitePool;
use std::time::Instant;
use tracing::instrument;

/// Users repository for database operations.
pub struct UsersRepository;

impl UsersRepository {
    /// Find the user for `external_id`, creating it if absent.
    ///
    /// An existing row gets its `display_name`, `email` and `updated_at`
    /// refreshed from the latest token; `id` and `created_at` never change.
    #[instrument(skip_all, name = "stash.repo.find_or_create_user")]
    pub async fn find_or_create(
        pool: &SqlitePool,
        external_id: &str,
        display_name: &str,
        email: Option<&str>,
    ) -> Result<User, StashError> {
        let start = Instant::now();
        let now = Utc::now();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (external_id, display_name, email, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (external_id) DO UPDATE SET
                display_name = excluded.display_name,
                email = excluded.email,
                updated_at = excluded.updated_at
            RETURNING id, external_id, display_name, email, created_at, updated_at
            "#,
        )
        .bind(external_id) // $1
        .bind(display_name) // $2
        .bind(email) // $3
        .bind(now) // $4
        .fetch_one(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("upsert_user", "error", start.elapsed());
            StashError::Database(format!("Failed to upsert user: {}", e))
        })?;

        metrics::record_db_query("upsert_user", "success", start.elapsed());

        tracing::debug!(target: "stash.repo.users", user_id = user.id, "Resolved local user");

        Ok(user)
    }
}
