//! Health check handler.
//!
//! `/health` reports whether the service can reach its database.

use crate::models::HealthResponse;
use crate::observability::metrics;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;
use std::time::Instant;

/// Health check handler.
///
/// Returns 200 with `{"status":"healthy","database":"healthy"}` when the
/// database answers a ping, 503 otherwise. The database error is logged,
/// not returned.
#[tracing::instrument(skip_all, name = "stash.health")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let start = Instant::now();
    let db_check = sqlx::query("SELECT 1").execute(&state.pool).await;

    match db_check {
        Ok(_) => {
            metrics::record_db_query("ping", "success", start.elapsed());
            (
                StatusCode::OK,
                Json(HealthResponse {
                    status: "healthy".to_string(),
                    database: "healthy".to_string(),
                }),
            )
        }
        Err(e) => {
            metrics::record_db_query("ping", "error", start.elapsed());
            tracing::warn!(target: "stash.health", error = %e, "Health check failed: database error");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    database: "unhealthy".to_string(),
                }),
            )
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            database: "healthy".to_string(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["database"], "healthy");
    }
}
