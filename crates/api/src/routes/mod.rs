pub mod health;
pub mod queries;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /queries                                submit (POST)
/// /queries/{id}                           query snapshot (GET)
/// /queries/{id}/events                    SSE progress stream (GET)
/// /queries/{id}/cancel                    cancel (POST)
/// /queries/{id}/manifest                  assembled manifest (GET)
/// /queries/{id}/jobs                      job statuses + plan summary (GET)
/// /queries/{id}/jobs/claim                claim next ready job (POST)
/// /queries/{id}/jobs/{job_id}/status      report job outcome (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/queries", queries::router())
}
