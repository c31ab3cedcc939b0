//! Route definitions for the `/queries` resource.
//!
//! Jobs are a sub-resource of the query that produced them, so the job
//! endpoints live here too, under `/{id}/jobs`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{jobs, queries};
use crate::state::AppState;

/// Routes mounted at `/queries`.
///
/// ```text
/// POST   /                          -> submit_query
/// GET    /{id}                      -> get_query
/// GET    /{id}/events               -> query_events (SSE)
/// POST   /{id}/cancel               -> cancel_query
/// GET    /{id}/manifest             -> get_manifest
/// GET    /{id}/jobs                 -> list_jobs
/// POST   /{id}/jobs/claim           -> claim_job
/// POST   /{id}/jobs/{job_id}/status -> report_job_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(queries::submit_query))
        .route("/{id}", get(queries::get_query))
        .route("/{id}/events", get(queries::query_events))
        .route("/{id}/cancel", post(queries::cancel_query))
        .route("/{id}/manifest", get(queries::get_manifest))
        .route("/{id}/jobs", get(jobs::list_jobs))
        .route("/{id}/jobs/claim", post(jobs::claim_job))
        .route("/{id}/jobs/{job_id}/status", post(jobs::report_job_status))
}
