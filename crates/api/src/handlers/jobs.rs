//! Handlers for the job plan surface of a query.
//!
//! Dispatch workers drive these endpoints: claim the next ready job
//! (optionally long-polling), then report the outcome so the scheduler
//! can promote or block dependents.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use showrun_core::types::QueryId;
use showrun_engine::{JobSnapshot, PlanSummary};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// Job statuses plus the aggregate plan summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobsOverview {
    pub jobs: Vec<JobSnapshot>,
    pub summary: PlanSummary,
}

/// GET /api/v1/queries/{id}/jobs
///
/// Status of every job in the query's plan, in manifest order, plus the
/// aggregate counts. 409 until the query completes and a plan exists.
pub async fn list_jobs(
    State(state): State<AppState>,
    Path(query_id): Path<QueryId>,
) -> AppResult<impl IntoResponse> {
    let jobs = state.engine.job_statuses(query_id).await?;
    let summary = state.engine.plan_summary(query_id).await?;

    Ok(Json(DataResponse {
        data: JobsOverview { jobs, summary },
    }))
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

/// Query parameters for [`claim_job`].
#[derive(Debug, Deserialize)]
pub struct ClaimParams {
    /// Milliseconds to wait for a job to become ready (long poll).
    pub wait_ms: Option<u64>,
}

/// POST /api/v1/queries/{id}/jobs/claim
///
/// Claim the next ready job and mark it dispatched. Returns 200 with the
/// job, or 204 when nothing is ready. `?wait_ms=` long-polls for that
/// long; it must fit inside the request timeout.
pub async fn claim_job(
    State(state): State<AppState>,
    Path(query_id): Path<QueryId>,
    Query(params): Query<ClaimParams>,
) -> AppResult<impl IntoResponse> {
    let timeout_ms = state.config.request_timeout_secs * 1000;
    let wait = match params.wait_ms {
        Some(ms) if ms >= timeout_ms => {
            return Err(AppError::BadRequest(format!(
                "wait_ms must be less than the request timeout ({timeout_ms} ms)"
            )));
        }
        Some(ms) => Some(Duration::from_millis(ms)),
        None => None,
    };

    match state.engine.claim_ready(query_id, wait).await? {
        Some(job) => Ok(Json(DataResponse { data: job }).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Terminal outcome a dispatcher may report for a job.
///
/// Closed enum: anything other than `succeeded` / `failed` is rejected
/// at the deserialization boundary.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportedOutcome {
    Succeeded,
    Failed,
}

/// Request body for [`report_job_status`].
#[derive(Debug, Deserialize)]
pub struct JobStatusReport {
    pub status: ReportedOutcome,
}

/// POST /api/v1/queries/{id}/jobs/{job_id}/status
///
/// Report a claimed job's outcome. Success promotes dependents whose
/// last dependency this was; failure blocks every transitive dependent.
/// Repeat reports of the same outcome are acknowledged without effect.
pub async fn report_job_status(
    State(state): State<AppState>,
    Path((query_id, job_id)): Path<(QueryId, String)>,
    Json(report): Json<JobStatusReport>,
) -> AppResult<impl IntoResponse> {
    let outcome = match report.status {
        ReportedOutcome::Succeeded => state.engine.mark_job_succeeded(query_id, &job_id).await?,
        ReportedOutcome::Failed => state.engine.mark_job_failed(query_id, &job_id).await?,
    };

    Ok(Json(DataResponse { data: outcome }))
}
