//! Handlers for the `/queries` resource.
//!
//! Submission hands the request to the engine and returns immediately;
//! analysis runs in a background task. Progress is observed either by
//! polling the snapshot or over the SSE stream, which replays the full
//! per-query history before switching to live messages.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream;
use serde::Serialize;
use showrun_core::types::QueryId;
use showrun_engine::SubmitRequest;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// Response payload for a newly submitted query.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCreated {
    pub query_id: QueryId,
}

/// POST /api/v1/queries
///
/// Validate and accept a creative request. Returns 201 with the new query
/// id; analysis starts in the background. Invalid submissions (empty
/// prompt, out-of-range duration, malformed asset ids) return 400 and
/// leave no trace in the engine.
pub async fn submit_query(
    State(state): State<AppState>,
    Json(input): Json<SubmitRequest>,
) -> AppResult<impl IntoResponse> {
    let query_id = state.engine.submit(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: QueryCreated { query_id },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// GET /api/v1/queries/{id}
///
/// Snapshot of the query, its per-asset analysis states, and every
/// progress message accumulated so far.
pub async fn get_query(
    State(state): State<AppState>,
    Path(query_id): Path<QueryId>,
) -> AppResult<impl IntoResponse> {
    let snapshot = state.engine.snapshot(query_id).await?;
    Ok(Json(DataResponse { data: snapshot }))
}

// ---------------------------------------------------------------------------
// Events (SSE)
// ---------------------------------------------------------------------------

/// GET /api/v1/queries/{id}/events
///
/// Server-sent progress stream. Replays the query's full message history
/// (the dense `id` field doubles as a cursor) before switching to live
/// messages, so late subscribers see no gaps and no duplicates. The
/// stream ends once the query is terminal and fully drained; until then
/// keep-alive comments hold the connection open.
pub async fn query_events(
    State(state): State<AppState>,
    Path(query_id): Path<QueryId>,
) -> AppResult<impl IntoResponse> {
    let subscription = state.engine.subscribe(query_id).await?;

    let events = stream::unfold(subscription, |mut subscription| async move {
        let message = subscription.next().await?;
        let event = Event::default()
            .id(message.id.to_string())
            .event(message.kind.as_str())
            .json_data(&*message);
        Some((event, subscription))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/queries/{id}/cancel
///
/// Cancel an active query. In-flight asset analyses are interrupted, the
/// query fails with a `cancelled` reason, and the event stream closes.
/// Returns 204 on success, 409 if the query is already terminal.
pub async fn cancel_query(
    State(state): State<AppState>,
    Path(query_id): Path<QueryId>,
) -> AppResult<impl IntoResponse> {
    state.engine.cancel(query_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// GET /api/v1/queries/{id}/manifest
///
/// The assembled production manifest. Available only once the query has
/// completed; returns 409 while analysis is still running and for failed
/// or cancelled queries.
pub async fn get_manifest(
    State(state): State<AppState>,
    Path(query_id): Path<QueryId>,
) -> AppResult<impl IntoResponse> {
    let manifest = state.engine.manifest(query_id).await?;
    Ok(Json(DataResponse {
        data: (*manifest).clone(),
    }))
}
