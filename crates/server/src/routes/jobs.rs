// crates/server/src/routes/jobs.rs
//! API routes for the job control surface.
//!
//! - GET  /jobs                 - List jobs, optionally filtered by state
//! - GET  /jobs/stream          - SSE stream of job state changes
//! - GET  /jobs/{id}            - Status and timestamps for one job
//! - GET  /jobs/{id}/result     - Result payload, or an explicit not-ready body
//! - GET  /jobs/{id}/log        - Log tail (`?tail=N`, 0 = full log)
//! - POST /jobs/{id}/cancel     - Request cancellation

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use foldrun_core::{CancelReceipt, JobId, JobResultStatus, JobSnapshot, JobState, LogTail};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub state: Option<JobState>,
}

#[derive(Debug, Deserialize)]
pub struct LogParams {
    /// Number of lines from the end; `0` returns the full log.
    #[serde(default = "default_tail")]
    pub tail: usize,
}

/// The original tooling shows the last 50 lines by default.
fn default_tail() -> usize {
    50
}

/// Body returned by result queries against jobs that have not completed.
#[derive(Debug, Serialize)]
struct NotReadyResponse {
    not_ready: bool,
    state: JobState,
}

/// GET /api/jobs - All jobs in submission order.
async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Json<Vec<JobSnapshot>> {
    Json(state.manager.list(params.state))
}

/// GET /api/jobs/{id} - Current state and timestamps.
async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
) -> ApiResult<Json<JobSnapshot>> {
    Ok(Json(state.manager.status(id)?))
}

/// GET /api/jobs/{id}/result - The result payload for completed jobs; an
/// explicit not-ready indicator for everything else.
async fn job_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
) -> ApiResult<Response> {
    match state.manager.result(id)? {
        JobResultStatus::Ready(outcome) => Ok(Json(outcome).into_response()),
        JobResultStatus::NotReady(job_state) => Ok(Json(NotReadyResponse {
            not_ready: true,
            state: job_state,
        })
        .into_response()),
    }
}

/// GET /api/jobs/{id}/log - Tail of the job's output, available while the
/// job is still running.
async fn job_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
    Query(params): Query<LogParams>,
) -> ApiResult<Json<LogTail>> {
    Ok(Json(state.manager.log(id, params.tail)?))
}

/// POST /api/jobs/{id}/cancel - Request cancellation.
async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
) -> ApiResult<Json<CancelReceipt>> {
    Ok(Json(state.manager.cancel(id)?))
}

/// GET /api/jobs/stream - SSE stream of job state-change events.
async fn stream_jobs(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.manager.subscribe();

    let stream = async_stream::stream! {
        let mut rx = rx;
        while let Ok(event) = rx.recv().await {
            let json = serde_json::to_string(&event).unwrap_or_default();
            yield Ok(Event::default().data(json));
        }
    };

    Sse::new(stream)
}

/// Build the jobs router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/stream", get(stream_jobs))
        .route("/jobs/{id}", get(job_status))
        .route("/jobs/{id}/result", get(job_result))
        .route("/jobs/{id}/log", get(job_log))
        .route("/jobs/{id}/cancel", post(cancel_job))
}
