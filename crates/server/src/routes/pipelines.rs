// crates/server/src/routes/pipelines.rs
//! API routes for submitting pipeline runs.
//!
//! Fast pipelines are exposed synchronously: the handler submits a job and
//! waits (bounded by the configured window) for its terminal state,
//! answering 202 with the job id if the window closes first. Long-running
//! pipelines return 202 immediately; callers track them through the job
//! routes.
//!
//! - POST /pipelines/predict    - basic structure prediction (sync)
//! - POST /pipelines/refine     - structure refinement (sync)
//! - POST /pipelines/inference  - per-model inference (sync)
//! - POST /pipelines/ensemble   - ensemble prediction (background)
//! - POST /pipelines/batch      - batch prediction (background)
//! - POST /pipelines/analysis   - comprehensive analysis (background)

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use foldrun_core::{
    AnalysisRequest, BatchRequest, EnsembleRequest, InferenceRequest, JobId, JobOutcome,
    JobResultStatus, JobSpec, JobState, PredictRequest, RefineRequest,
};

use crate::error::ApiResult;
use crate::state::AppState;

/// Acknowledgement for background submissions.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub name: String,
    pub state: JobState,
}

/// Response for synchronous pipelines. `result` is present only when the
/// job completed inside the wait window.
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub job_id: JobId,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /api/pipelines/predict - Predict RNA 3D structure from FASTA.
async fn predict(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PredictRequest>,
) -> ApiResult<(StatusCode, Json<SyncResponse>)> {
    let spec = state.catalog.predict(&req);
    run_sync(&state, spec).await
}

/// POST /api/pipelines/refine - Refine a structure with molecular dynamics.
async fn refine(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefineRequest>,
) -> ApiResult<(StatusCode, Json<SyncResponse>)> {
    let spec = state.catalog.refine(&req);
    run_sync(&state, spec).await
}

/// POST /api/pipelines/inference - Run raw model inference.
async fn inference(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InferenceRequest>,
) -> ApiResult<(StatusCode, Json<SyncResponse>)> {
    let spec = state.catalog.inference(&req);
    run_sync(&state, spec).await
}

/// POST /api/pipelines/ensemble - Submit ensemble prediction for background
/// processing; typically 15-45 minutes.
async fn ensemble(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EnsembleRequest>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    submit_background(&state, state.catalog.ensemble(&req))
}

/// POST /api/pipelines/batch - Submit batch prediction over several FASTA
/// files.
async fn batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchRequest>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let spec = state.catalog.batch(&req)?;
    submit_background(&state, spec)
}

/// POST /api/pipelines/analysis - Submit the comprehensive analysis
/// pipeline; may run 30+ minutes.
async fn analysis(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalysisRequest>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    submit_background(&state, state.catalog.analysis(&req))
}

async fn run_sync(
    state: &AppState,
    spec: JobSpec,
) -> ApiResult<(StatusCode, Json<SyncResponse>)> {
    let id = state.manager.submit(spec)?;
    let snapshot = state.manager.wait(id, state.sync_wait).await?;
    let result = match state.manager.result(id)? {
        JobResultStatus::Ready(outcome) => Some(outcome),
        JobResultStatus::NotReady(_) => None,
    };
    let status = if snapshot.state.is_terminal() {
        StatusCode::OK
    } else {
        // Still running once the wait window closed; the caller keeps
        // tracking through the job routes.
        StatusCode::ACCEPTED
    };
    Ok((
        status,
        Json(SyncResponse {
            job_id: id,
            state: snapshot.state,
            result,
            error: snapshot.error,
        }),
    ))
}

fn submit_background(
    state: &AppState,
    spec: JobSpec,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let id = state.manager.submit(spec)?;
    let snapshot = state.manager.status(id)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id: id,
            name: snapshot.name,
            state: snapshot.state,
        }),
    ))
}

/// Build the pipelines router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pipelines/predict", post(predict))
        .route("/pipelines/refine", post(refine))
        .route("/pipelines/inference", post(inference))
        .route("/pipelines/ensemble", post(ensemble))
        .route("/pipelines/batch", post(batch))
        .route("/pipelines/analysis", post(analysis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use foldrun_core::{JobManager, PipelineCatalog, SupervisorConfig};
    use std::time::Duration;
    use tower::ServiceExt;

    /// Catalog whose "python" is /bin/echo: every pipeline run prints its
    /// argument vector and exits 0, which is enough to drive the job
    /// machinery end to end.
    fn echo_state() -> Arc<AppState> {
        let manager = Arc::new(JobManager::new(SupervisorConfig::default()));
        let catalog = PipelineCatalog::new("/bin/echo", "/opt/scripts", "/tmp/foldrun-test");
        AppState::with_sync_wait(manager, catalog, Duration::from_secs(10))
    }

    fn app(state: Arc<AppState>) -> Router {
        Router::new().nest("/api", router()).with_state(state)
    }

    async fn post_json(
        app: Router,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_predict_runs_synchronously() {
        let (status, json) = post_json(
            app(echo_state()),
            "/api/pipelines/predict",
            serde_json::json!({"input_file": "/data/trna.fasta"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["state"], "completed");
        assert_eq!(json["result"]["exit_code"], 0);
    }

    #[tokio::test]
    async fn test_ensemble_is_accepted_in_background() {
        let state = echo_state();
        let (status, json) = post_json(
            app(state.clone()),
            "/api/pipelines/ensemble",
            serde_json::json!({"input_file": "/data/ribozyme.fasta", "max_models": 3}),
        )
        .await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["name"], "ensemble_ribozyme");
        let id: JobId = json["job_id"].as_str().unwrap().parse().unwrap();

        // The submission is tracked and reaches a terminal state.
        let snapshot = state.manager.wait(id, Duration::from_secs(10)).await.unwrap();
        assert_eq!(snapshot.state, JobState::Completed);
    }

    #[tokio::test]
    async fn test_batch_with_no_inputs_is_rejected() {
        let (status, json) = post_json(
            app(echo_state()),
            "/api/pipelines/batch",
            serde_json::json!({"input_files": []}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid submission");
    }

    #[tokio::test]
    async fn test_analysis_names_job_after_input() {
        let (status, json) = post_json(
            app(echo_state()),
            "/api/pipelines/analysis",
            serde_json::json!({"input_file": "/data/group_I_intron.fasta"}),
        )
        .await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["name"], "comprehensive_group_I_intron");
        assert_eq!(json["state"], "pending");
    }
}
