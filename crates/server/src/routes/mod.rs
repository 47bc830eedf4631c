// crates/server/src/routes/mod.rs
//! API route handlers for the foldrun server.

pub mod health;
pub mod jobs;
pub mod pipelines;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under the /api prefix.
///
/// Routes:
/// - GET  /api/health               - Health check
/// - GET  /api/jobs                 - List jobs in submission order (?state= filter)
/// - GET  /api/jobs/stream          - SSE stream of job state changes
/// - GET  /api/jobs/{id}            - Job status and timestamps
/// - GET  /api/jobs/{id}/result     - Result payload or explicit not-ready body
/// - GET  /api/jobs/{id}/log        - Log tail (?tail=N, 0 = full log)
/// - POST /api/jobs/{id}/cancel     - Request cancellation
/// - POST /api/pipelines/predict    - Basic structure prediction (sync)
/// - POST /api/pipelines/refine     - Structure refinement (sync)
/// - POST /api/pipelines/inference  - Per-model inference (sync)
/// - POST /api/pipelines/ensemble   - Ensemble prediction (background)
/// - POST /api/pipelines/batch      - Batch prediction (background)
/// - POST /api/pipelines/analysis   - Comprehensive analysis (background)
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", jobs::router())
        .nest("/api", pipelines::router())
        .with_state(state)
}
