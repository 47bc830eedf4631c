// crates/server/src/main.rs
//! Foldrun server binary.
//!
//! Starts the Axum HTTP server immediately; pipeline runs are supervised as
//! background jobs on the shared runtime, so the control surface stays
//! responsive while predictions run for minutes to hours.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use foldrun_core::{JobManager, PipelineCatalog, SupervisorConfig};
use foldrun_server::{create_app, AppState};

/// Default port for the server.
const DEFAULT_PORT: u16 = 47910;

/// Get the server port from environment or use default.
fn get_port() -> u16 {
    std::env::var("FOLDRUN_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Python interpreter used to run the pipeline scripts.
fn get_python() -> PathBuf {
    std::env::var("FOLDRUN_PYTHON")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("python3"))
}

/// Directory holding the DRfold2 pipeline scripts.
fn get_scripts_dir() -> PathBuf {
    std::env::var("FOLDRUN_SCRIPTS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("scripts"))
}

/// Working directory for job processes and derived outputs.
///
/// Priority:
/// 1. FOLDRUN_WORK_DIR environment variable (explicit override)
/// 2. ~/.foldrun/jobs
/// 3. ./foldrun-jobs (no home directory)
fn get_work_dir() -> PathBuf {
    std::env::var("FOLDRUN_WORK_DIR")
        .map(PathBuf::from)
        .ok()
        .or_else(|| dirs::home_dir().map(|home| home.join(".foldrun").join("jobs")))
        .unwrap_or_else(|| PathBuf::from("foldrun-jobs"))
}

/// Worker-slot capacity; `0` means unbounded.
fn get_max_jobs() -> usize {
    std::env::var("FOLDRUN_MAX_JOBS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(2)
}

/// Grace period between SIGTERM and SIGKILL on cancellation.
fn get_grace_period() -> Duration {
    let secs = std::env::var("FOLDRUN_GRACE_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);
    Duration::from_secs(secs)
}

/// Optional default maximum runtime for jobs.
fn get_job_timeout() -> Option<Duration> {
    std::env::var("FOLDRUN_JOB_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
}

/// How long synchronous pipeline endpoints wait before answering 202.
fn get_sync_wait() -> Duration {
    let secs = std::env::var("FOLDRUN_SYNC_WAIT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10 * 60);
    Duration::from_secs(secs)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; RUST_LOG overrides the default level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).compact().finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Print banner
    eprintln!("\n\u{1f9ec} foldrun v{}\n", env!("CARGO_PKG_VERSION"));

    let config = SupervisorConfig {
        max_concurrent: get_max_jobs(),
        grace_period: get_grace_period(),
        default_timeout: get_job_timeout(),
        success_exit_code: 0,
    };
    let work_dir = get_work_dir();
    let scripts_dir = get_scripts_dir();

    let manager = Arc::new(JobManager::new(config.clone()));
    let catalog = PipelineCatalog::new(get_python(), scripts_dir.clone(), work_dir.clone());
    let state = AppState::with_sync_wait(manager, catalog, get_sync_wait());
    let app = create_app(state);

    let port = get_port();
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let slots = if config.max_concurrent == 0 {
        "unbounded".to_string()
    } else {
        config.max_concurrent.to_string()
    };
    eprintln!(
        "  \u{2713} Ready \u{2014} {} worker slot(s), scripts in {}",
        slots,
        scripts_dir.display(),
    );
    eprintln!("  \u{2192} http://localhost:{port}\n");
    tracing::info!(
        port,
        max_jobs = config.max_concurrent,
        grace_secs = config.grace_period.as_secs(),
        work_dir = %work_dir.display(),
        "foldrun server listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
