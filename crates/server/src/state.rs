// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use foldrun_core::{JobManager, PipelineCatalog};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// The one job manager for this process.
    pub manager: Arc<JobManager>,
    /// Maps pipeline requests onto job specs.
    pub catalog: PipelineCatalog,
    /// How long a synchronous pipeline endpoint waits for its job before
    /// answering 202 with the job id instead.
    pub sync_wait: Duration,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    pub fn new(manager: Arc<JobManager>, catalog: PipelineCatalog) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            manager,
            catalog,
            sync_wait: Duration::from_secs(10 * 60),
        })
    }

    /// Create with an explicit sync-wait window (tests use short windows).
    pub fn with_sync_wait(
        manager: Arc<JobManager>,
        catalog: PipelineCatalog,
        sync_wait: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            manager,
            catalog,
            sync_wait,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foldrun_core::SupervisorConfig;

    fn test_state() -> Arc<AppState> {
        let manager = Arc::new(JobManager::new(SupervisorConfig::default()));
        let catalog = PipelineCatalog::new("python3", "scripts", "/tmp/foldrun-test");
        AppState::new(manager, catalog)
    }

    #[test]
    fn test_app_state_uptime() {
        let state = test_state();
        assert!(state.uptime_secs() < 5);
    }

    #[test]
    fn test_with_sync_wait() {
        let manager = Arc::new(JobManager::new(SupervisorConfig::default()));
        let catalog = PipelineCatalog::new("python3", "scripts", "/tmp/foldrun-test");
        let state = AppState::with_sync_wait(manager, catalog, Duration::from_millis(100));
        assert_eq!(state.sync_wait, Duration::from_millis(100));
    }
}
