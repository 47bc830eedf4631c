// crates/core/src/error.rs
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::jobs::types::{JobId, JobState};

/// Errors surfaced synchronously by the job control surface.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid submission: {0}")]
    Validation(String),

    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("job cannot move from {from} to {to}")]
    InvalidTransition { from: JobState, to: JobState },
}

/// Errors raised while spawning or supervising one external process.
///
/// These never propagate past the job's supervisor: they are resolved into
/// the job record as a terminal state.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("process I/O error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("process exceeded its maximum runtime of {limit:?}")]
    Timeout { limit: Duration },

    #[error("process terminated by cancellation request")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_error_display() {
        let err = JobError::Validation("program path is empty".to_string());
        assert!(err.to_string().contains("program path is empty"));

        let err = JobError::InvalidTransition {
            from: JobState::Completed,
            to: JobState::Cancelled,
        };
        assert_eq!(err.to_string(), "job cannot move from completed to cancelled");
    }

    #[test]
    fn test_process_error_display() {
        let err = ProcessError::Spawn {
            program: PathBuf::from("/opt/drfold/predict"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.to_string().contains("/opt/drfold/predict"));

        let err = ProcessError::Timeout {
            limit: Duration::from_secs(60),
        };
        assert!(err.to_string().contains("maximum runtime"));
    }
}
