// crates/core/src/jobs/record.rs
//! The persisted state of one job.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::JobError;

use super::log_buffer::LogBuffer;
use super::types::{JobId, JobOutcome, JobResultStatus, JobSnapshot, JobSpec, JobState};

/// One job's full state: immutable identity and spec, plus a lock-guarded
/// mutable section updated only by the manager and the job's supervisor.
///
/// All transition methods enforce the state machine: an inapplicable
/// request returns [`JobError::InvalidTransition`] and mutates nothing, so
/// readers can never observe a job moving backward out of a terminal state.
pub struct JobRecord {
    id: JobId,
    name: String,
    spec: JobSpec,
    submitted_at: DateTime<Utc>,
    log: Arc<LogBuffer>,
    cancel: CancellationToken,
    inner: RwLock<Mutable>,
}

#[derive(Default)]
struct Mutable {
    state: JobState,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    exit_code: Option<i32>,
    result: Option<JobOutcome>,
    error: Option<String>,
}

impl JobRecord {
    pub fn new(spec: JobSpec) -> Self {
        let name = spec.display_name();
        Self {
            id: Uuid::new_v4(),
            name,
            spec,
            submitted_at: Utc::now(),
            log: Arc::new(LogBuffer::new()),
            cancel: CancellationToken::new(),
            inner: RwLock::new(Mutable::default()),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    pub fn log(&self) -> &Arc<LogBuffer> {
        &self.log
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn state(&self) -> JobState {
        self.read_inner().state
    }

    /// Consistent point-in-time view; taken under the record lock so a
    /// reader never sees a half-updated record.
    pub fn snapshot(&self) -> JobSnapshot {
        let inner = self.read_inner();
        JobSnapshot {
            id: self.id,
            name: self.name.clone(),
            state: inner.state,
            submitted_at: self.submitted_at,
            started_at: inner.started_at,
            finished_at: inner.finished_at,
            exit_code: inner.exit_code,
            error: inner.error.clone(),
        }
    }

    /// The result payload if completed, otherwise an explicit not-ready
    /// indicator carrying the current state.
    pub fn result(&self) -> JobResultStatus {
        let inner = self.read_inner();
        match (&inner.result, inner.state) {
            (Some(outcome), JobState::Completed) => JobResultStatus::Ready(outcome.clone()),
            _ => JobResultStatus::NotReady(inner.state),
        }
    }

    /// `pending → running`; records the start time.
    pub fn mark_running(&self) -> Result<(), JobError> {
        let mut inner = self.write_inner();
        if inner.state != JobState::Pending {
            return Err(JobError::InvalidTransition {
                from: inner.state,
                to: JobState::Running,
            });
        }
        inner.state = JobState::Running;
        inner.started_at = Some(Utc::now());
        Ok(())
    }

    /// `running → completed`; stores the result payload and exit code.
    pub fn complete(&self, outcome: JobOutcome) -> Result<(), JobError> {
        let mut inner = self.write_inner();
        if inner.state != JobState::Running {
            return Err(JobError::InvalidTransition {
                from: inner.state,
                to: JobState::Completed,
            });
        }
        inner.state = JobState::Completed;
        inner.finished_at = Some(Utc::now());
        inner.exit_code = Some(outcome.exit_code);
        inner.result = Some(outcome);
        Ok(())
    }

    /// `pending|running → failed`; records the cause.
    pub fn fail(&self, error: impl Into<String>, exit_code: Option<i32>) -> Result<(), JobError> {
        let mut inner = self.write_inner();
        if inner.state.is_terminal() {
            return Err(JobError::InvalidTransition {
                from: inner.state,
                to: JobState::Failed,
            });
        }
        inner.state = JobState::Failed;
        inner.finished_at = Some(Utc::now());
        inner.exit_code = exit_code;
        inner.error = Some(error.into());
        Ok(())
    }

    /// `pending|running → cancelled`; records the cancellation reason.
    pub fn cancel(&self, reason: impl Into<String>) -> Result<(), JobError> {
        let mut inner = self.write_inner();
        if inner.state.is_terminal() {
            return Err(JobError::InvalidTransition {
                from: inner.state,
                to: JobState::Cancelled,
            });
        }
        inner.state = JobState::Cancelled;
        inner.finished_at = Some(Utc::now());
        inner.error = Some(reason.into());
        Ok(())
    }

    // State updates happen in single non-panicking sections, so a poisoned
    // guard still holds a consistent record and can be recovered.
    fn read_inner(&self) -> RwLockReadGuard<'_, Mutable> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_inner(&self) -> RwLockWriteGuard<'_, Mutable> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> JobRecord {
        JobRecord::new(JobSpec::new("/bin/true").with_name("test job"))
    }

    fn outcome(exit_code: i32) -> JobOutcome {
        JobOutcome {
            exit_code,
            outputs: Vec::new(),
            summary: None,
        }
    }

    #[test]
    fn test_lifecycle_to_completed() {
        let record = record();
        assert_eq!(record.state(), JobState::Pending);
        assert!(record.snapshot().started_at.is_none());

        record.mark_running().unwrap();
        let snap = record.snapshot();
        assert_eq!(snap.state, JobState::Running);
        assert!(snap.started_at.is_some());
        assert!(snap.finished_at.is_none());

        record.complete(outcome(0)).unwrap();
        let snap = record.snapshot();
        assert_eq!(snap.state, JobState::Completed);
        assert!(snap.finished_at.is_some());
        assert_eq!(snap.exit_code, Some(0));
        assert!(matches!(record.result(), JobResultStatus::Ready(_)));
    }

    #[test]
    fn test_fail_from_pending_records_cause() {
        let record = record();
        record.fail("failed to start /missing: no such file", None).unwrap();

        let snap = record.snapshot();
        assert_eq!(snap.state, JobState::Failed);
        assert!(snap.started_at.is_none());
        assert!(snap.finished_at.is_some());
        assert!(snap.error.unwrap().contains("/missing"));
    }

    #[test]
    fn test_cancel_records_reason_not_result() {
        let record = record();
        record.mark_running().unwrap();
        record.cancel("cancelled while running").unwrap();

        let snap = record.snapshot();
        assert_eq!(snap.state, JobState::Cancelled);
        assert_eq!(snap.error.as_deref(), Some("cancelled while running"));
        assert!(matches!(
            record.result(),
            JobResultStatus::NotReady(JobState::Cancelled)
        ));
    }

    #[test]
    fn test_no_transition_out_of_terminal_state() {
        let record = record();
        record.mark_running().unwrap();
        record.complete(outcome(0)).unwrap();

        assert!(matches!(
            record.mark_running(),
            Err(JobError::InvalidTransition { from: JobState::Completed, .. })
        ));
        assert!(record.cancel("too late").is_err());
        assert!(record.fail("no", None).is_err());
        // The rejected requests mutated nothing.
        assert_eq!(record.state(), JobState::Completed);
        assert!(record.snapshot().error.is_none());
    }

    #[test]
    fn test_complete_requires_running() {
        let record = record();
        assert!(matches!(
            record.complete(outcome(0)),
            Err(JobError::InvalidTransition { from: JobState::Pending, .. })
        ));
    }

    #[test]
    fn test_double_running_rejected() {
        let record = record();
        record.mark_running().unwrap();
        assert!(record.mark_running().is_err());
    }

    #[test]
    fn test_result_not_ready_until_completed() {
        let record = record();
        assert!(matches!(
            record.result(),
            JobResultStatus::NotReady(JobState::Pending)
        ));
        record.mark_running().unwrap();
        assert!(matches!(
            record.result(),
            JobResultStatus::NotReady(JobState::Running)
        ));
    }
}
