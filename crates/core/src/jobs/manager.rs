// crates/core/src/jobs/manager.rs
//! Central orchestrator for background jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::config::SupervisorConfig;
use crate::error::{JobError, ProcessError};

use super::dispatcher::Dispatcher;
use super::process::ProcessRunner;
use super::record::JobRecord;
use super::store::JobStore;
use super::types::{
    CancelReceipt, JobEvent, JobId, JobOutcome, JobResultStatus, JobSnapshot, JobSpec, JobState,
    LogTail,
};

/// Orchestrates background jobs: accepts submissions, starts one supervised
/// execution per accepted job (bounded by the dispatcher), enforces legal
/// state transitions, and serves status/result/log/cancel/list queries
/// without ever blocking on a job's completion.
///
/// Construct one per process and share it behind an `Arc`. All state lives
/// in the injected store and dispatcher; there are no globals.
pub struct JobManager {
    store: Arc<JobStore>,
    dispatcher: Arc<Dispatcher>,
    config: SupervisorConfig,
    events: broadcast::Sender<JobEvent>,
}

impl JobManager {
    pub fn new(config: SupervisorConfig) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(config.max_concurrent));
        Self::with_parts(Arc::new(JobStore::new()), dispatcher, config)
    }

    /// Build from externally-constructed parts, for callers that want to
    /// inject or share the store and dispatcher.
    pub fn with_parts(
        store: Arc<JobStore>,
        dispatcher: Arc<Dispatcher>,
        config: SupervisorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            store,
            dispatcher,
            config,
            events,
        }
    }

    /// Accept a job for execution. Returns a fresh id immediately, even
    /// when every worker slot is busy. The only rejection is a malformed
    /// submission, which creates no record.
    pub fn submit(&self, spec: JobSpec) -> Result<JobId, JobError> {
        if spec.program.as_os_str().is_empty() {
            return Err(JobError::Validation("program path is empty".to_string()));
        }

        let record = Arc::new(JobRecord::new(spec));
        let id = record.id();
        self.store.insert(Arc::clone(&record));
        emit_event(&self.events, &record, None);
        tracing::info!(job_id = %id, name = %record.name(), "job submitted");

        let dispatcher = Arc::clone(&self.dispatcher);
        let config = self.config.clone();
        let events = self.events.clone();
        let supervisor = tokio::spawn({
            let record = Arc::clone(&record);
            async move { supervise(record, dispatcher, config, events).await }
        });

        // Watchdog: a panicking supervisor must still resolve its job to a
        // terminal state instead of leaving it stuck in `running`.
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Err(e) = supervisor.await {
                record
                    .log()
                    .append(format!("[supervisor] aborted unexpectedly: {e}"));
                resolve_failed(&record, &events, format!("supervisor aborted: {e}"), None);
            }
        });

        Ok(id)
    }

    /// Current state and timestamps for one job.
    pub fn status(&self, id: JobId) -> Result<JobSnapshot, JobError> {
        self.record(id).map(|r| r.snapshot())
    }

    /// The result payload if the job completed; an explicit not-ready
    /// indicator otherwise.
    pub fn result(&self, id: JobId) -> Result<JobResultStatus, JobError> {
        self.record(id).map(|r| r.result())
    }

    /// Tail of the job's log (`tail == 0` means the full log), plus the
    /// total line count so far.
    pub fn log(&self, id: JobId, tail: usize) -> Result<LogTail, JobError> {
        let record = self.record(id)?;
        let lines = record.log().tail(tail);
        let total_lines = record.log().len();
        Ok(LogTail { lines, total_lines })
    }

    /// Request cancellation. A pending job is withdrawn before any process
    /// is spawned; a running job gets a termination request bounded by the
    /// configured grace period. Requests against terminal jobs are rejected
    /// without mutating anything.
    pub fn cancel(&self, id: JobId) -> Result<CancelReceipt, JobError> {
        let record = self.record(id)?;
        let state = record.state();
        if state.is_terminal() {
            return Err(JobError::InvalidTransition {
                from: state,
                to: JobState::Cancelled,
            });
        }
        record.cancel_token().cancel();
        tracing::info!(job_id = %id, from = %state, "cancellation requested");
        Ok(CancelReceipt {
            job_id: id,
            cancelled: true,
            state,
        })
    }

    /// All jobs in submission order, optionally filtered to one state.
    pub fn list(&self, filter: Option<JobState>) -> Vec<JobSnapshot> {
        self.store.list(filter)
    }

    /// Subscribe to state-change events for all jobs.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Worker slots currently free.
    pub fn available_slots(&self) -> usize {
        self.dispatcher.available()
    }

    /// Suspend the calling task, and only it, until the job reaches a
    /// terminal state or `timeout` elapses, then return the latest
    /// snapshot. Callers decide what a non-terminal snapshot means.
    pub async fn wait(&self, id: JobId, timeout: Duration) -> Result<JobSnapshot, JobError> {
        let record = self.record(id)?;
        // Subscribe before the first check so no transition is missed.
        let mut rx = self.events.subscribe();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let snapshot = record.snapshot();
            if snapshot.state.is_terminal() {
                return Ok(snapshot);
            }
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return Ok(record.snapshot()),
                event = rx.recv() => match event {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return Ok(record.snapshot()),
                },
            }
        }
    }

    fn record(&self, id: JobId) -> Result<Arc<JobRecord>, JobError> {
        self.store.get(&id).ok_or(JobError::NotFound(id))
    }
}

/// Drives one job from admission to a terminal state. Every failure mode
/// resolves into the job's own record; nothing escapes to other jobs or
/// the dispatcher.
async fn supervise(
    record: Arc<JobRecord>,
    dispatcher: Arc<Dispatcher>,
    config: SupervisorConfig,
    events: broadcast::Sender<JobEvent>,
) {
    let id = record.id();

    // Hold the slot for the rest of the job's life; dropping it at the end
    // of this function admits the next queued job.
    let _slot = tokio::select! {
        slot = dispatcher.admit() => slot,
        _ = record.cancel_token().cancelled() => {
            withdraw(&record, &events, "cancelled while queued");
            return;
        }
    };
    if record.cancel_token().is_cancelled() {
        withdraw(&record, &events, "cancelled while queued");
        return;
    }

    let working_dir = record.spec().working_dir.clone();
    if let Err(e) = tokio::fs::create_dir_all(&working_dir).await {
        let message = format!(
            "cannot create working directory {}: {e}",
            working_dir.display()
        );
        record.log().append(format!("[supervisor] {message}"));
        resolve_failed(&record, &events, message, None);
        return;
    }

    let runner = ProcessRunner::from_spec(record.spec());
    let child = match runner.spawn() {
        Ok(child) => child,
        Err(e) => {
            // Spawn failure drives `pending → failed` without ever
            // reaching `running`.
            record.log().append(format!("[supervisor] {e}"));
            resolve_failed(&record, &events, e.to_string(), None);
            return;
        }
    };

    if record.mark_running().is_err() {
        // Lost a race with cancellation; the child dies via kill_on_drop.
        withdraw(&record, &events, "cancelled while starting");
        return;
    }
    emit_event(&events, &record, None);
    tracing::info!(job_id = %id, program = %record.spec().program.display(), "job running");

    let timeout = record.spec().timeout.or(config.default_timeout);
    let result = ProcessRunner::supervise(
        child,
        Arc::clone(record.log()),
        record.cancel_token().clone(),
        timeout,
        config.grace_period,
    )
    .await;

    match result {
        Ok(code) if code == config.success_exit_code => {
            let outcome = collect_outcome(record.spec(), code).await;
            if record.complete(outcome).is_ok() {
                emit_event(&events, &record, None);
                tracing::info!(job_id = %id, exit_code = code, "job completed");
            }
        }
        Ok(code) => {
            resolve_failed(
                &record,
                &events,
                format!("process exited with code {code}"),
                Some(code),
            );
        }
        Err(ProcessError::Cancelled) => {
            if record.cancel("cancelled while running").is_ok() {
                emit_event(&events, &record, None);
                tracing::info!(job_id = %id, "job cancelled");
            }
        }
        Err(e) => {
            record.log().append(format!("[supervisor] {e}"));
            resolve_failed(&record, &events, e.to_string(), None);
        }
    }
}

fn withdraw(record: &JobRecord, events: &broadcast::Sender<JobEvent>, reason: &str) {
    if record.cancel(reason).is_ok() {
        emit_event(events, record, Some(reason.to_string()));
        tracing::info!(job_id = %record.id(), "job cancelled before start");
    }
}

fn resolve_failed(
    record: &JobRecord,
    events: &broadcast::Sender<JobEvent>,
    error: String,
    exit_code: Option<i32>,
) {
    tracing::warn!(job_id = %record.id(), error = %error, "job failed");
    if record.fail(error, exit_code).is_ok() {
        emit_event(events, record, None);
    }
}

fn emit_event(events: &broadcast::Sender<JobEvent>, record: &JobRecord, message: Option<String>) {
    // No subscribers is fine.
    let _ = events.send(JobEvent {
        job_id: record.id(),
        name: record.name().to_string(),
        state: record.state(),
        timestamp: Utc::now(),
        message,
    });
}

/// Build the result payload from the job's declared output locations.
async fn collect_outcome(spec: &JobSpec, exit_code: i32) -> JobOutcome {
    let mut outputs = Vec::new();
    for path in &spec.outputs {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            outputs.push(path.clone());
        }
    }
    let summary = match &spec.summary_path {
        Some(path) => match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).ok(),
            Err(_) => None,
        },
        None => None,
    };
    JobOutcome {
        exit_code,
        outputs,
        summary,
    }
}
