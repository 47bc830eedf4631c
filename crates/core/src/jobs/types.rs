// crates/core/src/jobs/types.rs
//! Types for the background job system.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a submitted job. Assigned at submission, never reused.
pub type JobId = Uuid;

/// Lifecycle state of a job.
///
/// Transitions are monotonic: `pending → running → {completed, failed,
/// cancelled}`, with `pending → {failed, cancelled}` for jobs that never
/// start. Terminal states admit no further transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to launch one job: the program, its argument vector,
/// and where to run it. Arguments are always a discrete vector; nothing is
/// ever joined into a shell command string.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Display label for humans; derived from the program name when unset.
    pub name: Option<String>,
    /// Output locations the program is expected to write. Used to build the
    /// result payload on completion; never interpreted beyond existence.
    pub outputs: Vec<PathBuf>,
    /// Optional JSON summary file the program writes; parsed into the
    /// result payload when present.
    pub summary_path: Option<PathBuf>,
    /// Per-job maximum runtime, overriding the configured default.
    pub timeout: Option<Duration>,
}

impl JobSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: PathBuf::from("."),
            name: None,
            outputs: Vec::new(),
            summary_path: None,
            timeout: None,
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.outputs.push(path.into());
        self
    }

    pub fn with_summary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The caller-supplied name, or a label derived from the program.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        self.program
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "job".to_string())
    }
}

/// Structured payload describing a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub exit_code: i32,
    /// Declared output locations that exist on disk at completion time.
    pub outputs: Vec<PathBuf>,
    /// Parsed JSON summary, when the job declared a summary file and the
    /// program wrote valid JSON there.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<serde_json::Value>,
}

/// Point-in-time view of one job, safe to hand to any caller.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub name: String,
    pub state: JobState,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a result query: the payload for completed jobs, an explicit
/// not-ready indicator for everything else, never a silently empty value.
#[derive(Debug, Clone)]
pub enum JobResultStatus {
    Ready(JobOutcome),
    NotReady(JobState),
}

/// Result of a tail read against a job's log.
#[derive(Debug, Clone, Serialize)]
pub struct LogTail {
    pub lines: Vec<String>,
    pub total_lines: usize,
}

/// State-change notification published on the manager's event channel.
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub job_id: JobId,
    pub name: String,
    pub state: JobState,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Acknowledgement returned to a cancellation caller.
#[derive(Debug, Clone, Serialize)]
pub struct CancelReceipt {
    pub job_id: JobId,
    pub cancelled: bool,
    /// The state observed when the request was accepted.
    pub state: JobState,
}
