// crates/core/src/config.rs
//! Runtime tuning for the job supervisor.

use std::time::Duration;

/// Tuning knobs for the job manager and its per-job supervisors.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Maximum number of concurrently running jobs; `0` means unbounded.
    pub max_concurrent: usize,
    /// Time a process gets to exit cooperatively after a termination
    /// request before it is forcibly killed.
    pub grace_period: Duration,
    /// Default maximum runtime for jobs whose spec does not set one.
    /// `None` means no limit.
    pub default_timeout: Option<Duration>,
    /// Exit code that marks a run as successful.
    pub success_exit_code: i32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            grace_period: Duration::from_secs(10),
            default_timeout: None,
            success_exit_code: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SupervisorConfig::default();
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.grace_period, Duration::from_secs(10));
        assert!(config.default_timeout.is_none());
        assert_eq!(config.success_exit_code, 0);
    }
}
