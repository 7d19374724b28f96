use std::time::Duration;

/// Timeouts and behaviour of the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Default time a single stop hook may take before it is abandoned
    pub stop_timeout: Duration,
    /// Time the whole shutdown may take before the process is forcibly exited
    pub shutdown_timeout: Duration,
    /// Time a single start hook may take, unbounded if `None`
    pub start_timeout: Option<Duration>,
    /// Listen for interrupt/terminate while running
    pub handle_signals: bool,
    /// Exit code used when shutdown has to be forced
    pub exit_code: i32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        LifecycleConfig {
            stop_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(30),
            start_timeout: None,
            handle_signals: true,
            exit_code: 1,
        }
    }
}
