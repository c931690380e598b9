//! Agent configuration, runtime state, and execution record shapes.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Execution log lines beyond this many bytes are dropped with a truncation
/// marker rather than growing the raw log without bound.
pub const MAX_LOG_BYTES: usize = 1024 * 1024;

/// Lower bound on the configurable SIGTERM-to-SIGKILL grace period.
pub const KILL_GRACE_MIN_SECS: u64 = 5;
/// Upper bound on the configurable SIGTERM-to-SIGKILL grace period.
pub const KILL_GRACE_MAX_SECS: u64 = 60;

/// Execution records beyond this count (oldest first) are pruned from an
/// agent's `executions/` directory.
pub const EXECUTION_HISTORY_RETENTION: usize = 50;

/// Clamp a requested kill-grace period into the allowed range.
#[must_use]
pub fn clamp_kill_grace(secs: u64) -> u64 {
    secs.clamp(KILL_GRACE_MIN_SECS, KILL_GRACE_MAX_SECS)
}

/// Whether an agent is still eligible to be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Cron is armed; the agent may run on its schedule.
    Active,
    /// `maxRetries` was reached; cron is disarmed until the operator
    /// re-activates the agent.
    Error,
}

/// The outcome of a single headless execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The process exited zero before its timeout.
    Success,
    /// The process exited non-zero before its timeout.
    Failure,
    /// The process was still running at its timeout and was signalled.
    Timeout,
}

impl ExecutionOutcome {
    /// Whether this outcome counts toward `consecutiveFailures`.
    #[must_use]
    pub fn is_failure(self) -> bool {
        !matches!(self, ExecutionOutcome::Success)
    }
}

/// A pattern match from the objective hygiene scan. Recorded as a warning,
/// never a hard block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveHygieneFlag {
    /// Objective asks to run a container/process in privileged mode.
    PrivilegedRun,
    /// Objective asks to enter another namespace (`nsenter`, `setns`, ...).
    NamespaceEntry,
    /// Objective asks to mount the host filesystem into a container.
    HostFilesystemMount,
    /// Objective asks for host PID or network namespace access.
    HostPidOrNet,
}

/// Persisted agent configuration (`agents/<id>/config.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Stable agent identifier; also the name of its directory under
    /// `agents/`.
    pub id: Uuid,
    /// Operator-facing display name.
    pub name: String,
    /// Working directory the headless agent is spawned in.
    pub cwd: PathBuf,
    /// The instruction text passed to the headless agent.
    pub objective: String,
    /// Five-field cron expression.
    pub cron_expr: String,
    /// Whether cron is armed. Set to `false` automatically when the agent
    /// enters `AgentStatus::Error`.
    pub active: bool,
    /// Consecutive failures before the agent is quarantined into `error`.
    pub max_retries: u32,
    /// Wall-clock timeout after which `SIGTERM` is sent.
    pub timeout_secs: u64,
    /// Grace period between `SIGTERM` and `SIGKILL`, clamped to
    /// `[KILL_GRACE_MIN_SECS, KILL_GRACE_MAX_SECS]`.
    pub kill_grace_secs: u64,
    /// When this agent was created.
    pub created_at: DateTime<Utc>,
    /// Hygiene warnings recorded the last time the objective was accepted.
    #[serde(default)]
    pub hygiene_flags: Vec<ObjectiveHygieneFlag>,
}

impl AgentConfig {
    /// Build a new agent config, clamping the kill grace and generating a
    /// fresh id.
    #[must_use]
    pub fn new(
        name: String,
        cwd: PathBuf,
        objective: String,
        cron_expr: String,
        max_retries: u32,
        timeout_secs: u64,
        kill_grace_secs: u64,
        hygiene_flags: Vec<ObjectiveHygieneFlag>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            cwd,
            objective,
            cron_expr,
            active: true,
            max_retries,
            timeout_secs,
            kill_grace_secs: clamp_kill_grace(kill_grace_secs),
            created_at: now,
            hygiene_flags,
        }
    }
}

/// Persisted agent runtime state (`agents/<id>/state.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// Current schedulability.
    pub status: AgentStatus,
    /// Next scheduled fire time, recomputed after every tick.
    pub next_run_at: Option<DateTime<Utc>>,
    /// When the agent last started running.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Consecutive non-success outcomes. Reset to zero on success.
    pub consecutive_failures: u32,
    /// Outcome of the most recent run, if any.
    pub last_outcome: Option<ExecutionOutcome>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            status: AgentStatus::Active,
            next_run_at: None,
            last_run_at: None,
            consecutive_failures: 0,
            last_outcome: None,
        }
    }
}

/// A single execution's result record (`agents/<id>/executions/<ts>.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// When the process was spawned.
    pub started_at: DateTime<Utc>,
    /// When the process exited (or was killed).
    pub finished_at: DateTime<Utc>,
    /// The outcome of this run.
    pub outcome: ExecutionOutcome,
    /// Process exit code, if it exited on its own.
    pub exit_code: Option<i32>,
    /// Whether the raw log hit `MAX_LOG_BYTES` and was truncated.
    pub log_truncated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kill_grace_clamps_into_range() {
        assert_eq!(clamp_kill_grace(0), KILL_GRACE_MIN_SECS);
        assert_eq!(clamp_kill_grace(5), 5);
        assert_eq!(clamp_kill_grace(30), 30);
        assert_eq!(clamp_kill_grace(60), 60);
        assert_eq!(clamp_kill_grace(999), KILL_GRACE_MAX_SECS);
    }

    #[test]
    fn failure_and_timeout_count_as_failure() {
        assert!(!ExecutionOutcome::Success.is_failure());
        assert!(ExecutionOutcome::Failure.is_failure());
        assert!(ExecutionOutcome::Timeout.is_failure());
    }

    #[test]
    fn new_agent_config_is_active_with_fresh_id() {
        let now = Utc::now();
        let cfg = AgentConfig::new(
            "nightly-cleanup".into(),
            PathBuf::from("/tmp/proj"),
            "tidy up stale branches".into(),
            "0 3 * * *".into(),
            3,
            600,
            999,
            vec![],
            now,
        );
        assert!(cfg.active);
        assert_eq!(cfg.kill_grace_secs, KILL_GRACE_MAX_SECS);
        assert_ne!(cfg.id, Uuid::nil());
    }
}
