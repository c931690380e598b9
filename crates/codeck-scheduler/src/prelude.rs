//! Convenience re-exports for consumers of this crate.

pub use crate::error::{SchedulerError, SchedulerResult};
pub use crate::scheduler::{AgentScheduler, SchedulerEvent};
pub use crate::types::{
    AgentConfig, AgentState, AgentStatus, ExecutionOutcome, ExecutionRecord,
    ObjectiveHygieneFlag, EXECUTION_HISTORY_RETENTION, KILL_GRACE_MAX_SECS, KILL_GRACE_MIN_SECS,
    MAX_LOG_BYTES,
};
