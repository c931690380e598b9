//! Cron-triggered headless agent scheduler for the codeck daemon:
//! per-cwd mutual exclusion, timeout/`SIGKILL` escalation, retry
//! quarantine, objective hygiene scanning, and a manifest that
//! reconstructs itself from the agents directory if both the primary file
//! and its backup are lost.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cron;
pub mod error;
pub mod execution;
pub mod hygiene;
pub mod manifest;
pub mod prelude;
pub mod queue;
pub mod scheduler;
pub mod types;

pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::{AgentScheduler, SchedulerEvent};
