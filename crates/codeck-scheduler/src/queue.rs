//! Per-cwd mutual exclusion.
//!
//! A global map of `cwd -> currently-running agent` plus a per-cwd FIFO
//! queue serialises agents that share a working directory. Re-entry for an
//! agent that is already the one running at that cwd is a no-op.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

#[derive(Default)]
struct CwdQueue {
    running: Option<Uuid>,
    pending: VecDeque<Uuid>,
}

/// Shared, cheaply-cloned per-cwd run queue.
#[derive(Clone, Default)]
pub struct CwdMutex {
    queues: Arc<DashMap<PathBuf, CwdQueue>>,
}

impl CwdMutex {
    /// An empty mutual-exclusion map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request to run `agent_id` at `cwd`.
    ///
    /// Returns `true` if the caller may start immediately. Returns `false`
    /// if another agent is already running at this cwd, in which case
    /// `agent_id` is appended to the FIFO queue (unless it's already
    /// queued, or it is itself the currently running agent, in which case
    /// this is a no-op).
    pub fn try_start(&self, cwd: &Path, agent_id: Uuid) -> bool {
        let mut entry = self.queues.entry(cwd.clone()).or_default();
        if entry.running == Some(agent_id) {
            return false;
        }
        if entry.running.is_none() {
            entry.running = Some(agent_id);
            true
        } else {
            if !entry.pending.contains(&agent_id) {
                entry.pending.push_back(agent_id);
            }
            false
        }
    }

    /// Mark `agent_id`'s run at `cwd` as finished. Returns the next queued
    /// agent id that is now clear to start, if any.
    pub fn finish(&self, cwd: &Path, agent_id: Uuid) -> Option<Uuid> {
        let mut entry = self.queues.get_mut(cwd)?;
        if entry.running != Some(agent_id) {
            return None;
        }
        let next = entry.pending.pop_front();
        entry.running = next;
        next
    }

    /// Whether any agent is currently running at `cwd`.
    #[must_use]
    pub fn is_busy(&self, cwd: &Path) -> bool {
        self.queues
            .get(cwd)
            .is_some_and(|e| e.running.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_caller_starts_immediately() {
        let m = CwdMutex::new();
        let cwd = PathBuf::from("/tmp/proj");
        assert!(m.try_start(&cwd, Uuid::new_v4()));
    }

    #[test]
    fn second_caller_at_same_cwd_is_queued() {
        let m = CwdMutex::new();
        let cwd = PathBuf::from("/tmp/proj");
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(m.try_start(&cwd, a));
        assert!(!m.try_start(&cwd, b));
        assert!(m.is_busy(&cwd));
    }

    #[test]
    fn reentry_for_running_agent_is_noop() {
        let m = CwdMutex::new();
        let cwd = PathBuf::from("/tmp/proj");
        let a = Uuid::new_v4();
        assert!(m.try_start(&cwd, a));
        assert!(!m.try_start(&cwd, a));
    }

    #[test]
    fn finish_starts_next_queued_agent() {
        let m = CwdMutex::new();
        let cwd = PathBuf::from("/tmp/proj");
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        m.try_start(&cwd, a);
        m.try_start(&cwd, b);

        let next = m.finish(&cwd, a);
        assert_eq!(next, Some(b));
        assert!(m.is_busy(&cwd));
    }

    #[test]
    fn finish_with_no_queue_leaves_cwd_idle() {
        let m = CwdMutex::new();
        let cwd = PathBuf::from("/tmp/proj");
        let a = Uuid::new_v4();
        m.try_start(&cwd, a);
        assert_eq!(m.finish(&cwd, a), None);
        assert!(!m.is_busy(&cwd));
    }

    #[test]
    fn finish_by_non_running_agent_is_ignored() {
        let m = CwdMutex::new();
        let cwd = PathBuf::from("/tmp/proj");
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        m.try_start(&cwd, a);
        assert_eq!(m.finish(&cwd, b), None);
        assert!(m.is_busy(&cwd));
    }

    #[test]
    fn different_cwds_are_independent() {
        let m = CwdMutex::new();
        let cwd_a = PathBuf::from("/tmp/a");
        let cwd_b = PathBuf::from("/tmp/b");
        assert!(m.try_start(&cwd_a, Uuid::new_v4()));
        assert!(m.try_start(&cwd_b, Uuid::new_v4()));
    }
}
