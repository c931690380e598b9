//! The `AgentScheduler`: cron-driven headless agent runs, per-cwd mutual
//! exclusion, timeout/retry bookkeeping, and manifest persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use codeck_core::atomic::{write_atomic, ActiveWriteGuard};
use codeck_core::dirs::CodeckWorkspace;

use crate::cron;
use crate::error::{SchedulerError, SchedulerResult};
use crate::execution::{self, TextToken};
use crate::hygiene;
use crate::manifest;
use crate::queue::CwdMutex;
use crate::types::{
    AgentConfig, AgentState, AgentStatus, ExecutionOutcome, ExecutionRecord,
    ObjectiveHygieneFlag, EXECUTION_HISTORY_RETENTION,
};

/// How often the scheduler checks for due agents. Cron resolution is a
/// minute, so this only needs to be finer than that.
const TICK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(20);

/// Events broadcast to observers (the gateway's agent log view, tests).
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// `nextRunAt` was recomputed for an agent.
    NextRunUpdated {
        /// The agent this applies to.
        agent_id: Uuid,
        /// The newly computed fire time, or `None` if cron is disarmed.
        next_run_at: Option<DateTime<Utc>>,
    },
    /// An agent's run was enqueued behind another run at the same cwd.
    RunQueued {
        /// The agent this applies to.
        agent_id: Uuid,
    },
    /// An agent's headless execution started.
    RunStarted {
        /// The agent this applies to.
        agent_id: Uuid,
    },
    /// A text token was extracted from an agent's streaming output.
    Token {
        /// The agent this applies to.
        agent_id: Uuid,
        /// The unredacted token text.
        text: String,
    },
    /// An agent's headless execution finished.
    RunFinished {
        /// The agent this applies to.
        agent_id: Uuid,
        /// The run's outcome.
        outcome: ExecutionOutcome,
    },
    /// An agent exceeded `maxRetries` and its cron was disarmed.
    Disarmed {
        /// The agent this applies to.
        agent_id: Uuid,
    },
}

struct AgentEntry {
    config: AgentConfig,
    state: AgentState,
}

/// Cron-triggered headless agent scheduler.
pub struct AgentScheduler {
    workspace: CodeckWorkspace,
    agent_binary: String,
    agents: DashMap<Uuid, Arc<RwLock<AgentEntry>>>,
    cwd_mutex: CwdMutex,
    guard: ActiveWriteGuard,
    events_tx: broadcast::Sender<SchedulerEvent>,
}

impl AgentScheduler {
    /// Build an empty scheduler. Call [`AgentScheduler::load`] to restore
    /// agents from disk before starting the tick loop.
    #[must_use]
    pub fn new(workspace: CodeckWorkspace, agent_binary: String) -> Self {
        let (events_tx, _) = broadcast::channel(1024);
        Self {
            workspace,
            agent_binary,
            agents: DashMap::new(),
            cwd_mutex: CwdMutex::new(),
            guard: ActiveWriteGuard::new(),
            events_tx,
        }
    }

    /// Subscribe to scheduler events (run lifecycle, streamed tokens,
    /// `nextRunAt` updates).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events_tx.subscribe()
    }

    /// Number of agents currently tracked in memory.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Load the manifest and every agent's config/state from disk.
    /// Individual corrupt configs or states are skipped with a warning.
    pub async fn load(&self) -> SchedulerResult<()> {
        let ids = manifest::load(&self.workspace).await?;
        for id in ids {
            match self.load_one(id).await {
                Ok(entry) => {
                    self.agents.insert(id, Arc::new(RwLock::new(entry)));
                }
                Err(e) => {
                    tracing::warn!(agent = %id, error = %e, "skipping agent with unreadable config/state");
                }
            }
        }
        Ok(())
    }

    async fn load_one(&self, id: Uuid) -> SchedulerResult<AgentEntry> {
        let id_str = id.to_string();
        let config_bytes = tokio::fs::read(self.workspace.agent_config_file(&id_str)).await?;
        let config: AgentConfig = serde_json::from_slice(&config_bytes)?;
        let state = match tokio::fs::read(self.workspace.agent_state_file(&id_str)).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AgentState::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(AgentEntry { config, state })
    }

    /// Create a new agent, persist its config/state, and add it to the
    /// manifest. Returns the new agent's id and any hygiene flags its
    /// objective raised (advisory only).
    pub async fn create_agent(
        &self,
        name: String,
        cwd: std::path::PathBuf,
        objective: String,
        cron_expr: String,
        max_retries: u32,
        timeout_secs: u64,
        kill_grace_secs: u64,
    ) -> SchedulerResult<(Uuid, Vec<ObjectiveHygieneFlag>)> {
        cron::parse(&cron_expr)?;
        let flags = hygiene::scan_and_log(&name, &objective);
        let now = Utc::now();
        let config = AgentConfig::new(
            name,
            cwd,
            objective,
            cron_expr.clone(),
            max_retries,
            timeout_secs,
            kill_grace_secs,
            flags.clone(),
            now,
        );
        let id = config.id;
        let mut state = AgentState::default();
        state.next_run_at = Some(cron::next_run_after(&cron_expr, now)?);

        self.persist_entry(id, &config, &state).await?;
        self.append_to_manifest(id).await?;
        self.agents
            .insert(id, Arc::new(RwLock::new(AgentEntry { config, state })));
        Ok((id, flags))
    }

    /// Fetch a copy of an agent's current config.
    pub async fn get_config(&self, id: Uuid) -> SchedulerResult<AgentConfig> {
        let entry = self
            .agents
            .get(&id)
            .ok_or_else(|| SchedulerError::AgentNotFound(id.to_string()))?
            .clone();
        Ok(entry.read().await.config.clone())
    }

    /// Fetch a copy of an agent's current state.
    pub async fn get_state(&self, id: Uuid) -> SchedulerResult<AgentState> {
        let entry = self
            .agents
            .get(&id)
            .ok_or_else(|| SchedulerError::AgentNotFound(id.to_string()))?
            .clone();
        Ok(entry.read().await.state.clone())
    }

    /// List every tracked agent id.
    #[must_use]
    pub fn list_ids(&self) -> Vec<Uuid> {
        self.agents.iter().map(|e| *e.key()).collect()
    }

    /// Arm or disarm an agent's cron. Re-activating after a retry-quarantine
    /// resets `consecutiveFailures` and recomputes `nextRunAt`.
    pub async fn set_active(&self, id: Uuid, active: bool) -> SchedulerResult<()> {
        let entry = self
            .agents
            .get(&id)
            .ok_or_else(|| SchedulerError::AgentNotFound(id.to_string()))?
            .clone();
        let mut guard = entry.write().await;
        guard.config.active = active;
        if active {
            guard.state.status = AgentStatus::Active;
            guard.state.consecutive_failures = 0;
            guard.state.next_run_at = Some(cron::next_run_after(&guard.config.cron_expr, Utc::now())?);
        } else {
            guard.state.next_run_at = None;
        }
        self.persist_entry(id, &guard.config, &guard.state).await?;
        Ok(())
    }

    /// Update an existing agent's editable fields. A new `cron_expr` is
    /// validated and its `nextRunAt` recomputed before anything is
    /// persisted.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_agent(
        &self,
        id: Uuid,
        name: String,
        objective: String,
        cron_expr: String,
        max_retries: u32,
        timeout_secs: u64,
        kill_grace_secs: u64,
    ) -> SchedulerResult<Vec<ObjectiveHygieneFlag>> {
        cron::parse(&cron_expr)?;
        let entry = self
            .agents
            .get(&id)
            .ok_or_else(|| SchedulerError::AgentNotFound(id.to_string()))?
            .clone();
        let flags = hygiene::scan_and_log(&name, &objective);

        let mut guard = entry.write().await;
        guard.config.name = name;
        guard.config.objective = objective;
        guard.config.cron_expr = cron_expr.clone();
        guard.config.max_retries = max_retries;
        guard.config.timeout_secs = timeout_secs;
        guard.config.kill_grace_secs = crate::types::clamp_kill_grace(kill_grace_secs);
        guard.config.hygiene_flags = flags.clone();
        if guard.config.active {
            guard.state.next_run_at = Some(cron::next_run_after(&cron_expr, Utc::now())?);
        }
        self.persist_entry(id, &guard.config, &guard.state).await?;
        Ok(flags)
    }

    /// Delete an agent: remove it from the manifest, drop its in-memory
    /// entry, and delete its on-disk directory.
    pub async fn delete_agent(&self, id: Uuid) -> SchedulerResult<()> {
        if self.agents.remove(&id).is_none() {
            return Err(SchedulerError::AgentNotFound(id.to_string()));
        }
        let ids: Vec<Uuid> = manifest::load(&self.workspace)
            .await?
            .into_iter()
            .filter(|existing| *existing != id)
            .collect();
        manifest::save(&self.workspace, &self.guard, &ids).await?;
        let dir = self.workspace.agent_dir(&id.to_string());
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Fire `id` immediately, outside its cron schedule. Subject to the
    /// same per-cwd mutual exclusion as a scheduled run.
    pub fn trigger_now(self: &Arc<Self>, id: Uuid) -> SchedulerResult<()> {
        if !self.agents.contains_key(&id) {
            return Err(SchedulerError::AgentNotFound(id.to_string()));
        }
        self.enqueue_run(id);
        Ok(())
    }

    async fn append_to_manifest(&self, id: Uuid) -> SchedulerResult<()> {
        let mut ids = manifest::load(&self.workspace).await?;
        if !ids.contains(&id) {
            ids.push(id);
        }
        manifest::save(&self.workspace, &self.guard, &ids).await
    }

    async fn persist_entry(
        &self,
        id: Uuid,
        config: &AgentConfig,
        state: &AgentState,
    ) -> SchedulerResult<()> {
        let id_str = id.to_string();
        let config_bytes = serde_json::to_vec_pretty(config)?;
        let state_bytes = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.guard, &self.workspace.agent_config_file(&id_str), &config_bytes).await?;
        write_atomic(&self.guard, &self.workspace.agent_state_file(&id_str), &state_bytes).await?;
        Ok(())
    }

    /// Spawn the periodic tick loop that enqueues due agents and
    /// recomputes `nextRunAt`. Returns a handle the caller can abort at
    /// shutdown.
    pub fn spawn_tick_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                interval.tick().await;
                scheduler.tick(Utc::now()).await;
            }
        })
    }

    /// One scheduler tick: enqueue every due, active agent, then
    /// recompute and broadcast its `nextRunAt`. Enqueue always happens
    /// before recomputation, per tick.
    pub async fn tick(self: &Arc<Self>, now: DateTime<Utc>) {
        let due: Vec<Uuid> = self
            .agents
            .iter()
            .filter_map(|e| {
                let entry = e.value();
                entry.try_read().ok().and_then(|g| {
                    let due = g.state.status == AgentStatus::Active
                        && g.config.active
                        && g.state.next_run_at.is_some_and(|t| t <= now);
                    due.then_some(*e.key())
                })
            })
            .collect();

        for id in due {
            self.enqueue_run(id);
            if let Err(e) = self.recompute_next_run(id, now).await {
                tracing::warn!(agent = %id, error = %e, "failed to recompute next run time");
            }
        }
    }

    async fn recompute_next_run(&self, id: Uuid, now: DateTime<Utc>) -> SchedulerResult<()> {
        let Some(entry) = self.agents.get(&id).map(|e| e.clone()) else {
            return Ok(());
        };
        let mut guard = entry.write().await;
        if guard.state.status != AgentStatus::Active {
            return Ok(());
        }
        let next = cron::next_run_after(&guard.config.cron_expr, now)?;
        guard.state.next_run_at = Some(next);
        self.persist_entry(id, &guard.config, &guard.state).await?;
        let _ = self.events_tx.send(SchedulerEvent::NextRunUpdated {
            agent_id: id,
            next_run_at: Some(next),
        });
        Ok(())
    }

    /// Enqueue `id` for execution, starting it immediately if its cwd is
    /// free or queuing it behind the agent currently running there.
    /// Re-entry while `id` is already running is a no-op.
    fn enqueue_run(self: &Arc<Self>, id: Uuid) {
        let Some(entry) = self.agents.get(&id).map(|e| e.clone()) else {
            return;
        };
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let cwd = entry.read().await.config.cwd.clone();
            if scheduler.cwd_mutex.try_start(&cwd, id) {
                scheduler.run_and_advance_queue(id, cwd).await;
            } else {
                let _ = scheduler.events_tx.send(SchedulerEvent::RunQueued { agent_id: id });
            }
        });
    }

    async fn run_and_advance_queue(self: &Arc<Self>, id: Uuid, cwd: std::path::PathBuf) {
        self.execute_agent(id).await;
        if let Some(next_id) = self.cwd_mutex.finish(&cwd, id) {
            self.enqueue_run(next_id);
        }
    }

    async fn execute_agent(self: &Arc<Self>, id: Uuid) {
        let Some(entry) = self.agents.get(&id).map(|e| e.clone()) else {
            return;
        };
        let _ = self.events_tx.send(SchedulerEvent::RunStarted { agent_id: id });

        let (program, args, cwd, timeout_secs, kill_grace_secs) = {
            let guard = entry.read().await;
            (
                self.agent_binary.clone(),
                headless_args(&guard.config.objective),
                guard.config.cwd.clone(),
                guard.config.timeout_secs,
                guard.config.kill_grace_secs,
            )
        };
        let env = codeck_core::env_policy::clean_env();

        let (token_tx, mut token_rx) = broadcast::channel::<TextToken>(256);
        let events_tx = self.events_tx.clone();
        let forward = tokio::spawn(async move {
            while let Ok(token) = token_rx.recv().await {
                let _ = events_tx.send(SchedulerEvent::Token {
                    agent_id: id,
                    text: token.text,
                });
            }
        });

        let started_at = Utc::now();
        let result = execution::run(
            &program,
            &args,
            &cwd,
            env,
            timeout_secs,
            kill_grace_secs,
            token_tx,
        )
        .await;
        forward.abort();
        let finished_at = Utc::now();

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(agent = %id, error = %e, "headless execution failed to run");
                return;
            }
        };

        let record = ExecutionRecord {
            started_at,
            finished_at,
            outcome: output.outcome,
            exit_code: output.exit_code,
            log_truncated: output.log_truncated,
        };
        if let Err(e) = self
            .persist_execution(id, &record, &output.redacted_log)
            .await
        {
            tracing::warn!(agent = %id, error = %e, "failed to persist execution record");
        }

        self.record_outcome(id, output.outcome).await;
        let _ = self.events_tx.send(SchedulerEvent::RunFinished {
            agent_id: id,
            outcome: output.outcome,
        });
    }

    async fn record_outcome(&self, id: Uuid, outcome: ExecutionOutcome) {
        let Some(entry) = self.agents.get(&id).map(|e| e.clone()) else {
            return;
        };
        let mut guard = entry.write().await;
        guard.state.last_run_at = Some(Utc::now());
        guard.state.last_outcome = Some(outcome);

        if outcome.is_failure() {
            guard.state.consecutive_failures += 1;
            if guard.state.consecutive_failures >= guard.config.max_retries {
                guard.state.status = AgentStatus::Error;
                guard.state.next_run_at = None;
                guard.config.active = false;
                drop(guard);
                let _ = self.events_tx.send(SchedulerEvent::Disarmed { agent_id: id });
                let guard = entry.read().await;
                if let Err(e) = self.persist_entry(id, &guard.config, &guard.state).await {
                    tracing::warn!(agent = %id, error = %e, "failed to persist disarmed agent");
                }
                return;
            }
        } else {
            guard.state.consecutive_failures = 0;
        }
        if let Err(e) = self.persist_entry(id, &guard.config, &guard.state).await {
            tracing::warn!(agent = %id, error = %e, "failed to persist run outcome");
        }
    }

    async fn persist_execution(
        &self,
        id: Uuid,
        record: &ExecutionRecord,
        redacted_log: &str,
    ) -> SchedulerResult<()> {
        let id_str = id.to_string();
        let executions_dir = self.workspace.agent_executions_dir(&id_str);

        let stamp = record.started_at.format("%Y%m%dT%H%M%S%3fZ").to_string();
        let record_path = executions_dir.join(format!("{stamp}.json"));
        let log_path = executions_dir.join(format!("{stamp}.log"));

        let record_bytes = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.guard, &record_path, &record_bytes).await?;
        write_atomic(&self.guard, &log_path, redacted_log.as_bytes()).await?;

        prune_old_executions(&executions_dir).await?;
        Ok(())
    }
}

/// Build the headless CLI args for `objective`. The streaming JSON flag
/// name is a placeholder for whatever concrete agent binary is configured;
/// see the scheduler's design notes for the open question this resolves.
fn headless_args(objective: &str) -> Vec<String> {
    vec![
        "--print".to_string(),
        "--output-format".to_string(),
        "stream-json".to_string(),
        objective.to_string(),
    ]
}

/// Delete the oldest execution records beyond
/// [`EXECUTION_HISTORY_RETENTION`], pairing each `.json` with its `.log`.
async fn prune_old_executions(executions_dir: &std::path::Path) -> SchedulerResult<()> {
    let mut stems = Vec::new();
    let mut entries = tokio::fs::read_dir(executions_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(stem) = name.strip_suffix(".json") {
            stems.push(stem.to_string());
        }
    }
    stems.sort();
    if stems.len() <= EXECUTION_HISTORY_RETENTION {
        return Ok(());
    }
    let drop_count = stems.len() - EXECUTION_HISTORY_RETENTION;
    for stem in &stems[..drop_count] {
        let _ = tokio::fs::remove_file(executions_dir.join(format!("{stem}.json"))).await;
        let _ = tokio::fs::remove_file(executions_dir.join(format!("{stem}.log"))).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_workspace(tmp: &tempfile::TempDir) -> CodeckWorkspace {
        let ws = CodeckWorkspace::from_path(tmp.path().join(".codeck"));
        ws.ensure().expect("ensure");
        ws
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_agent_persists_config_and_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = test_workspace(&tmp);
        let scheduler = AgentScheduler::new(ws.clone(), "echo".into());

        let (id, flags) = scheduler
            .create_agent(
                "nightly".into(),
                tmp.path().to_path_buf(),
                "say hi".into(),
                "*/5 * * * *".into(),
                3,
                60,
                10,
            )
            .await
            .unwrap();

        assert!(flags.is_empty());
        assert_eq!(scheduler.agent_count(), 1);

        let loaded_ids = manifest::load(&ws).await.unwrap();
        assert_eq!(loaded_ids, vec![id]);

        let config = scheduler.get_config(id).await.unwrap();
        assert_eq!(config.name, "nightly");
        assert!(config.active);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn load_restores_agents_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = test_workspace(&tmp);
        let id = {
            let scheduler = AgentScheduler::new(ws.clone(), "echo".into());
            let (id, _) = scheduler
                .create_agent(
                    "reload-me".into(),
                    tmp.path().to_path_buf(),
                    "do the thing".into(),
                    "0 3 * * *".into(),
                    3,
                    60,
                    10,
                )
                .await
                .unwrap();
            id
        };

        let scheduler = AgentScheduler::new(ws, "echo".into());
        scheduler.load().await.unwrap();
        assert_eq!(scheduler.agent_count(), 1);
        let config = scheduler.get_config(id).await.unwrap();
        assert_eq!(config.name, "reload-me");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_cron_is_rejected_before_persisting() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = test_workspace(&tmp);
        let scheduler = AgentScheduler::new(ws, "echo".into());

        let result = scheduler
            .create_agent(
                "broken".into(),
                tmp.path().to_path_buf(),
                "noop".into(),
                "not a cron".into(),
                3,
                60,
                10,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(scheduler.agent_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn hygiene_flags_are_recorded_but_do_not_block_creation() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = test_workspace(&tmp);
        let scheduler = AgentScheduler::new(ws, "echo".into());

        let (id, flags) = scheduler
            .create_agent(
                "risky".into(),
                tmp.path().to_path_buf(),
                "run docker with --privileged".into(),
                "0 0 * * *".into(),
                3,
                60,
                10,
            )
            .await
            .unwrap();

        assert_eq!(flags, vec![ObjectiveHygieneFlag::PrivilegedRun]);
        let config = scheduler.get_config(id).await.unwrap();
        assert!(config.active);
        assert_eq!(config.hygiene_flags, flags);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn set_active_false_clears_next_run() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = test_workspace(&tmp);
        let scheduler = AgentScheduler::new(ws, "echo".into());
        let (id, _) = scheduler
            .create_agent(
                "toggle".into(),
                tmp.path().to_path_buf(),
                "noop".into(),
                "0 0 * * *".into(),
                3,
                60,
                10,
            )
            .await
            .unwrap();

        scheduler.set_active(id, false).await.unwrap();
        let state = scheduler.get_state(id).await.unwrap();
        assert_eq!(state.next_run_at, None);

        scheduler.set_active(id, true).await.unwrap();
        let state = scheduler.get_state(id).await.unwrap();
        assert!(state.next_run_at.is_some());
        assert_eq!(state.consecutive_failures, 0);
    }

    fn write_fake_agent_binary(dir: &std::path::Path, name: &str, exit_code: i32) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\necho '{{\"text\":\"ok\"}}'\nexit {exit_code}\n"))
            .unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn execute_agent_runs_headless_and_records_success() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = test_workspace(&tmp);
        let binary = write_fake_agent_binary(tmp.path(), "succeed.sh", 0);
        let scheduler = Arc::new(AgentScheduler::new(ws, binary));
        let (id, _) = scheduler
            .create_agent(
                "direct-run".into(),
                tmp.path().to_path_buf(),
                "say hi".into(),
                "0 0 * * *".into(),
                3,
                5,
                5,
            )
            .await
            .unwrap();

        scheduler.execute_agent(id).await;

        let state = scheduler.get_state(id).await.unwrap();
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.last_outcome, Some(ExecutionOutcome::Success));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeated_failures_disarm_after_max_retries() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = test_workspace(&tmp);
        let binary = write_fake_agent_binary(tmp.path(), "fail.sh", 1);
        let scheduler = Arc::new(AgentScheduler::new(ws, binary));
        let (id, _) = scheduler
            .create_agent(
                "flaky".into(),
                tmp.path().to_path_buf(),
                "say hi".into(),
                "0 0 * * *".into(),
                2,
                5,
                5,
            )
            .await
            .unwrap();

        scheduler.execute_agent(id).await;
        scheduler.execute_agent(id).await;

        let state = scheduler.get_state(id).await.unwrap();
        assert_eq!(state.status, AgentStatus::Error);
        let config = scheduler.get_config(id).await.unwrap();
        assert!(!config.active);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_agent_changes_fields_and_recomputes_next_run() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = test_workspace(&tmp);
        let scheduler = AgentScheduler::new(ws, "echo".into());
        let (id, _) = scheduler
            .create_agent(
                "original".into(),
                tmp.path().to_path_buf(),
                "do the thing".into(),
                "0 0 * * *".into(),
                3,
                60,
                10,
            )
            .await
            .unwrap();

        scheduler
            .update_agent(id, "renamed".into(), "do another thing".into(), "0 6 * * *".into(), 5, 120, 20)
            .await
            .unwrap();

        let config = scheduler.get_config(id).await.unwrap();
        assert_eq!(config.name, "renamed");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.cron_expr, "0 6 * * *");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_agent_rejects_invalid_cron() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = test_workspace(&tmp);
        let scheduler = AgentScheduler::new(ws, "echo".into());
        let (id, _) = scheduler
            .create_agent("x".into(), tmp.path().to_path_buf(), "y".into(), "0 0 * * *".into(), 3, 60, 10)
            .await
            .unwrap();

        let result = scheduler.update_agent(id, "x".into(), "y".into(), "garbage".into(), 3, 60, 10).await;
        assert!(result.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_agent_removes_from_manifest_and_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = test_workspace(&tmp);
        let scheduler = AgentScheduler::new(ws.clone(), "echo".into());
        let (id, _) = scheduler
            .create_agent("gone".into(), tmp.path().to_path_buf(), "y".into(), "0 0 * * *".into(), 3, 60, 10)
            .await
            .unwrap();

        scheduler.delete_agent(id).await.unwrap();
        assert_eq!(scheduler.agent_count(), 0);
        assert!(manifest::load(&ws).await.unwrap().is_empty());
        assert!(!ws.agent_dir(&id.to_string()).exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_agent_rejects_unknown_id() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = test_workspace(&tmp);
        let scheduler = AgentScheduler::new(ws, "echo".into());
        let result = scheduler.delete_agent(Uuid::new_v4()).await;
        assert!(matches!(result, Err(SchedulerError::AgentNotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn trigger_now_runs_agent_outside_its_schedule() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = test_workspace(&tmp);
        let binary = write_fake_agent_binary(tmp.path(), "trigger.sh", 0);
        let scheduler = Arc::new(AgentScheduler::new(ws, binary));
        let (id, _) = scheduler
            .create_agent("triggered".into(), tmp.path().to_path_buf(), "say hi".into(), "0 0 1 1 *".into(), 3, 5, 5)
            .await
            .unwrap();

        scheduler.trigger_now(id).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        let state = scheduler.get_state(id).await.unwrap();
        assert_eq!(state.last_outcome, Some(ExecutionOutcome::Success));
    }
}
