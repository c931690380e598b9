//! Headless agent execution.
//!
//! Spawns the agent binary with a streaming JSON output format, extracts
//! text tokens for a live (unredacted) broadcast view while accumulating a
//! redacted raw log, and enforces the timeout/`SIGTERM`/`SIGKILL`
//! escalation.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::broadcast;
use tokio::time::{timeout, Duration};

use codeck_memory::sanitize::sanitize;

use crate::error::SchedulerResult;
use crate::types::{clamp_kill_grace, ExecutionOutcome, MAX_LOG_BYTES};

/// A text token extracted from the agent's streaming JSON output.
///
/// Broadcast unredacted: this is the live view, distinct from the
/// persisted log.
#[derive(Debug, Clone)]
pub struct TextToken {
    /// The token's text content.
    pub text: String,
}

/// The result of running one headless execution to completion.
pub struct ExecutionOutput {
    /// `success`, `failure`, or `timeout`.
    pub outcome: ExecutionOutcome,
    /// Process exit code, if it exited on its own.
    pub exit_code: Option<i32>,
    /// Whether the raw log hit [`MAX_LOG_BYTES`] and was truncated.
    pub log_truncated: bool,
    /// The secret-redacted raw log, ready to persist.
    pub redacted_log: String,
}

/// Run `program` with `args` in `cwd`, using exactly `env` as the child's
/// environment. Each stdout line is parsed as JSON; a `text` (or
/// `delta.text`) field, if present, is sent on `token_tx`.
///
/// A `SIGTERM` is sent at `timeout_secs`; if the process is still alive
/// after `kill_grace_secs` (clamped to `[5, 60]`), a `SIGKILL` follows.
///
/// # Errors
///
/// Returns an error if the child cannot be spawned or `wait` fails for a
/// reason other than the timeout escalation above.
pub async fn run(
    program: &str,
    args: &[String],
    cwd: &Path,
    env: HashMap<String, String>,
    timeout_secs: u64,
    kill_grace_secs: u64,
    token_tx: broadcast::Sender<TextToken>,
) -> SchedulerResult<ExecutionOutput> {
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .env_clear()
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = command.spawn()?;
    let pid = child.id();
    let stdout = child.stdout.take().expect("stdout is piped");
    let mut lines = BufReader::new(stdout).lines();

    let mut raw_log = String::new();
    let mut truncated = false;

    let drain_and_wait = async {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    push_bounded(&mut raw_log, &sanitize(&line), &mut truncated);
                    if let Some(text) = extract_text(&line) {
                        let _ = token_tx.send(TextToken { text });
                    }
                }
                Ok(None) => break,
                Err(_) => break,
            }
        }
        child.wait().await
    };

    match timeout(Duration::from_secs(timeout_secs.max(1)), drain_and_wait).await {
        Ok(Ok(status)) => {
            let outcome = if status.success() {
                ExecutionOutcome::Success
            } else {
                ExecutionOutcome::Failure
            };
            Ok(ExecutionOutput {
                outcome,
                exit_code: status.code(),
                log_truncated: truncated,
                redacted_log: raw_log,
            })
        }
        Ok(Err(e)) => Err(e.into()),
        Err(_elapsed) => {
            escalate(pid, kill_grace_secs).await;
            Ok(ExecutionOutput {
                outcome: ExecutionOutcome::Timeout,
                exit_code: None,
                log_truncated: truncated,
                redacted_log: raw_log,
            })
        }
    }
}

/// `SIGTERM`, wait up to the (clamped) grace period, then `SIGKILL`.
async fn escalate(pid: Option<u32>, kill_grace_secs: u64) {
    let Some(pid) = pid else { return };
    let nix_pid = Pid::from_raw(pid as i32);
    if let Err(e) = kill(nix_pid, Signal::SIGTERM) {
        tracing::warn!(pid, error = %e, "failed to send SIGTERM to timed-out agent");
    }

    let grace = clamp_kill_grace(kill_grace_secs);
    tokio::time::sleep(Duration::from_secs(grace)).await;

    if kill(nix_pid, None).is_ok() {
        tracing::warn!(pid, "agent still alive after grace period, sending SIGKILL");
        if let Err(e) = kill(nix_pid, Signal::SIGKILL) {
            tracing::warn!(pid, error = %e, "failed to send SIGKILL to timed-out agent");
        }
    }
}

fn extract_text(line: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    if let Some(text) = value.get("text").and_then(serde_json::Value::as_str) {
        return Some(text.to_string());
    }
    value
        .get("delta")
        .and_then(|d| d.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

fn push_bounded(log: &mut String, line: &str, truncated: &mut bool) {
    if *truncated {
        return;
    }
    if log.len() + line.len() + 1 > MAX_LOG_BYTES {
        log.push_str("...[log truncated at size limit]\n");
        *truncated = true;
        return;
    }
    log.push_str(line);
    log.push('\n');
}
