//! Fire-and-forget conversation-id discovery: watches an agent's per-cwd
//! transcript directory for the file that belongs to a freshly spawned or
//! resumed session, without ever blocking on synchronous filesystem calls.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::session::PtySession;
use crate::types::ResumePolicy;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const POLL_TIMEOUT: Duration = Duration::from_secs(15);

/// Spawn the poller for `session`, watching `transcript_dir` according to
/// `policy`. Calls `session.set_conversation_id` once a genuine candidate
/// is found, and writes the result through `on_discovered` so the caller
/// can re-snapshot persisted state.
pub fn spawn_discovery<F>(
    session: Arc<PtySession>,
    transcript_dir: PathBuf,
    policy: ResumePolicy,
    on_discovered: F,
) -> tokio::task::JoinHandle<()>
where
    F: FnOnce(String) + Send + 'static,
{
    tokio::spawn(async move {
        let baseline = match &policy {
            ResumePolicy::Fresh => Baseline::ExistingFiles(list_jsonl_files(&transcript_dir).await),
            ResumePolicy::Continue | ResumePolicy::ResumeInteractive => {
                Baseline::ModTimes(mod_times(&transcript_dir).await)
            }
            ResumePolicy::ResumeById(id) => {
                on_discovered(id.clone());
                session.set_conversation_id(id.clone());
                return;
            }
        };

        let deadline = tokio::time::Instant::now() + POLL_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            tokio::time::sleep(POLL_INTERVAL).await;
            if let Some(id) = poll_once(&transcript_dir, &baseline).await {
                session.set_conversation_id(id.clone());
                on_discovered(id);
                return;
            }
        }
        tracing::debug!(
            session = %session.id,
            "conversation id discovery timed out after {:?}",
            POLL_TIMEOUT
        );
    })
}

enum Baseline {
    ExistingFiles(Vec<PathBuf>),
    ModTimes(Vec<(PathBuf, std::time::SystemTime)>),
}

async fn poll_once(dir: &Path, baseline: &Baseline) -> Option<String> {
    match baseline {
        Baseline::ExistingFiles(existing) => {
            for path in list_jsonl_files(dir).await {
                if !existing.contains(&path) && has_genuine_entry(&path).await {
                    return file_stem(&path);
                }
            }
            None
        }
        Baseline::ModTimes(existing) => {
            let current = mod_times(dir).await;
            for (path, mtime) in &current {
                let prior = existing.iter().find(|(p, _)| p == path).map(|(_, t)| *t);
                let changed = prior.is_none_or(|prior_mtime| *mtime > prior_mtime);
                if changed && has_genuine_entry(path).await {
                    return file_stem(path);
                }
            }
            None
        }
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

async fn list_jsonl_files(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return out;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
            out.push(path);
        }
    }
    out
}

async fn mod_times(dir: &Path) -> Vec<(PathBuf, std::time::SystemTime)> {
    let mut out = Vec::new();
    for path in list_jsonl_files(dir).await {
        if let Ok(meta) = tokio::fs::metadata(&path).await {
            if let Ok(modified) = meta.modified() {
                out.push((path, modified));
            }
        }
    }
    out
}

/// A candidate file counts only once it contains at least one entry with
/// a user or assistant role, not just metadata lines.
async fn has_genuine_entry(path: &Path) -> bool {
    let Ok(content) = tokio::fs::read_to_string(path).await else {
        return false;
    };
    content.lines().any(|line| {
        serde_json::from_str::<serde_json::Value>(line)
            .ok()
            .and_then(|v| v.get("role").and_then(|r| r.as_str()).map(str::to_string))
            .is_some_and(|role| role == "user" || role == "assistant")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn spawn_dummy_session() -> Arc<PtySession> {
        PtySession::spawn(
            Uuid::new_v4(),
            crate::types::SessionKind::Shell,
            std::env::temp_dir(),
            "dummy".into(),
            "/bin/sh",
            &["-c".into(), "sleep 5".into()],
            &HashMap::new(),
        )
        .expect("spawn")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fresh_policy_detects_new_file_with_genuine_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let session = spawn_dummy_session();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let handle = spawn_discovery(session.clone(), tmp.path().to_path_buf(), ResumePolicy::Fresh, move |id| {
            let _ = tx.send(id);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        tokio::fs::write(
            tmp.path().join("conv-1.jsonl"),
            r#"{"role":"user","text":"hi"}"#,
        )
        .await
        .unwrap();

        let id = tokio::time::timeout(Duration::from_secs(3), rx).await.unwrap().unwrap();
        assert_eq!(id, "conv-1");
        handle.abort();
        session.destroy().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn resume_by_id_short_circuits_without_polling() {
        let tmp = tempfile::tempdir().unwrap();
        let session = spawn_dummy_session();
        let (tx, rx) = tokio::sync::oneshot::channel();
        spawn_discovery(
            session.clone(),
            tmp.path().to_path_buf(),
            ResumePolicy::ResumeById("known-id".into()),
            move |id| {
                let _ = tx.send(id);
            },
        );
        let id = tokio::time::timeout(Duration::from_secs(1), rx).await.unwrap().unwrap();
        assert_eq!(id, "known-id");
        assert_eq!(session.conversation_id.lock().unwrap().as_deref(), Some("known-id"));
        session.destroy().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn metadata_only_file_is_not_a_genuine_candidate() {
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::write(tmp.path().join("meta.jsonl"), r#"{"type":"metadata"}"#)
            .await
            .unwrap();
        assert!(!has_genuine_entry(&tmp.path().join("meta.jsonl")).await);
    }
}
