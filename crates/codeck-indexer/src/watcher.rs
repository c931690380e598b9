//! Debounced filesystem watcher that re-sweeps the memory and session
//! trees after a quiet period following any change.

use std::sync::Arc;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::store::IndexStore;

const DEBOUNCE: Duration = Duration::from_secs(2);

/// Spawn a background task watching `memory_dir` and `sessions_dir`
/// recursively, calling [`IndexStore::full_sweep`] after each quiet
/// period. Returns a handle; dropping it stops the watcher.
pub fn spawn_index_watcher(
    store: Arc<IndexStore>,
    memory_dir: std::path::PathBuf,
    sessions_dir: std::path::PathBuf,
) -> tokio::task::JoinHandle<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<()>();

    let mut watcher = match notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if res.is_ok() {
            let _ = tx.send(());
        }
    }) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(error = %e, "failed to create index watcher");
            return tokio::spawn(async {});
        }
    };

    for dir in [&memory_dir, &sessions_dir] {
        if let Err(e) = watcher.watch(dir, RecursiveMode::Recursive) {
            tracing::warn!(path = %dir.display(), error = %e, "failed to watch directory for indexing");
        }
    }

    tokio::spawn(async move {
        let _watcher = watcher;
        loop {
            if rx.recv().await.is_none() {
                return;
            }
            tokio::select! {
                () = tokio::time::sleep(DEBOUNCE) => {}
                _ = drain_pending(&mut rx) => {}
            }
            match store.full_sweep().await {
                Ok(count) => tracing::debug!(files = count, "re-indexed after filesystem change"),
                Err(e) => tracing::warn!(error = %e, "index sweep failed"),
            }
        }
    })
}

async fn drain_pending(rx: &mut mpsc::UnboundedReceiver<()>) {
    loop {
        match tokio::time::timeout(DEBOUNCE, rx.recv()).await {
            Ok(Some(())) => continue,
            _ => return,
        }
    }
}
