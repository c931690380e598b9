//! Debounced watcher that restores the primary credential file from its
//! backup when the primary disappears out from under the daemon (e.g. an
//! upstream CLI sharing the same workspace rewrites the directory).

use std::sync::Arc;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::store::CredStore;

const DEBOUNCE: Duration = Duration::from_millis(500);

/// Spawn a background task that watches the credential directory and calls
/// [`CredStore::restore_from_backup_if_needed`] after a quiet period
/// following any change.
///
/// Returns a handle; dropping it stops the watcher.
pub fn spawn_backup_restore_watcher(store: Arc<CredStore>) -> tokio::task::JoinHandle<()> {
    let dir = store.credentials_dir();
    let (tx, mut rx) = mpsc::unbounded_channel::<()>();

    let mut watcher = match notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if res.is_ok() {
            let _ = tx.send(());
        }
    }) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(error = %e, "failed to create credential directory watcher");
            return tokio::spawn(async {});
        }
    };

    if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
        tracing::warn!(path = %dir.display(), error = %e, "failed to watch credential directory");
        return tokio::spawn(async {});
    }

    tokio::spawn(async move {
        // Keep the watcher alive for the task's lifetime.
        let _watcher = watcher;
        loop {
            if rx.recv().await.is_none() {
                return;
            }
            // Drain any further events that arrive during the debounce
            // window, then settle on the last one.
            tokio::select! {
                () = tokio::time::sleep(DEBOUNCE) => {}
                _ = drain_pending(&mut rx) => {}
            }
            if let Err(e) = store.restore_from_backup_if_needed().await {
                tracing::warn!(error = %e, "backup restore check failed");
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
