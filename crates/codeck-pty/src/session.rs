//! A single PTY-backed child process: reader/writer/wait plumbing modeled
//! on a classic native-pty session manager, extended with multi-client
//! fan-out, buffered pre-attach output, and a graceful destroy sequence.

use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use tokio::sync::{broadcast, mpsc, watch};
use uuid::Uuid;

use crate::error::{PtyError, PtyResult};
use crate::ring::RingBuffer;
use crate::types::{Geometry, SessionKind};

/// Grace period between a graceful terminate signal and a forced kill.
const DESTROY_GRACE: Duration = Duration::from_secs(2);
/// Capacity of the broadcast channel fanning output out to attached clients.
const OUTPUT_CHANNEL_CAPACITY: usize = 1024;
/// Capacity of the channel carrying input writes to the pty.
const INPUT_CHANNEL_CAPACITY: usize = 128;

/// A single interactive or headless PTY-backed session.
pub struct PtySession {
    /// Session identifier.
    pub id: Uuid,
    /// Whether this runs the agent binary or an interactive shell.
    pub kind: SessionKind,
    /// Working directory the child was spawned in.
    pub cwd: PathBuf,
    /// Human-facing label, renamable.
    pub display_name: StdMutex<String>,
    /// When this session was created.
    pub created_at: DateTime<Utc>,
    /// Conversation id, once discovered by the poller in `discovery.rs`.
    pub conversation_id: StdMutex<Option<String>>,

    master: StdMutex<Box<dyn MasterPty + Send>>,
    killer: StdMutex<Box<dyn ChildKiller + Send + Sync>>,
    pid: Option<u32>,
    writer_tx: mpsc::Sender<Vec<u8>>,
    output_tx: broadcast::Sender<Vec<u8>>,
    ring: StdMutex<RingBuffer>,
    attached_count: AtomicUsize,
    client_geometry: StdMutex<HashMap<Uuid, Geometry>>,
    exit_rx: watch::Receiver<Option<i32>>,
    _reader_handle: tokio::task::JoinHandle<()>,
    _writer_handle: tokio::task::JoinHandle<()>,
    _wait_handle: tokio::task::JoinHandle<()>,
}

impl PtySession {
    /// Spawn `program` with `args` under a PTY rooted at `cwd`, with
    /// `env` as its complete environment.
    pub fn spawn(
        id: Uuid,
        kind: SessionKind,
        cwd: PathBuf,
        display_name: String,
        program: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> PtyResult<Arc<Self>> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: Geometry::INITIAL.rows,
                cols: Geometry::INITIAL.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Spawn(anyhow::anyhow!("{e}")))?;

        let mut cmd = CommandBuilder::new(program);
        for arg in args {
            cmd.arg(arg);
        }
        cmd.cwd(&cwd);
        for (k, v) in env {
            cmd.env(k, v);
        }

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn(anyhow::anyhow!("{e}")))?;
        let pid = child.process_id();
        let killer = child.clone_killer();
        drop(pair.slave);

        let (writer_tx, mut writer_rx) = mpsc::channel::<Vec<u8>>(INPUT_CHANNEL_CAPACITY);
        let (output_tx, _) = broadcast::channel::<Vec<u8>>(OUTPUT_CHANNEL_CAPACITY);
        let (exit_tx, exit_rx) = watch::channel(None);

        let ring = StdMutex::new(RingBuffer::new());
        let attached_count = AtomicUsize::new(0);

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Spawn(anyhow::anyhow!("{e}")))?;
        let output_tx_clone = output_tx.clone();
        let session_id_for_log = id;
        let reader_handle = tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; 8192];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        let _ = output_tx_clone.send(buf[..n].to_vec());
                    }
                    Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                        std::thread::sleep(Duration::from_millis(5));
                        continue;
                    }
                    Err(e) => {
                        tracing::debug!(session = %session_id_for_log, error = %e, "pty reader stopped");
                        break;
                    }
                }
            }
        });

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Spawn(anyhow::anyhow!("{e}")))?;
        let writer = Arc::new(StdMutex::new(writer));
        let writer_handle = tokio::spawn({
            let writer = writer.clone();
            async move {
                while let Some(bytes) = writer_rx.recv().await {
                    let writer = writer.clone();
                    let _ = tokio::task::spawn_blocking(move || {
                        if let Ok(mut guard) = writer.lock() {
                            let _ = guard.write_all(&bytes);
                            let _ = guard.flush();
                        }
                    })
                    .await;
                }
            }
        });

        let wait_handle = tokio::task::spawn_blocking(move || {
            let code = match child.wait() {
                Ok(status) => status.exit_code() as i32,
                Err(_) => -1,
            };
            let _ = exit_tx.send(Some(code));
        });

        let session = Arc::new(Self {
            id,
            kind,
            cwd,
            display_name: StdMutex::new(display_name),
            created_at: Utc::now(),
            conversation_id: StdMutex::new(None),
            master: StdMutex::new(pair.master),
            killer: StdMutex::new(killer),
            pid,
            writer_tx,
            output_tx,
            ring,
            attached_count,
            client_geometry: StdMutex::new(HashMap::new()),
            exit_rx,
            _reader_handle: reader_handle,
            _writer_handle: writer_handle,
            _wait_handle: wait_handle,
        });

        // Single fan-out listener for this PTY: while no client is attached
        // it parks each chunk in the ring; once a client attaches, chunks
        // reach it through its own broadcast subscription instead and this
        // task's `buffer_if_unattached` becomes a no-op.
        let weak = Arc::downgrade(&session);
        let mut ring_rx = session.output_tx.subscribe();
        tokio::spawn(async move {
            loop {
                match ring_rx.recv().await {
                    Ok(chunk) => {
                        let Some(session) = weak.upgrade() else { return };
                        session.buffer_if_unattached(&chunk);
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        Ok(session)
    }

    /// Attach a new client with the given geometry. Returns the buffered
    /// pre-attach output (now cleared from the ring) and a receiver for
    /// subsequent live output.
    pub fn attach(&self, client_id: Uuid, geometry: Geometry) -> (Vec<u8>, broadcast::Receiver<Vec<u8>>) {
        self.attached_count.fetch_add(1, Ordering::SeqCst);
        self.client_geometry.lock().expect("poisoned").insert(client_id, geometry);
        self.recompute_geometry();
        let buffered = self.ring.lock().expect("poisoned").take();
        (buffered, self.output_tx.subscribe())
    }

    /// Detach a previously attached client, re-enabling ring buffering if
    /// it was the last one.
    pub fn detach(&self, client_id: Uuid) {
        self.client_geometry.lock().expect("poisoned").remove(&client_id);
        self.attached_count.fetch_sub(1, Ordering::SeqCst);
        self.recompute_geometry();
    }

    /// Update a client's geometry and recompute the session's effective
    /// size as the maximum across all attached clients.
    pub fn resize_client(&self, client_id: Uuid, geometry: Geometry) {
        self.client_geometry.lock().expect("poisoned").insert(client_id, geometry);
        self.recompute_geometry();
    }

    fn recompute_geometry(&self) {
        let geoms = self.client_geometry.lock().expect("poisoned");
        let Some(cols) = geoms.values().map(|g| g.cols).max() else {
            return;
        };
        let rows = geoms.values().map(|g| g.rows).max().unwrap_or(Geometry::INITIAL.rows);
        drop(geoms);
        let _ = self.master.lock().expect("poisoned").resize(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        });
    }

    /// Whether this chunk should be buffered right now (no attached
    /// clients) — exposed so a caller driving output fan-out from outside
    /// this module (transcript capture, the gateway) can share the same
    /// policy as the internal reader.
    #[must_use]
    pub fn has_attached_clients(&self) -> bool {
        self.attached_count.load(Ordering::SeqCst) > 0
    }

    /// Feed a chunk of child output into the ring if nobody is attached.
    /// Called by the owning manager's fan-out task, not by `spawn`
    /// directly, so the manager can also route output through transcript
    /// capture before or after this call.
    pub fn buffer_if_unattached(&self, chunk: &[u8]) {
        if !self.has_attached_clients() {
            self.ring.lock().expect("poisoned").push(chunk);
        }
    }

    /// Subscribe to the raw output broadcast (used by the manager's
    /// single fan-out task, and by transcript capture).
    #[must_use]
    pub fn subscribe_output(&self) -> broadcast::Receiver<Vec<u8>> {
        self.output_tx.subscribe()
    }

    /// Write bytes to the child's stdin.
    pub async fn write_input(&self, bytes: Vec<u8>) -> PtyResult<()> {
        self.writer_tx
            .send(bytes)
            .await
            .map_err(|_| PtyError::Spawn(anyhow::anyhow!("pty writer task has exited")))
    }

    /// `true` once the child has exited.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        *self.exit_rx.borrow()
    }

    /// Watch for the child's exit code (used by WS clients to emit
    /// `console:exit` once the session ends).
    #[must_use]
    pub fn subscribe_exit(&self) -> tokio::sync::watch::Receiver<Option<i32>> {
        self.exit_rx.clone()
    }

    /// Rename the session's display label.
    pub fn rename(&self, name: String) {
        *self.display_name.lock().expect("poisoned") = name;
    }

    /// Record a discovered conversation id.
    pub fn set_conversation_id(&self, id: String) {
        *self.conversation_id.lock().expect("poisoned") = Some(id);
    }

    /// Signal the child to exit: SIGTERM, wait up to [`DESTROY_GRACE`],
    /// then force-kill if it hasn't exited.
    pub async fn destroy(&self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid as i32),
                nix::sys::signal::Signal::SIGTERM,
            );
        }

        let mut exit_rx = self.exit_rx.clone();
        let graceful = tokio::time::timeout(DESTROY_GRACE, async {
            loop {
                if exit_rx.borrow().is_some() {
                    return;
                }
                if exit_rx.changed().await.is_err() {
                    return;
                }
            }
        })
        .await;

        if graceful.is_err() {
            let _ = self.killer.lock().expect("poisoned").kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_shell(id: Uuid) -> Arc<PtySession> {
        PtySession::spawn(
            id,
            SessionKind::Shell,
            std::env::temp_dir(),
            "test".into(),
            "/bin/sh",
            &["-c".into(), "sleep 5".into()],
            &HashMap::new(),
        )
        .expect("spawn")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn attach_returns_empty_buffer_when_nothing_buffered() {
        let session = spawn_shell(Uuid::new_v4());
        let (buffered, _rx) = session.attach(Uuid::new_v4(), Geometry::INITIAL);
        assert!(buffered.is_empty());
        session.destroy().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn detach_reenables_buffering() {
        let session = spawn_shell(Uuid::new_v4());
        let client = Uuid::new_v4();
        let (_buf, _rx) = session.attach(client, Geometry::INITIAL);
        assert!(session.has_attached_clients());
        session.detach(client);
        assert!(!session.has_attached_clients());
        session.destroy().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn destroy_completes_without_hanging() {
        let session = spawn_shell(Uuid::new_v4());
        session.destroy().await;
    }
}
