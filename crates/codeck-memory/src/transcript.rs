//! Session transcript capture: buffered, ANSI-stripped, secret-redacted
//! JSONL append with a size cap and compaction-event detection.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::MemoryResult;
use crate::sanitize::{sanitize, strip_ansi};

/// Which stream a captured chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Daemon-generated lifecycle line (session start/end, errors).
    System,
    /// Bytes sent to the PTY.
    Input,
    /// Bytes read from the PTY.
    Output,
}

#[derive(Serialize)]
struct TranscriptLine<'a> {
    ts: chrono::DateTime<Utc>,
    role: Role,
    text: &'a str,
}

const MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;
const SIZE_FLUSH_THRESHOLD: usize = 2 * 1024;
const OUTPUT_FLUSH_INTERVAL: Duration = Duration::from_millis(500);
const INPUT_FLUSH_INTERVAL: Duration = Duration::from_secs(2);

const COMPACTION_MARKERS: &[&str] = &[
    "context window",
    "conversation compacted",
    "compacting context",
];

enum Event {
    Chunk { role: Role, text: String },
    Flush,
}

/// Callback invoked when captured output matches a context-compaction
/// marker.
pub type CompactionCallback = Arc<dyn Fn() + Send + Sync>;

/// Appends captured session output to a JSONL transcript file.
pub struct TranscriptWriter {
    tx: mpsc::Sender<Event>,
    bytes_written: Arc<std::sync::atomic::AtomicU64>,
}

impl TranscriptWriter {
    /// Open (creating if needed) the transcript file at `path` and start
    /// its background flush task.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub async fn open(
        path: PathBuf,
        on_compaction: Option<CompactionCallback>,
    ) -> MemoryResult<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let existing_len = file.metadata().await?.len();

        // Backpressure: a bounded channel means a producer that outruns
        // the writer awaits on `send`, pausing capture until drain.
        let (tx, rx) = mpsc::channel(256);
        let bytes_written = Arc::new(std::sync::atomic::AtomicU64::new(existing_len));

        tokio::spawn(run_writer(file, rx, bytes_written.clone(), on_compaction));

        Ok(Self { tx, bytes_written })
    }

    /// Capture a chunk of `role` output. ANSI is stripped and secrets
    /// redacted before it reaches disk; flush timing/size rules are
    /// applied by the background task.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer task has exited (e.g. a prior fatal
    /// I/O error).
    pub async fn capture(&self, role: Role, text: &str) -> MemoryResult<()> {
        let cleaned = strip_ansi(text);
        self.tx
            .send(Event::Chunk {
                role,
                text: cleaned,
            })
            .await
            .map_err(|_| std::io::Error::other("transcript writer task has stopped"))?;
        Ok(())
    }

    /// Force an immediate flush (used at session end before
    /// summarisation).
    ///
    /// # Errors
    ///
    /// Returns an error if the writer task has exited.
    pub async fn flush(&self) -> MemoryResult<()> {
        self.tx
            .send(Event::Flush)
            .await
            .map_err(|_| std::io::Error::other("transcript writer task has stopped"))?;
        Ok(())
    }

    /// Current on-disk size, for size-cap bookkeeping by callers.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(std::sync::atomic::Ordering::Relaxed)
    }
}

async fn run_writer(
    mut file: tokio::fs::File,
    mut rx: mpsc::Receiver<Event>,
    bytes_written: Arc<std::sync::atomic::AtomicU64>,
    on_compaction: Option<CompactionCallback>,
) {
    let mut pending = String::new();
    let mut pending_role: Option<Role> = None;
    let mut last_flush = Instant::now();
    let mut capped = bytes_written.load(std::sync::atomic::Ordering::Relaxed) >= MAX_FILE_BYTES;

    loop {
        let timeout = tokio::time::sleep(Duration::from_millis(250));
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(Event::Chunk { role, text }) => {
                        if capped {
                            continue;
                        }
                        if let Some(cb) = &on_compaction {
                            if COMPACTION_MARKERS.iter().any(|m| text.to_lowercase().contains(m)) {
                                cb();
                            }
                        }
                        if pending_role != Some(role) && !pending.is_empty() {
                            flush_pending(&mut file, &mut pending, pending_role, &bytes_written, &mut capped).await;
                        }
                        pending_role = Some(role);
                        pending.push_str(&text);
                        let interval = match role {
                            Role::Output => OUTPUT_FLUSH_INTERVAL,
                            Role::Input | Role::System => INPUT_FLUSH_INTERVAL,
                        };
                        if pending.len() >= SIZE_FLUSH_THRESHOLD
                            || pending.contains('\n')
                            || last_flush.elapsed() >= interval
                        {
                            flush_pending(&mut file, &mut pending, pending_role, &bytes_written, &mut capped).await;
                            last_flush = Instant::now();
                        }
                    }
                    Some(Event::Flush) => {
                        flush_pending(&mut file, &mut pending, pending_role, &bytes_written, &mut capped).await;
                        last_flush = Instant::now();
                    }
                    None => {
                        flush_pending(&mut file, &mut pending, pending_role, &bytes_written, &mut capped).await;
                        return;
                    }
                }
            }
            () = timeout => {
                if !pending.is_empty() && last_flush.elapsed() >= OUTPUT_FLUSH_INTERVAL {
                    flush_pending(&mut file, &mut pending, pending_role, &bytes_written, &mut capped).await;
                    last_flush = Instant::now();
                }
            }
        }
    }
}

async fn flush_pending(
    file: &mut tokio::fs::File,
    pending: &mut String,
    role: Option<Role>,
    bytes_written: &Arc<std::sync::atomic::AtomicU64>,
    capped: &mut bool,
) {
    if pending.is_empty() || *capped {
        return;
    }
    let Some(role) = role else {
        return;
    };
    let redacted = sanitize(pending);
    let line = TranscriptLine {
        ts: Utc::now(),
        role,
        text: &redacted,
    };
    if let Ok(mut json) = serde_json::to_vec(&line) {
        json.push(b'\n');
        if file.write_all(&json).await.is_ok() {
            let new_len = bytes_written.fetch_add(json.len() as u64, std::sync::atomic::Ordering::Relaxed)
                + json.len() as u64;
            if new_len >= MAX_FILE_BYTES && !*capped {
                *capped = true;
                let marker = b"{\"ts\":null,\"role\":\"system\",\"text\":\"[size-limit reached, further capture suppressed]\"}\n";
                let _ = file.write_all(marker).await;
            }
        }
    }
    pending.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn capture_and_flush_writes_jsonl_line() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("s.jsonl");
        let writer = TranscriptWriter::open(path.clone(), None).await.expect("open");
        writer.capture(Role::Output, "hello\n").await.expect("capture");
        writer.flush().await.expect("flush");
        tokio::time::sleep(Duration::from_millis(50)).await;

        let contents = tokio::fs::read_to_string(&path).await.expect("read");
        assert!(contents.contains("hello"));
        assert!(contents.contains("\"role\":\"output\""));
    }

    #[tokio::test]
    async fn ansi_is_stripped_before_persistence() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("s.jsonl");
        let writer = TranscriptWriter::open(path.clone(), None).await.expect("open");
        writer.capture(Role::Output, "\x1b[31mred\x1b[0m\n").await.expect("capture");
        writer.flush().await.expect("flush");
        tokio::time::sleep(Duration::from_millis(50)).await;

        let contents = tokio::fs::read_to_string(&path).await.expect("read");
        assert!(!contents.contains("\x1b["));
        assert!(contents.contains("red"));
    }

    #[tokio::test]
    async fn secrets_are_redacted_before_persistence() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("s.jsonl");
        let writer = TranscriptWriter::open(path.clone(), None).await.expect("open");
        writer
            .capture(Role::Output, "api_key=sk_live_abcdefghijklmnop\n")
            .await
            .expect("capture");
        writer.flush().await.expect("flush");
        tokio::time::sleep(Duration::from_millis(50)).await;

        let contents = tokio::fs::read_to_string(&path).await.expect("read");
        assert!(!contents.contains("sk_live_abcdefghijklmnop"));
    }

    #[tokio::test]
    async fn compaction_marker_triggers_callback() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("s.jsonl");
        let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let fired_clone = fired.clone();
        let cb: CompactionCallback = Arc::new(move || {
            fired_clone.store(true, std::sync::atomic::Ordering::SeqCst);
        });
        let writer = TranscriptWriter::open(path, Some(cb)).await.expect("open");
        writer
            .capture(Role::Output, "conversation compacted to save space\n")
            .await
            .expect("capture");
        writer.flush().await.expect("flush");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(fired.load(std::sync::atomic::Ordering::SeqCst));
    }
}
