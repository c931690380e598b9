//! Pluggable embedding backend and a bounded queue that drains it without
//! blocking the indexer's main write path.
//!
//! No concrete embedding model is named by the workstation's requirements,
//! so indexing proceeds on full-text search alone by default; an
//! `EmbeddingProvider` can be wired in later without touching the index
//! store's write path.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

/// Produces a fixed-size embedding vector for a chunk of text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text`, returning `None` if the provider is temporarily
    /// unavailable (the caller logs and skips rather than failing the
    /// whole batch).
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;
}

/// Work item: embed `text` and store the result against `chunk_id`.
pub struct EmbedJob {
    /// Row id in the `chunks` table.
    pub chunk_id: i64,
    /// Text to embed.
    pub text: String,
}

/// Drains queued embedding jobs in batches, tolerating provider failures.
pub struct EmbedQueue {
    tx: mpsc::Sender<EmbedJob>,
}

const QUEUE_CAPACITY: usize = 1024;
const BATCH_SIZE: usize = 50;
const BATCH_PAUSE: std::time::Duration = std::time::Duration::from_millis(100);

impl EmbedQueue {
    /// Spawn a background task draining jobs through `provider`, calling
    /// `on_embedded(chunk_id, vector)` for each success.
    pub fn spawn<F>(provider: Arc<dyn EmbeddingProvider>, on_embedded: F) -> Self
    where
        F: Fn(i64, Vec<f32>) + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));
        tokio::spawn(async move {
            run(rx, provider, on_embedded).await;
        });
        Self { tx }
    }

    /// Enqueue a job. Silently drops (logging) if the queue is full; a
    /// missed embedding just means that chunk stays full-text-only until
    /// the next index pass revisits it.
    pub async fn enqueue(&self, job: EmbedJob) {
        if self.tx.send(job).await.is_err() {
            tracing::warn!("embedding queue closed, dropping job");
        }
    }
}

async fn run<F>(
    rx: Arc<Mutex<mpsc::Receiver<EmbedJob>>>,
    provider: Arc<dyn EmbeddingProvider>,
    on_embedded: F,
) where
    F: Fn(i64, Vec<f32>) + Send + Sync + 'static,
{
    loop {
        let mut batch = Vec::with_capacity(BATCH_SIZE);
        {
            let mut rx = rx.lock().await;
            let Some(first) = rx.recv().await else {
                return;
            };
            batch.push(first);
            while batch.len() < BATCH_SIZE {
                match rx.try_recv() {
                    Ok(job) => batch.push(job),
                    Err(_) => break,
                }
            }
        }

        for job in batch {
            match provider.embed(&job.text).await {
                Some(vector) => on_embedded(job.chunk_id, vector),
                None => {
                    tracing::warn!(chunk_id = job.chunk_id, "embedding provider unavailable, skipping");
                }
            }
        }
        tokio::time::sleep(BATCH_PAUSE).await;
    }
}
