//! The `IndexStore`: indexes the `memory/` and `sessions/` trees into the
//! sqlite database and serves BM25-ranked queries over the result.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use codeck_core::dirs::CodeckWorkspace;
use codeck_core::ids::content_hash;
use rusqlite::Connection;
use walkdir::WalkDir;

use crate::chunk::{chunk_jsonl, chunk_markdown, Chunk};
use crate::error::{IndexError, IndexResult};
use crate::schema;

/// A single search hit.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    /// `"markdown"` or `"jsonl"`.
    pub kind: String,
    /// Source file path, relative to `.codeck/`.
    pub path: String,
    /// Nearest heading, for markdown hits.
    pub heading: Option<String>,
    /// A short excerpt around the match.
    pub snippet: String,
    /// BM25 rank (lower is better; sqlite convention).
    pub score: f64,
}

/// Owns the sqlite connection and exposes indexing/query operations.
///
/// `rusqlite::Connection` is synchronous; every method here dispatches the
/// actual work onto `spawn_blocking` so callers never block an async
/// executor thread on file I/O.
pub struct IndexStore {
    conn: std::sync::Arc<Mutex<Connection>>,
    memory_root: PathBuf,
    sessions_root: PathBuf,
}

impl IndexStore {
    /// Open (or create) the index database for `workspace`.
    pub async fn open(workspace: &CodeckWorkspace) -> IndexResult<Self> {
        let db_path = workspace.index_db_file();
        let memory_root = workspace.memory_dir();
        let sessions_root = workspace.sessions_dir();
        let conn = tokio::task::spawn_blocking(move || schema::open_and_init(&db_path)).await??;
        Ok(Self {
            conn: std::sync::Arc::new(Mutex::new(conn)),
            memory_root,
            sessions_root,
        })
    }

    /// Re-index `path` (relative to the workspace root) if its content has
    /// changed since the last pass, replacing its chunks transactionally.
    pub async fn index_file(&self, path: PathBuf, relative: String) -> IndexResult<()> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || index_file_sync(&conn, &path, &relative)).await?
    }

    /// Remove a file and its chunks from the index.
    pub async fn remove_file(&self, relative: String) -> IndexResult<()> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> IndexResult<()> {
            let conn = conn.lock().expect("index connection poisoned");
            conn.execute("DELETE FROM files WHERE path = ?1", [relative])?;
            Ok(())
        })
        .await?
    }

    /// Walk `memory/` and `sessions/` fully, indexing changed files and
    /// removing index entries for files that no longer exist on disk.
    pub async fn full_sweep(&self) -> IndexResult<usize> {
        let mut discovered = Vec::new();
        for root in [&self.memory_root, &self.sessions_root] {
            if !root.is_dir() {
                continue;
            }
            for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let ext_ok = matches!(
                    entry.path().extension().and_then(|e| e.to_str()),
                    Some("md") | Some("jsonl")
                );
                if !ext_ok {
                    continue;
                }
                if let Ok(relative) = entry.path().strip_prefix(root.parent().unwrap_or(root)) {
                    discovered.push((entry.path().to_path_buf(), relative.to_string_lossy().to_string()));
                }
            }
        }

        let mut indexed = 0;
        for (path, relative) in &discovered {
            self.index_file(path.clone(), relative.clone()).await?;
            indexed += 1;
        }

        let live: std::collections::HashSet<String> =
            discovered.into_iter().map(|(_, r)| r).collect();
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || prune_vanished(&conn, live)).await??;

        Ok(indexed)
    }

    /// Run a BM25-ranked full-text search over all indexed chunks.
    pub async fn query(&self, text: String, limit: usize) -> IndexResult<Vec<SearchHit>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || query_sync(&conn, &text, limit)).await?
    }

    /// Compact the FTS index (`INSERT INTO chunks_fts(chunks_fts) VALUES ('optimize')`).
    pub async fn optimize(&self) -> IndexResult<()> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> IndexResult<()> {
            let conn = conn.lock().expect("index connection poisoned");
            conn.execute("INSERT INTO chunks_fts(chunks_fts) VALUES ('optimize')", [])?;
            Ok(())
        })
        .await?
    }
}

fn index_file_sync(conn: &Mutex<Connection>, path: &Path, relative: &str) -> IndexResult<()> {
    let bytes = std::fs::read(path)?;
    let hash = content_hash(&bytes);
    let mut conn = conn.lock().expect("index connection poisoned");

    let existing_hash: Option<String> = conn
        .query_row(
            "SELECT content_hash FROM files WHERE path = ?1",
            [relative],
            |row| row.get(0),
        )
        .ok();
    if existing_hash.as_deref() == Some(hash.as_str()) {
        return Ok(());
    }

    let content = String::from_utf8_lossy(&bytes);
    let chunks: Vec<Chunk> = if relative.ends_with(".jsonl") {
        chunk_jsonl(&content, relative)
    } else {
        chunk_markdown(&content, relative)
    };

    let tx = conn.transaction()?;
    tx.execute("DELETE FROM chunks WHERE file_path = ?1", [relative])?;
    tx.execute(
        "INSERT INTO files (path, content_hash, indexed_at) VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(path) DO UPDATE SET content_hash = excluded.content_hash, indexed_at = excluded.indexed_at",
        rusqlite::params![relative, hash],
    )?;
    for chunk in &chunks {
        tx.execute(
            "INSERT INTO chunks (file_path, kind, heading, date, roles, first_ts, last_ts, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                relative,
                chunk.metadata.kind,
                chunk.metadata.heading,
                chunk.metadata.date,
                serde_json::to_string(&chunk.metadata.roles)?,
                chunk.metadata.first_ts,
                chunk.metadata.last_ts,
                chunk.text,
            ],
        )?;
    }
    tx.commit()?;
    Ok(())
}

fn prune_vanished(conn: &Mutex<Connection>, live: std::collections::HashSet<String>) -> IndexResult<()> {
    let conn = conn.lock().expect("index connection poisoned");
    let mut stmt = conn.prepare("SELECT path FROM files")?;
    let known: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .filter_map(Result::ok)
        .collect();
    for path in known {
        if !live.contains(&path) {
            conn.execute("DELETE FROM files WHERE path = ?1", [path])?;
        }
    }
    Ok(())
}

fn query_sync(conn: &Mutex<Connection>, text: &str, limit: usize) -> IndexResult<Vec<SearchHit>> {
    let conn = conn.lock().expect("index connection poisoned");
    let mut stmt = conn.prepare(
        "SELECT c.kind, c.file_path, c.heading, snippet(chunks_fts, 0, '[', ']', '...', 10), bm25(chunks_fts)
         FROM chunks_fts
         JOIN chunks c ON c.id = chunks_fts.rowid
         WHERE chunks_fts MATCH ?1
         ORDER BY bm25(chunks_fts)
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![text, limit as i64], |row| {
            Ok(SearchHit {
                kind: row.get(0)?,
                path: row.get(1)?,
                heading: row.get(2)?,
                snippet: row.get(3)?,
                score: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .map_err(IndexError::from)?;
    Ok(rows)
}
