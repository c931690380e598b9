//! Database schema setup: pragmas, the `files`/`chunks` tables, the FTS5
//! virtual table, sync triggers, and an optional vector table.

use rusqlite::Connection;

use crate::error::IndexResult;

/// Open (creating if absent) and fully initialize the index database at
/// `path`.
pub fn open_and_init(path: &std::path::Path) -> IndexResult<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> IndexResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            path TEXT PRIMARY KEY,
            content_hash TEXT NOT NULL,
            indexed_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chunks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_path TEXT NOT NULL REFERENCES files(path) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            heading TEXT,
            date TEXT,
            roles TEXT,
            first_ts TEXT,
            last_ts TEXT,
            body TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_file_path ON chunks(file_path);

        CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
            body,
            content = 'chunks',
            content_rowid = 'id',
            tokenize = 'porter unicode61'
        );

        CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
            INSERT INTO chunks_fts(rowid, body) VALUES (new.id, new.body);
        END;

        CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
            INSERT INTO chunks_fts(chunks_fts, rowid, body) VALUES ('delete', old.id, old.body);
        END;

        CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON chunks BEGIN
            INSERT INTO chunks_fts(chunks_fts, rowid, body) VALUES ('delete', old.id, old.body);
            INSERT INTO chunks_fts(rowid, body) VALUES (new.id, new.body);
        END;
        "#,
    )?;

    // Vector similarity is optional: sqlite-vec is not guaranteed to be
    // loadable in every deployment, so attempt creation and degrade to
    // FTS-only silently if the module isn't available.
    let vector_result = conn.execute_batch(
        r#"
        CREATE VIRTUAL TABLE IF NOT EXISTS chunks_vec USING vec0(
            chunk_id INTEGER PRIMARY KEY,
            embedding FLOAT[384]
        );
        "#,
    );
    if let Err(err) = vector_result {
        tracing::warn!(error = %err, "vector index unavailable, falling back to full-text search only");
    }

    Ok(())
}

/// True if the `chunks_vec` virtual table exists in this connection.
pub fn has_vector_support(conn: &Connection) -> bool {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'chunks_vec'",
        [],
        |_| Ok(()),
    )
    .is_ok()
}
