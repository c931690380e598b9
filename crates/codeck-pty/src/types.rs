//! Shared value types: session kind, resume policy, and the on-disk
//! snapshot shape.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum simultaneous PTY sessions.
pub const MAX_SESSIONS: usize = 5;

/// Minimum and maximum allowed terminal geometry.
pub const MIN_COLS: u16 = 1;
/// See [`MIN_COLS`].
pub const MAX_COLS: u16 = 500;
/// See [`MIN_COLS`].
pub const MIN_ROWS: u16 = 1;
/// See [`MIN_COLS`].
pub const MAX_ROWS: u16 = 200;

/// What kind of process runs under the PTY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// The agent binary.
    Agent,
    /// An interactive shell.
    Shell,
}

/// How a new agent session should pick up prior conversation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumePolicy {
    /// Start with no prior context.
    Fresh,
    /// Attach the most recent transcript for this cwd.
    Continue,
    /// Resume a specific, caller-supplied conversation id.
    ResumeById(String),
    /// Resume interactively: like `Continue`, but the agent itself is
    /// expected to offer a picker rather than silently attaching.
    ResumeInteractive,
}

/// Terminal geometry, validated against [`MIN_COLS`]..[`MAX_COLS`] and
/// [`MIN_ROWS`]..[`MAX_ROWS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Columns.
    pub cols: u16,
    /// Rows.
    pub rows: u16,
}

impl Geometry {
    /// The fixed initial geometry used when spawning a session.
    pub const INITIAL: Geometry = Geometry { cols: 80, rows: 24 };

    /// Validate `cols`/`rows` fall within the allowed bounds.
    pub fn validate(cols: u16, rows: u16) -> crate::error::PtyResult<Self> {
        if !(MIN_COLS..=MAX_COLS).contains(&cols) || !(MIN_ROWS..=MAX_ROWS).contains(&rows) {
            return Err(crate::error::PtyError::InvalidDimensions { cols, rows });
        }
        Ok(Self { cols, rows })
    }
}

/// A live session's operator-facing summary, for listing and the
/// console-create response.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    /// Session id.
    pub id: Uuid,
    /// Session kind.
    pub kind: SessionKind,
    /// Working directory the session runs in.
    pub cwd: PathBuf,
    /// Human-facing label.
    pub display_name: String,
}

/// One persisted session entry within a [`PtySnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Session id.
    pub id: Uuid,
    /// Session kind.
    pub kind: SessionKind,
    /// Working directory the session runs in.
    pub cwd: PathBuf,
    /// Human-facing label.
    pub display_name: String,
    /// Why this entry was written (create, destroy, rename, discovery).
    pub reason: String,
    /// Discovered conversation id, once known.
    pub conversation_id: Option<String>,
}

/// The persisted `state/sessions.json` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtySnapshot {
    /// Schema version.
    pub version: u32,
    /// When this snapshot was written.
    pub saved_at: DateTime<Utc>,
    /// Live session entries at the time of writing.
    pub entries: Vec<SnapshotEntry>,
}

impl PtySnapshot {
    /// Build a snapshot from `entries` stamped with the current time.
    #[must_use]
    pub fn new(entries: Vec<SnapshotEntry>) -> Self {
        Self { version: 1, saved_at: Utc::now(), entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_rejects_out_of_range_values() {
        assert!(Geometry::validate(0, 24).is_err());
        assert!(Geometry::validate(80, 0).is_err());
        assert!(Geometry::validate(501, 24).is_err());
        assert!(Geometry::validate(80, 201).is_err());
        assert!(Geometry::validate(80, 24).is_ok());
    }
}
