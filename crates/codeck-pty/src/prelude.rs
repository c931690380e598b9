//! Convenience re-exports for consumers of this crate.

pub use crate::error::{PtyError, PtyResult};
pub use crate::manager::PtyManager;
pub use crate::session::PtySession;
pub use crate::snapshot::SnapshotStore;
pub use crate::types::{
    Geometry, PtySnapshot, ResumePolicy, SessionInfo, SessionKind, SnapshotEntry, MAX_SESSIONS,
};
