//! Shared test scaffolding, available to every crate as a dev-dependency
//! via the `testing` feature.

use std::path::Path;

use crate::dirs::CodeckWorkspace;

/// A temporary, fully-scaffolded `.codeck/` workspace for unit and
/// integration tests. Dropping it removes the directory.
pub struct TempWorkspace {
    dir: tempfile::TempDir,
    workspace: CodeckWorkspace,
}

impl TempWorkspace {
    /// Create a new temporary workspace with the standard directory tree
    /// already in place.
    ///
    /// # Panics
    ///
    /// Panics if the temp directory or its scaffolding cannot be created;
    /// acceptable in test code only.
    #[must_use]
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let workspace = CodeckWorkspace::from_path(dir.path().join(".codeck"));
        workspace.ensure().expect("scaffold .codeck");
        Self { dir, workspace }
    }

    /// The project root (parent of `.codeck/`).
    #[must_use]
    pub fn project_root(&self) -> &Path {
        self.dir.path()
    }

    /// The scaffolded workspace handle.
    #[must_use]
    pub fn workspace(&self) -> &CodeckWorkspace {
        &self.workspace
    }
}

impl Default for TempWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
