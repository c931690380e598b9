//! Agent manifest: the list of known agent ids, persisted with a `.backup`
//! sibling so one corrupted write can't lose track of every agent.

use std::path::Path;

use codeck_core::atomic::{write_atomic, ActiveWriteGuard};
use codeck_core::dirs::CodeckWorkspace;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SchedulerResult;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    agents: Vec<Uuid>,
}

/// Load the manifest: try the primary file, then the backup, then fall
/// back to reconstructing it from the agents directory.
pub async fn load(workspace: &CodeckWorkspace) -> SchedulerResult<Vec<Uuid>> {
    let primary = workspace.agents_manifest_file();
    let backup = workspace.agents_manifest_backup_file();

    if let Some(ids) = try_read(&primary).await {
        return Ok(ids);
    }
    tracing::warn!("agent manifest primary unreadable, trying backup");
    if let Some(ids) = try_read(&backup).await {
        return Ok(ids);
    }
    tracing::warn!("agent manifest backup also unreadable, reconstructing from agents directory");
    reconstruct(workspace).await
}

async fn try_read(path: &Path) -> Option<Vec<Uuid>> {
    let bytes = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice::<ManifestFile>(&bytes) {
        Ok(m) => Some(m.agents),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "manifest file present but corrupt");
            None
        }
    }
}

/// Rebuild the manifest by scanning `agents/*/config.json`. An entry whose
/// directory name isn't a uuid, or that has no readable config, is skipped
/// with a warning rather than failing the whole reconstruction.
async fn reconstruct(workspace: &CodeckWorkspace) -> SchedulerResult<Vec<Uuid>> {
    let agents_dir = workspace.agents_dir();
    let mut ids = Vec::new();

    let mut entries = match tokio::fs::read_dir(&agents_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }
        let name = entry.file_name();
        let Some(id_str) = name.to_str() else {
            continue;
        };
        let Ok(id) = Uuid::parse_str(id_str) else {
            tracing::warn!(dir = id_str, "skipping non-uuid agent directory during reconstruction");
            continue;
        };
        let config_path = workspace.agent_config_file(id_str);
        if tokio::fs::metadata(&config_path).await.is_ok() {
            ids.push(id);
        } else {
            tracing::warn!(agent = %id, "agent directory has no config.json, skipping");
        }
    }
    Ok(ids)
}

/// Persist the manifest to both the primary file and its `.backup` mirror.
pub async fn save(
    workspace: &CodeckWorkspace,
    guard: &ActiveWriteGuard,
    ids: &[Uuid],
) -> SchedulerResult<()> {
    let manifest = ManifestFile {
        agents: ids.to_vec(),
    };
    let bytes = serde_json::to_vec_pretty(&manifest)?;
    write_atomic(guard, &workspace.agents_manifest_file(), &bytes).await?;
    write_atomic(guard, &workspace.agents_manifest_backup_file(), &bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeck_core::dirs::CodeckWorkspace;

    fn test_workspace(tmp: &tempfile::TempDir) -> CodeckWorkspace {
        let ws = CodeckWorkspace::from_path(tmp.path().join(".codeck"));
        ws.ensure().expect("ensure");
        ws
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = test_workspace(&tmp);
        let guard = ActiveWriteGuard::new();
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];

        save(&ws, &guard, &ids).await.unwrap();
        let loaded = load(&ws).await.unwrap();
        assert_eq!(loaded.len(), 2);
        for id in &ids {
            assert!(loaded.contains(id));
        }
    }

    #[tokio::test]
    async fn corrupt_primary_falls_back_to_backup() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = test_workspace(&tmp);
        let guard = ActiveWriteGuard::new();
        let ids = vec![Uuid::new_v4()];

        save(&ws, &guard, &ids).await.unwrap();
        tokio::fs::write(ws.agents_manifest_file(), b"not json")
            .await
            .unwrap();

        let loaded = load(&ws).await.unwrap();
        assert_eq!(loaded, ids);
    }

    #[tokio::test]
    async fn both_corrupt_reconstructs_from_agent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = test_workspace(&tmp);
        let id = Uuid::new_v4();
        let agent_dir = ws.agent_dir(&id.to_string());
        tokio::fs::create_dir_all(&agent_dir).await.unwrap();
        tokio::fs::write(ws.agent_config_file(&id.to_string()), b"{}")
            .await
            .unwrap();
        tokio::fs::write(ws.agents_manifest_file(), b"garbage")
            .await
            .unwrap();
        tokio::fs::write(ws.agents_manifest_backup_file(), b"garbage")
            .await
            .unwrap();

        let loaded = load(&ws).await.unwrap();
        assert_eq!(loaded, vec![id]);
    }

    #[tokio::test]
    async fn reconstruction_skips_directories_with_no_config() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = test_workspace(&tmp);
        let id = Uuid::new_v4();
        tokio::fs::create_dir_all(ws.agent_dir(&id.to_string()))
            .await
            .unwrap();

        let loaded = load(&ws).await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn missing_manifest_and_empty_agents_dir_yields_empty_list() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = test_workspace(&tmp);
        let loaded = load(&ws).await.unwrap();
        assert!(loaded.is_empty());
    }
}
