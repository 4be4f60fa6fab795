use crate::env;
use crate::workflow::state::stable_state;
use crate::workflow::types::{RunId, WorkflowRun};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Run snapshots as pretty JSON under `<workspace>/.slidesmith/runs/`.
///
/// Snapshots are opaque resumability aids, not an interchange format.
#[derive(Debug, Clone)]
pub struct RunStore {
    workspace_root: PathBuf,
}

impl RunStore {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
        }
    }

    pub fn runs_dir(&self) -> PathBuf {
        env::runs_dir(&self.workspace_root)
    }

    pub fn snapshot_path(&self, id: RunId) -> PathBuf {
        env::run_snapshot_path(&self.workspace_root, &id.to_string())
    }

    /// Write through a temp file and rename so a crash never leaves a torn snapshot.
    pub async fn save(&self, run: &WorkflowRun) -> Result<PathBuf> {
        let runs_dir = self.runs_dir();
        async_fs::create_dir_all(&runs_dir)
            .await
            .with_context(|| format!("Failed to create runs directory {}", runs_dir.display()))?;

        let serialized =
            serde_json::to_vec_pretty(run).context("Failed to serialize workflow run")?;

        let final_path = self.snapshot_path(run.id);
        let temp_path = final_path.with_extension("json.tmp");

        let mut file = async_fs::File::create(&temp_path)
            .await
            .context("Failed to create snapshot file")?;
        file.write_all(&serialized)
            .await
            .context("Failed to write snapshot data")?;
        file.sync_all()
            .await
            .context("Failed to sync snapshot file")?;
        drop(file);

        async_fs::rename(&temp_path, &final_path)
            .await
            .context("Failed to move snapshot into place")?;

        debug!(run_id = %run.id, state = %run.state, bytes = serialized.len(), "Saved run snapshot");
        Ok(final_path)
    }

    /// Load a snapshot. A run captured mid-stage comes back in its last stable state.
    pub async fn load(&self, id: RunId) -> Result<WorkflowRun> {
        let path = self.snapshot_path(id);
        if !path.exists() {
            return Err(anyhow::anyhow!("Run snapshot not found: {}", path.display()));
        }
        Self::load_path(&path).await
    }

    pub async fn load_path(path: &Path) -> Result<WorkflowRun> {
        let content = async_fs::read(path)
            .await
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let mut run: WorkflowRun =
            serde_json::from_slice(&content).context("Failed to deserialize workflow run")?;

        if run.state.is_in_flight() {
            let restored = stable_state(run.state);
            info!(
                run_id = %run.id,
                "Snapshot was taken during {}, restoring as {}",
                run.state,
                restored
            );
            run.state = restored;
        }
        Ok(run)
    }

    /// All snapshot ids, sorted. Unreadable entries are skipped.
    pub async fn list(&self) -> Result<Vec<RunId>> {
        let runs_dir = self.runs_dir();
        let mut ids = Vec::new();
        if !runs_dir.exists() {
            return Ok(ids);
        }

        let mut entries = async_fs::read_dir(&runs_dir)
            .await
            .context("Failed to read runs directory")?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(file_name) = path.file_name()
                && let Some(name_str) = file_name.to_str()
                && let Some(stem) = name_str.strip_suffix(".json")
            {
                match stem.parse::<RunId>() {
                    Ok(id) => ids.push(id),
                    Err(_) => warn!("Ignoring unexpected file in runs directory: {}", name_str),
                }
            }
        }

        ids.sort();
        Ok(ids)
    }

    pub async fn remove(&self, id: RunId) -> Result<bool> {
        let path = self.snapshot_path(id);
        if !path.exists() {
            return Ok(false);
        }
        async_fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to remove snapshot {}", path.display()))?;
        Ok(true)
    }
}
