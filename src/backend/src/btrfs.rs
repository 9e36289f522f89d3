//! btrfs backend: snapshots are subvolumes in a directory below the volume.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use policy::Observation;

use crate::SnapshotBackend;
use crate::error::BackendError;
use crate::exec::CommandRunner;

pub struct Btrfs {
    volume: PathBuf,
    snapshot_dir: String,
    runner: Arc<dyn CommandRunner>,
}

impl Btrfs {
    pub fn new(
        volume: impl Into<PathBuf>,
        snapshot_dir: &str,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            volume: volume.into(),
            snapshot_dir: snapshot_dir.to_string(),
            runner,
        }
    }

    /// Directory holding the snapshot subvolumes.
    pub fn snapshot_root(&self) -> PathBuf {
        self.volume.join(&self.snapshot_dir)
    }

    fn snapshot_path(&self, snapshot: &Observation) -> PathBuf {
        self.snapshot_root().join(snapshot.name())
    }

    fn path_arg(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    async fn scan(&self, root: &Path) -> Result<Vec<Observation>, BackendError> {
        let io_err = |source| BackendError::Io {
            path: root.to_path_buf(),
            source,
        };

        let mut snapshots = Vec::new();
        let mut dir = tokio::fs::read_dir(root).await.map_err(io_err)?;
        while let Some(entry) = dir.next_entry().await.map_err(io_err)? {
            if !entry.file_type().await.map_err(io_err)?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            match name.to_str().map(|n| (n, n.parse::<Observation>())) {
                // Must round-trip: deletes address the snapshot by `name()`.
                Some((raw, Ok(observation))) if observation.name() == raw => {
                    snapshots.push(observation)
                }
                _ => debug!(entry = ?name, "Skipping unmanaged entry"),
            }
        }
        Ok(snapshots)
    }
}

#[async_trait]
impl SnapshotBackend for Btrfs {
    fn description(&self) -> String {
        format!("{} using btrfs", self.snapshot_root().display())
    }

    async fn gather(&self) -> Result<Vec<Observation>, BackendError> {
        let root = self.snapshot_root();
        self.scan(&root)
            .await
            .map_err(|e| BackendError::scan(self.volume.to_string_lossy(), e))
    }

    async fn create(&self, snapshot: &Observation) -> Result<(), BackendError> {
        let args = vec![
            "subvolume".to_string(),
            "snapshot".to_string(),
            Self::path_arg(&self.volume),
            Self::path_arg(&self.snapshot_path(snapshot)),
        ];
        self.runner
            .execute("btrfs", &args)
            .await
            .map_err(|e| BackendError::create(snapshot, e))
    }

    async fn delete(&self, snapshot: &Observation) -> Result<(), BackendError> {
        let args = vec![
            "subvolume".to_string(),
            "delete".to_string(),
            Self::path_arg(&self.snapshot_path(snapshot)),
        ];
        self.runner
            .execute("btrfs", &args)
            .await
            .map_err(|e| BackendError::delete(snapshot, e))
    }
}
