//! ZFS backend: snapshots are native dataset snapshots.
//!
//! ZFS allows only one `@` in a snapshot name, so the canonical
//! `class@timestamp` form is stored as `<prefix>class::timestamp`.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use policy::Observation;

use crate::SnapshotBackend;
use crate::error::BackendError;
use crate::exec::{CommandRunner, args};

const SEPARATOR: &str = "::";

pub struct Zfs {
    dataset: String,
    mountpoint: String,
    prefix: String,
    recursive: bool,
    runner: Arc<dyn CommandRunner>,
}

impl Zfs {
    pub fn new(
        dataset: impl Into<String>,
        mountpoint: impl Into<String>,
        prefix: &str,
        recursive: bool,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            mountpoint: mountpoint.into(),
            prefix: prefix.to_string(),
            recursive,
            runner,
        }
    }

    /// Resolve the dataset mounted at `mountpoint` and build a backend for it.
    pub async fn open(
        mountpoint: &str,
        prefix: &str,
        recursive: bool,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, BackendError> {
        let listing = runner
            .capture("zfs", &args(["list", "-H", "-o", "name,mountpoint"]))
            .await?;
        let dataset = find_dataset(&listing, mountpoint)?;
        info!(dataset = %dataset, mountpoint = %mountpoint, "Resolved ZFS dataset");
        Ok(Self::new(dataset, mountpoint, prefix, recursive, runner))
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Snapshot component of the full name, without the dataset.
    fn snapshot_name(&self, snapshot: &Observation) -> String {
        format!(
            "{}{}",
            self.prefix,
            snapshot.name().replacen('@', SEPARATOR, 1)
        )
    }

    fn full_name(&self, snapshot: &Observation) -> String {
        format!("{}@{}", self.dataset, self.snapshot_name(snapshot))
    }

    fn parse_line(&self, line: &str) -> Option<Observation> {
        let name = line
            .strip_prefix(self.dataset.as_str())?
            .strip_prefix('@')?
            .strip_prefix(self.prefix.as_str())?;
        let canonical = name.replacen(SEPARATOR, "@", 1);
        match canonical.parse::<Observation>() {
            // Must round-trip: destroy addresses the snapshot by `name()`.
            Ok(observation) if observation.name() == canonical => Some(observation),
            Ok(_) => {
                debug!(snapshot = %line, "Skipping non-canonical snapshot name");
                None
            }
            Err(e) => {
                debug!(snapshot = %line, error = %e, "Skipping unparsable snapshot");
                None
            }
        }
    }

    fn command_args(&self, verb: &str, snapshot: &Observation) -> Vec<String> {
        let mut args = vec![verb.to_string()];
        if self.recursive {
            args.push("-r".to_string());
        }
        args.push(self.full_name(snapshot));
        args
    }
}

/// Find the dataset mounted at `mountpoint` in `zfs list -H -o name,mountpoint` output.
pub fn find_dataset(listing: &str, mountpoint: &str) -> Result<String, BackendError> {
    for line in listing.lines().filter(|l| !l.trim().is_empty()) {
        let (name, mount) = line
            .split_once('\t')
            .or_else(|| line.rsplit_once(char::is_whitespace))
            .ok_or_else(|| BackendError::UnexpectedOutput {
                program: "zfs".to_string(),
                line: line.to_string(),
            })?;
        if mount.trim() == mountpoint {
            return Ok(name.trim().to_string());
        }
    }
    Err(BackendError::MountNotFound(mountpoint.to_string()))
}

#[async_trait]
impl SnapshotBackend for Zfs {
    fn description(&self) -> String {
        format!("{} using ZFS vol {}", self.mountpoint, self.dataset)
    }

    async fn gather(&self) -> Result<Vec<Observation>, BackendError> {
        let listing = self
            .runner
            .capture(
                "zfs",
                &args(["list", "-H", "-t", "snapshot", "-o", "name", self.dataset.as_str()]),
            )
            .await
            .map_err(|e| BackendError::scan(&self.mountpoint, e))?;

        Ok(listing
            .lines()
            .map(str::trim)
            .filter_map(|line| self.parse_line(line))
            .collect())
    }

    async fn create(&self, snapshot: &Observation) -> Result<(), BackendError> {
        self.runner
            .execute("zfs", &self.command_args("snapshot", snapshot))
            .await
            .map_err(|e| BackendError::create(snapshot, e))
    }

    async fn delete(&self, snapshot: &Observation) -> Result<(), BackendError> {
        self.runner
            .execute("zfs", &self.command_args("destroy", snapshot))
            .await
            .map_err(|e| BackendError::delete(snapshot, e))
    }
}
