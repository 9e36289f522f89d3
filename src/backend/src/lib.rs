//! Filesystem backends that list, create and delete snapshots.
//!
//! A backend only knows how to talk to one filesystem; what to create and
//! what to delete comes from a [`policy::Plan`], applied by [`run_plan`].

use async_trait::async_trait;

use policy::Observation;

pub mod btrfs;
pub mod discovery;
pub mod error;
pub mod exec;
pub mod runner;
pub mod zfs;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use discovery::{FilesystemKind, for_volume};
pub use error::BackendError;
pub use exec::{CommandExecutor, CommandRunner};
pub use runner::{ActionFailure, RunError, RunReport, plan_volume, run_plan, snapshot_volume};

/// Snapshot operations on a single volume.
#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Human readable identification for log messages.
    fn description(&self) -> String;

    /// Snapshots managed by this tool that currently exist on the volume.
    async fn gather(&self) -> Result<Vec<Observation>, BackendError>;

    async fn create(&self, snapshot: &Observation) -> Result<(), BackendError>;

    async fn delete(&self, snapshot: &Observation) -> Result<(), BackendError>;
}
