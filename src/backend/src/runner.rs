//! Applying a plan to a backend.
//!
//! Creates always run before deletes, and a single failed create cancels
//! every delete: a volume never loses an old snapshot in a run that failed
//! to produce its replacement.

use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

use policy::{KeepPolicy, Plan, PlannedAction};

use crate::SnapshotBackend;
use crate::error::BackendError;

/// What a successful run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub created: usize,
    pub deleted: usize,
}

/// An action of the plan that the backend rejected.
#[derive(Debug)]
pub struct ActionFailure {
    pub action: PlannedAction,
    pub error: BackendError,
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] BackendError),

    /// At least one create failed; no delete was attempted.
    #[error("{} snapshot(s) could not be created, skipped all deletions", .failures.len())]
    CreatePhase { failures: Vec<ActionFailure> },

    /// Every create succeeded but at least one delete failed.
    #[error("{} snapshot(s) could not be deleted", .failures.len())]
    DeletePhase { failures: Vec<ActionFailure> },
}

impl RunError {
    pub fn failures(&self) -> &[ActionFailure] {
        match self {
            RunError::Scan(_) => &[],
            RunError::CreatePhase { failures } | RunError::DeletePhase { failures } => failures,
        }
    }
}

/// Gather the volume's snapshots and compute what has to change.
pub async fn plan_volume(
    backend: &dyn SnapshotBackend,
    policy: &KeepPolicy,
) -> Result<Plan, BackendError> {
    let observations = backend.gather().await?;
    info!(
        volume = %backend.description(),
        snapshots = observations.len(),
        "Gathered existing snapshots"
    );
    Ok(policy.plan(observations))
}

/// Execute `plan` against `backend`.
pub async fn run_plan(backend: &dyn SnapshotBackend, plan: &Plan) -> Result<RunReport, RunError> {
    let mut report = RunReport::default();

    let mut failures = Vec::new();
    for snapshot in plan.creates() {
        info!(snapshot = %snapshot, "Creating snapshot");
        match backend.create(snapshot).await {
            Ok(()) => report.created += 1,
            Err(error) => {
                warn!(snapshot = %snapshot, error = %error, "Snapshot creation failed");
                failures.push(ActionFailure {
                    action: PlannedAction::create(*snapshot),
                    error,
                });
            }
        }
    }
    if !failures.is_empty() {
        return Err(RunError::CreatePhase { failures });
    }

    for snapshot in plan.deletes() {
        info!(snapshot = %snapshot, "Deleting snapshot");
        match backend.delete(snapshot).await {
            Ok(()) => report.deleted += 1,
            Err(error) => {
                warn!(snapshot = %snapshot, error = %error, "Snapshot deletion failed");
                failures.push(ActionFailure {
                    action: PlannedAction::delete(*snapshot),
                    error,
                });
            }
        }
    }
    if !failures.is_empty() {
        return Err(RunError::DeletePhase { failures });
    }

    Ok(report)
}

/// Bring one volume in line with `policy`: gather, plan, run.
pub async fn snapshot_volume(
    backend: &dyn SnapshotBackend,
    policy: &KeepPolicy,
) -> Result<RunReport, RunError> {
    let started = Instant::now();
    info!(volume = %backend.description(), now = %policy.now(), "Starting snapshot run");

    let plan = plan_volume(backend, policy).await?;
    if plan.is_empty() {
        info!(volume = %backend.description(), "Nothing to do");
        return Ok(RunReport::default());
    }

    let report = run_plan(backend, &plan).await?;
    info!(
        volume = %backend.description(),
        created = report.created,
        deleted = report.deleted,
        duration_ms = started.elapsed().as_millis() as u64,
        "Snapshot run completed"
    );
    Ok(report)
}
