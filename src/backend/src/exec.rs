//! Execution of the external filesystem tools.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::BackendError;

/// Runs external programs on behalf of a backend.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command that mutates state. Output goes to the terminal.
    async fn execute(&self, program: &str, args: &[String]) -> Result<(), BackendError>;

    /// Run a read-only command and return its stdout.
    async fn capture(&self, program: &str, args: &[String]) -> Result<String, BackendError>;
}

/// Spawns real processes, unless running in dry-run mode.
///
/// Dry-run only affects [`CommandRunner::execute`]; listing commands still
/// run so that a dry run plans against the real inventory.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandExecutor {
    dry_run: bool,
}

impl CommandExecutor {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

fn check_status(
    program: &str,
    args: &[String],
    status: std::process::ExitStatus,
) -> Result<(), BackendError> {
    if status.success() {
        Ok(())
    } else {
        Err(BackendError::CommandFailed {
            program: program.to_string(),
            args: args.join(" "),
            status: status.to_string(),
        })
    }
}

#[async_trait]
impl CommandRunner for CommandExecutor {
    async fn execute(&self, program: &str, args: &[String]) -> Result<(), BackendError> {
        if self.dry_run {
            info!(program = %program, args = ?args, "[DRY RUN] Would execute");
            return Ok(());
        }

        debug!(program = %program, args = ?args, "Executing");
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|source| BackendError::Spawn {
                program: program.to_string(),
                source,
            })?;

        check_status(program, args, status)
    }

    async fn capture(&self, program: &str, args: &[String]) -> Result<String, BackendError> {
        debug!(program = %program, args = ?args, "Capturing output");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .await
            .map_err(|source| BackendError::Spawn {
                program: program.to_string(),
                source,
            })?;

        check_status(program, args, output.status)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Build an owned argument vector from string slices.
pub(crate) fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
