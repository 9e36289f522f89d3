//! Test doubles for backends and command execution.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use policy::Observation;

use crate::SnapshotBackend;
use crate::error::BackendError;
use crate::exec::CommandRunner;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn rejected(program: &str, args: &[String]) -> BackendError {
    BackendError::CommandFailed {
        program: program.to_string(),
        args: args.join(" "),
        status: "exit status: 1".to_string(),
    }
}

/// A volume that lives in memory.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    inventory: Mutex<Vec<Observation>>,
    calls: Mutex<Vec<String>>,
    failing_creates: BTreeSet<String>,
    failing_deletes: BTreeSet<String>,
    failing_gather: bool,
}

impl InMemoryBackend {
    pub fn new(snapshots: impl IntoIterator<Item = Observation>) -> Self {
        Self {
            inventory: Mutex::new(snapshots.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn failing_create(mut self, snapshot: Observation) -> Self {
        self.failing_creates.insert(snapshot.name());
        self
    }

    pub fn failing_delete(mut self, snapshot: Observation) -> Self {
        self.failing_deletes.insert(snapshot.name());
        self
    }

    pub fn failing_gather(mut self) -> Self {
        self.failing_gather = true;
        self
    }

    /// Snapshots currently on the volume.
    pub fn inventory(&self) -> Vec<Observation> {
        lock(&self.inventory).clone()
    }

    /// Every create/delete attempt, as `"<verb> <name>"`.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl SnapshotBackend for InMemoryBackend {
    fn description(&self) -> String {
        "memory".to_string()
    }

    async fn gather(&self) -> Result<Vec<Observation>, BackendError> {
        if self.failing_gather {
            return Err(BackendError::scan("memory", rejected("list", &[])));
        }
        Ok(self.inventory())
    }

    async fn create(&self, snapshot: &Observation) -> Result<(), BackendError> {
        let name = snapshot.name();
        lock(&self.calls).push(format!("create {name}"));
        if self.failing_creates.contains(&name) {
            return Err(BackendError::create(snapshot, rejected("create", &[name])));
        }
        lock(&self.inventory).push(*snapshot);
        Ok(())
    }

    async fn delete(&self, snapshot: &Observation) -> Result<(), BackendError> {
        let name = snapshot.name();
        lock(&self.calls).push(format!("delete {name}"));
        if self.failing_deletes.contains(&name) {
            return Err(BackendError::delete(snapshot, rejected("delete", &[name])));
        }
        let mut inventory = lock(&self.inventory);
        if let Some(pos) = inventory.iter().position(|o| o == snapshot) {
            inventory.remove(pos);
        }
        Ok(())
    }
}

/// Records commands instead of running them.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    commands: Mutex<Vec<String>>,
    outputs: BTreeMap<String, String>,
    failing: BTreeSet<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to `command_line` (program and arguments joined by spaces) with `output`.
    pub fn with_output(mut self, command_line: &str, output: &str) -> Self {
        self.outputs.insert(command_line.to_string(), output.to_string());
        self
    }

    /// Make every invocation of `program` fail.
    pub fn failing(mut self, program: &str) -> Self {
        self.failing.insert(program.to_string());
        self
    }

    /// Command lines passed to [`CommandRunner::execute`], in order.
    pub fn commands(&self) -> Vec<String> {
        lock(&self.commands).clone()
    }

    fn command_line(program: &str, args: &[String]) -> String {
        std::iter::once(program)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn execute(&self, program: &str, args: &[String]) -> Result<(), BackendError> {
        lock(&self.commands).push(Self::command_line(program, args));
        if self.failing.contains(program) {
            return Err(rejected(program, args));
        }
        Ok(())
    }

    async fn capture(&self, program: &str, args: &[String]) -> Result<String, BackendError> {
        if self.failing.contains(program) {
            return Err(rejected(program, args));
        }
        Ok(self
            .outputs
            .get(&Self::command_line(program, args))
            .cloned()
            .unwrap_or_default())
    }
}
