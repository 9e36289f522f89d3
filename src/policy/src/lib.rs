//! Retention policy engine for rolling filesystem snapshots.
//!
//! Given the snapshots that currently exist on a volume and the number of
//! snapshots to keep per [`RetentionClass`], [`plan`] decides which snapshots
//! to create and which to delete. The engine is a pure function: it performs
//! no I/O and is evaluated once per run against a single reference instant.
//!
//! ## Usage
//!
//! ```
//! use chrono::{DateTime, Utc};
//! use policy::{KeepPolicy, Observation, RetentionClass};
//!
//! let now: DateTime<Utc> = "1972-11-07T16:02:03Z".parse()?;
//! let policy = KeepPolicy::new(now).with_keep(RetentionClass::Hourly, 1);
//!
//! let inventory: Vec<Observation> = vec!["hourly@1972-11-07T00:54:13Z".parse()?];
//! let plan = policy.plan(inventory);
//!
//! assert_eq!(plan.creates().count(), 1);
//! assert_eq!(plan.deletes().count(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod catalog;
pub mod error;
pub mod observation;
pub mod plan;
pub mod retention;

pub use catalog::{Catalog, CatalogEntry};
pub use error::PolicyError;
pub use observation::Observation;
pub use plan::{ActionKind, KeepPolicy, Plan, PlannedAction, plan};
pub use retention::RetentionClass;
