//! Retention planning: decide which snapshots to create and which to delete.
//!
//! Every class is planned on its own:
//!
//! 1. If the class is configured with a keep count of at least one and none
//!    of its snapshots is current, a snapshot stamped `now` is scheduled and
//!    a placeholder is appended to the class's sequence so the quota below
//!    already accounts for it.
//! 2. The sequence is walked oldest first. While more entries remain than
//!    the keep count allows, every stale snapshot is scheduled for deletion.
//!    Current snapshots and the placeholder are passed over without using up
//!    quota. Once the remaining count fits the quota the walk stops, even if
//!    later entries are stale.

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

use crate::catalog::{Catalog, CatalogEntry};
use crate::observation::Observation;
use crate::retention::RetentionClass;

/// What the policy demands for one evaluation.
///
/// `now` is fixed at construction and used for every freshness check of the
/// run, so one evaluation always sees a single consistent instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepPolicy {
    now: DateTime<Utc>,
    keep: BTreeMap<RetentionClass, usize>,
}

impl KeepPolicy {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: now.trunc_subsecs(0),
            keep: BTreeMap::new(),
        }
    }

    pub fn from_counts<I>(now: DateTime<Utc>, counts: I) -> Self
    where
        I: IntoIterator<Item = (RetentionClass, usize)>,
    {
        let mut policy = Self::new(now);
        policy.keep.extend(counts);
        policy
    }

    pub fn with_keep(mut self, class: RetentionClass, count: usize) -> Self {
        self.keep.insert(class, count);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Keep count for `class`; unconfigured classes keep nothing.
    pub fn keep(&self, class: RetentionClass) -> usize {
        self.keep.get(&class).copied().unwrap_or(0)
    }

    /// Configured classes and their counts, in iteration order.
    pub fn counts(&self) -> impl Iterator<Item = (RetentionClass, usize)> + '_ {
        self.keep.iter().map(|(class, count)| (*class, *count))
    }

    /// Plan against an unordered inventory.
    pub fn plan<I>(&self, observations: I) -> Plan
    where
        I: IntoIterator<Item = Observation>,
    {
        plan(Catalog::from_observations(observations), self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Delete,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Create => f.write_str("create"),
            ActionKind::Delete => f.write_str("delete"),
        }
    }
}

/// A single create or delete decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PlannedAction {
    pub kind: ActionKind,
    pub target: Observation,
}

impl PlannedAction {
    pub fn create(target: Observation) -> Self {
        Self {
            kind: ActionKind::Create,
            target,
        }
    }

    pub fn delete(target: Observation) -> Self {
        Self {
            kind: ActionKind::Delete,
            target,
        }
    }

    pub fn is_create(&self) -> bool {
        self.kind == ActionKind::Create
    }

    pub fn is_delete(&self) -> bool {
        self.kind == ActionKind::Delete
    }
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.target)
    }
}

/// Ordered list of actions. Per class, creates come before deletes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Plan {
    actions: Vec<PlannedAction>,
}

impl Plan {
    pub fn actions(&self) -> &[PlannedAction] {
        &self.actions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlannedAction> {
        self.actions.iter()
    }

    pub fn creates(&self) -> impl Iterator<Item = &Observation> + '_ {
        self.actions
            .iter()
            .filter(|a| a.is_create())
            .map(|a| &a.target)
    }

    pub fn deletes(&self) -> impl Iterator<Item = &Observation> + '_ {
        self.actions
            .iter()
            .filter(|a| a.is_delete())
            .map(|a| &a.target)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn push(&mut self, action: PlannedAction) {
        self.actions.push(action);
    }
}

impl From<Vec<PlannedAction>> for Plan {
    fn from(actions: Vec<PlannedAction>) -> Self {
        Self { actions }
    }
}

impl IntoIterator for Plan {
    type Item = PlannedAction;
    type IntoIter = std::vec::IntoIter<PlannedAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_iter()
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a PlannedAction;
    type IntoIter = std::slice::Iter<'a, PlannedAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

/// Turn the current inventory and the policy into a plan.
///
/// Classes are visited in [`RetentionClass`] order: every configured class,
/// plus every class present in the catalog (those default to a keep count of
/// zero). This function performs no I/O and cannot fail.
pub fn plan(mut catalog: Catalog, policy: &KeepPolicy) -> Plan {
    let classes: BTreeSet<RetentionClass> = policy
        .counts()
        .map(|(class, _)| class)
        .chain(catalog.classes())
        .collect();

    let mut plan = Plan::default();
    for class in classes {
        plan_class(&mut catalog, policy, class, &mut plan);
    }
    plan
}

fn plan_class(catalog: &mut Catalog, policy: &KeepPolicy, class: RetentionClass, plan: &mut Plan) {
    let now = policy.now();
    let keep = policy.keep(class);

    if keep > 0 && !catalog.snapshots(class).any(|o| o.is_current(now)) {
        let target = Observation::new(class, now);
        debug!(class = %class, target = %target, "No current snapshot, scheduling create");
        plan.push(PlannedAction::create(target));
        catalog.push_placeholder(class);
    }

    let entries = catalog.entries(class);
    let mut remaining = entries.len();
    for entry in entries {
        if remaining <= keep {
            break;
        }
        if let CatalogEntry::Snapshot(observation) = entry {
            if !observation.is_current(now) {
                debug!(class = %class, target = %observation, keep, remaining, "Scheduling delete");
                plan.push(PlannedAction::delete(*observation));
                remaining -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(s: &str) -> Observation {
        s.parse().unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(90000123, 0).unwrap()
    }

    fn create(s: &str) -> PlannedAction {
        PlannedAction::create(obs(s))
    }

    fn delete(s: &str) -> PlannedAction {
        PlannedAction::delete(obs(s))
    }

    fn run(policy: &KeepPolicy, input: &[&str]) -> Vec<PlannedAction> {
        policy
            .plan(input.iter().map(|s| obs(s)))
            .into_iter()
            .collect()
    }

    #[test]
    fn test_empty_inventory_and_policy() {
        let policy = KeepPolicy::new(now());
        assert!(run(&policy, &[]).is_empty());
    }

    #[test]
    fn test_create_missing_current_snapshot() {
        let policy = KeepPolicy::new(now())
            .with_keep(RetentionClass::Hourly, 2)
            .with_keep(RetentionClass::Daily, 1);

        let got = run(
            &policy,
            &["hourly@1972-11-07T10:54:13Z", "daily@1972-11-07T16:54:13Z"],
        );
        assert_eq!(got, vec![create("hourly@1972-11-07T16:02:03Z")]);
    }

    #[test]
    fn test_create_with_large_quota() {
        let policy = KeepPolicy::new(now())
            .with_keep(RetentionClass::Hourly, 999)
            .with_keep(RetentionClass::Daily, 1);

        let got = run(
            &policy,
            &["hourly@1972-11-07T10:54:13Z", "daily@1972-11-07T16:54:13Z"],
        );
        assert_eq!(got, vec![create("hourly@1972-11-07T16:02:03Z")]);
    }

    #[test]
    fn test_unconfigured_classes_are_wiped() {
        let policy = KeepPolicy::new(now());

        let got = run(
            &policy,
            &["daily@1900-01-17T16:54:13Z", "hourly@1900-01-17T16:54:13Z"],
        );
        assert_eq!(
            got,
            vec![
                delete("hourly@1900-01-17T16:54:13Z"),
                delete("daily@1900-01-17T16:54:13Z"),
            ]
        );
    }

    #[test]
    fn test_wipe_two_oldest() {
        let policy = KeepPolicy::new(now()).with_keep(RetentionClass::Hourly, 2);

        let got = run(
            &policy,
            &[
                "hourly@1972-11-07T14:50:13Z",
                "hourly@1972-11-07T17:54:13Z",
                "hourly@1972-11-07T13:54:13Z",
                "hourly@1972-11-07T19:54:13Z",
            ],
        );
        assert_eq!(
            got,
            vec![
                delete("hourly@1972-11-07T13:54:13Z"),
                delete("hourly@1972-11-07T14:50:13Z"),
            ]
        );
    }

    #[test]
    fn test_keep_zero_deletes_every_stale_snapshot() {
        let policy = KeepPolicy::new(now()).with_keep(RetentionClass::Hourly, 0);

        let got = run(
            &policy,
            &[
                "hourly@1972-11-07T00:54:13Z",
                "hourly@1972-11-07T01:54:13Z",
                "hourly@1972-11-07T15:54:13Z",
                "hourly@1972-11-07T03:54:13Z",
            ],
        );
        assert_eq!(
            got,
            vec![
                delete("hourly@1972-11-07T00:54:13Z"),
                delete("hourly@1972-11-07T01:54:13Z"),
                delete("hourly@1972-11-07T03:54:13Z"),
            ]
        );
    }

    #[test]
    fn test_current_snapshot_does_not_use_quota() {
        let policy = KeepPolicy::new(now()).with_keep(RetentionClass::Hourly, 1);

        let got = run(
            &policy,
            &[
                "hourly@1972-11-07T00:54:13Z",
                "hourly@1972-11-07T01:54:13Z",
                "hourly@1972-11-07T15:54:13Z",
                "hourly@1972-11-07T03:54:13Z",
            ],
        );
        assert_eq!(
            got,
            vec![
                delete("hourly@1972-11-07T00:54:13Z"),
                delete("hourly@1972-11-07T01:54:13Z"),
                delete("hourly@1972-11-07T03:54:13Z"),
            ]
        );
    }

    #[test]
    fn test_stale_snapshot_within_quota_is_kept() {
        let policy = KeepPolicy::new(now()).with_keep(RetentionClass::Hourly, 2);

        let got = run(
            &policy,
            &[
                "hourly@1972-11-07T00:54:13Z",
                "hourly@1972-11-07T01:54:13Z",
                "hourly@1972-11-07T15:54:13Z",
                "hourly@1972-11-07T03:54:13Z",
            ],
        );
        assert_eq!(
            got,
            vec![
                delete("hourly@1972-11-07T00:54:13Z"),
                delete("hourly@1972-11-07T01:54:13Z"),
            ]
        );
    }

    #[test]
    fn test_create_counts_towards_quota() {
        let policy = KeepPolicy::new(now()).with_keep(RetentionClass::Hourly, 2);

        let got = run(
            &policy,
            &[
                "hourly@1972-11-07T00:54:13Z",
                "hourly@1972-11-07T01:54:13Z",
                "hourly@1972-11-07T03:54:13Z",
            ],
        );
        assert_eq!(
            got,
            vec![
                create("hourly@1972-11-07T16:02:03Z"),
                delete("hourly@1972-11-07T00:54:13Z"),
                delete("hourly@1972-11-07T01:54:13Z"),
            ]
        );
    }

    #[test]
    fn test_create_one_drop_three() {
        let policy = KeepPolicy::new(now()).with_keep(RetentionClass::Hourly, 1);

        let got = run(
            &policy,
            &[
                "hourly@1972-11-07T00:54:13Z",
                "hourly@1972-11-07T01:54:13Z",
                "hourly@1972-11-07T03:54:13Z",
            ],
        );
        assert_eq!(
            got,
            vec![
                create("hourly@1972-11-07T16:02:03Z"),
                delete("hourly@1972-11-07T00:54:13Z"),
                delete("hourly@1972-11-07T01:54:13Z"),
                delete("hourly@1972-11-07T03:54:13Z"),
            ]
        );
    }

    #[test]
    fn test_simple_swap() {
        let policy = KeepPolicy::new(now()).with_keep(RetentionClass::Hourly, 1);

        let got = run(&policy, &["hourly@1972-11-07T00:54:13Z"]);
        assert_eq!(
            got,
            vec![
                create("hourly@1972-11-07T16:02:03Z"),
                delete("hourly@1972-11-07T00:54:13Z"),
            ]
        );
    }

    #[test]
    fn test_classes_are_planned_independently() {
        let policy = KeepPolicy::new(now())
            .with_keep(RetentionClass::Hourly, 1)
            .with_keep(RetentionClass::Daily, 1);

        let got = run(
            &policy,
            &[
                "daily@1972-11-01T00:00:00Z",
                "hourly@1972-11-07T16:00:00Z",
                "hourly@1972-11-07T12:00:00Z",
            ],
        );
        assert_eq!(
            got,
            vec![
                delete("hourly@1972-11-07T12:00:00Z"),
                create("daily@1972-11-07T16:02:03Z"),
                delete("daily@1972-11-01T00:00:00Z"),
            ]
        );
    }

    #[test]
    fn test_duplicate_timestamps_count_separately() {
        let policy = KeepPolicy::new(now()).with_keep(RetentionClass::Hourly, 1);

        let got = run(
            &policy,
            &[
                "hourly@1972-11-07T16:00:00Z",
                "hourly@1972-11-07T12:00:00Z",
                "hourly@1972-11-07T12:00:00Z",
            ],
        );
        assert_eq!(
            got,
            vec![
                delete("hourly@1972-11-07T12:00:00Z"),
                delete("hourly@1972-11-07T12:00:00Z"),
            ]
        );
    }

    #[test]
    fn test_noop_when_satisfied() {
        let policy = KeepPolicy::new(now())
            .with_keep(RetentionClass::Hourly, 3)
            .with_keep(RetentionClass::Weekly, 1);

        let got = run(
            &policy,
            &[
                "hourly@1972-11-07T15:30:00Z",
                "hourly@1972-11-07T14:30:00Z",
                "weekly@1972-11-05T00:00:00Z",
            ],
        );
        assert!(got.is_empty());
    }

    #[test]
    fn test_keep_policy_truncates_now() {
        let precise = now() + chrono::Duration::milliseconds(400);
        let policy = KeepPolicy::new(precise).with_keep(RetentionClass::Minutely, 1);
        let plan = policy.plan(Vec::<Observation>::new());

        assert_eq!(policy.now(), now());
        assert_eq!(plan.creates().next().unwrap().timestamp(), policy.now());
    }

    #[test]
    fn test_plan_accessors() {
        let policy = KeepPolicy::new(now()).with_keep(RetentionClass::Hourly, 1);
        let plan = policy.plan([obs("hourly@1972-11-07T00:54:13Z")]);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.creates().count(), 1);
        assert_eq!(plan.deletes().count(), 1);
        assert_eq!(
            plan.actions()[0].to_string(),
            "create hourly@1972-11-07T16:02:03Z"
        );

        let json = serde_json::to_string(&plan).unwrap();
        assert_eq!(
            json,
            r#"[{"kind":"create","target":"hourly@1972-11-07T16:02:03Z"},{"kind":"delete","target":"hourly@1972-11-07T00:54:13Z"}]"#
        );
    }
}
