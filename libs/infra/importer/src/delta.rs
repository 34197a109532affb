//! Delta computation (SPEC_FULL.md §4.6 step 1): ADD/REMOVE/UPDATE sets
//! keyed by each importer's declared primary key, in either
//! full-snapshot or explicit delta mode. The actual write (closing and
//! inserting historic rows inside one transaction) happens in
//! `dirbs-infra-db`; this crate only computes the plan so it can be unit
//! tested without a database.

use crate::row::{ChangeType, ImportRow};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    FullSnapshot,
    Delta,
}

/// The computed write plan: rows to insert fresh (`add`), PKs whose open
/// row should be closed with no replacement (`remove`), and rows whose
/// open row should be closed and immediately replaced (`update`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaPlan {
    pub add: Vec<ImportRow>,
    pub remove: Vec<String>,
    pub update: Vec<ImportRow>,
}

/// Rows rejected because they didn't match the liveness expectation
/// implied by their `change_type` (delta mode only): an `add` for an
/// already-live key, a `remove`/`update` for a key that isn't live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaViolations {
    pub invalid_add: u64,
    pub invalid_remove: u64,
    pub invalid_update: u64,
}

impl DeltaViolations {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.invalid_add + self.invalid_remove + self.invalid_update
    }
}

/// Joins `pk_columns`' values with a separator guaranteed not to appear
/// inside any single column value the schema DSL would have accepted
/// (normalized identifiers never contain `\u{1}`).
pub fn primary_key(row: &ImportRow, pk_columns: &[&str]) -> String {
    pk_columns
        .iter()
        .map(|c| row.get(c).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\u{1}")
}

/// Computes the delta plan and liveness violations for `staged` against
/// `live` (a snapshot of currently-open historic rows keyed by PK).
#[must_use]
pub fn compute_delta(
    staged: &[ImportRow],
    live: &BTreeMap<String, ImportRow>,
    pk_columns: &[&str],
    mode: ImportMode,
) -> (DeltaPlan, DeltaViolations) {
    match mode {
        ImportMode::FullSnapshot => compute_full_snapshot_delta(staged, live, pk_columns),
        ImportMode::Delta => compute_explicit_delta(staged, live, pk_columns),
    }
}

fn compute_full_snapshot_delta(
    staged: &[ImportRow],
    live: &BTreeMap<String, ImportRow>,
    pk_columns: &[&str],
) -> (DeltaPlan, DeltaViolations) {
    let mut plan = DeltaPlan::default();
    let mut staged_pks = BTreeSet::new();

    for row in staged {
        let pk = primary_key(row, pk_columns);
        staged_pks.insert(pk.clone());
        match live.get(&pk) {
            None => plan.add.push(row.clone()),
            Some(existing) => {
                if existing.payload_excluding(pk_columns) != row.payload_excluding(pk_columns) {
                    plan.update.push(row.clone());
                }
            }
        }
    }

    for pk in live.keys() {
        if !staged_pks.contains(pk) {
            plan.remove.push(pk.clone());
        }
    }

    (plan, DeltaViolations::default())
}

fn compute_explicit_delta(
    staged: &[ImportRow],
    live: &BTreeMap<String, ImportRow>,
    pk_columns: &[&str],
) -> (DeltaPlan, DeltaViolations) {
    let mut plan = DeltaPlan::default();
    let mut violations = DeltaViolations::default();

    for row in staged {
        let pk = primary_key(row, pk_columns);
        let is_live = live.contains_key(&pk);

        match row.change_type() {
            Some(ChangeType::Add) => {
                if is_live {
                    violations.invalid_add += 1;
                } else {
                    plan.add.push(row.clone());
                }
            }
            Some(ChangeType::Remove) => {
                if is_live {
                    plan.remove.push(pk);
                } else {
                    violations.invalid_remove += 1;
                }
            }
            Some(ChangeType::Update) => {
                if is_live {
                    plan.update.push(row.clone());
                } else {
                    violations.invalid_update += 1;
                }
            }
            None => {}
        }
    }

    (plan, violations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> ImportRow {
        let mut row = ImportRow::default();
        for (k, v) in pairs {
            row.set(k, (*v).to_string());
        }
        row
    }

    #[test]
    fn full_snapshot_add_remove_update() {
        let live: BTreeMap<String, ImportRow> = BTreeMap::from([
            ("A".to_string(), row(&[("imei", "A"), ("status", "old")])),
            ("B".to_string(), row(&[("imei", "B"), ("status", "same")])),
        ]);
        let staged = vec![
            row(&[("imei", "A"), ("status", "new")]),
            row(&[("imei", "B"), ("status", "same")]),
            row(&[("imei", "C"), ("status", "fresh")]),
        ];

        let (plan, violations) = compute_delta(&staged, &live, &["imei"], ImportMode::FullSnapshot);
        assert_eq!(violations, DeltaViolations::default());
        assert_eq!(plan.add.len(), 1);
        assert_eq!(plan.add[0].get("imei"), Some("C"));
        assert_eq!(plan.update.len(), 1);
        assert_eq!(plan.update[0].get("imei"), Some("A"));
        assert_eq!(plan.remove, Vec::<String>::new());
    }

    #[test]
    fn full_snapshot_detects_removal() {
        let live: BTreeMap<String, ImportRow> = BTreeMap::from([
            ("A".to_string(), row(&[("imei", "A")])),
        ]);
        let staged = vec![];
        let (plan, _) = compute_delta(&staged, &live, &["imei"], ImportMode::FullSnapshot);
        assert_eq!(plan.remove, vec!["A".to_string()]);
    }

    #[test]
    fn delta_mode_rejects_add_already_live() {
        let live: BTreeMap<String, ImportRow> = BTreeMap::from([
            ("A".to_string(), row(&[("imei", "A")])),
        ]);
        let staged = vec![row(&[("imei", "A"), ("change_type", "add")])];
        let (plan, violations) = compute_delta(&staged, &live, &["imei"], ImportMode::Delta);
        assert!(plan.add.is_empty());
        assert_eq!(violations.invalid_add, 1);
    }

    #[test]
    fn delta_mode_rejects_remove_not_live() {
        let live: BTreeMap<String, ImportRow> = BTreeMap::new();
        let staged = vec![row(&[("imei", "A"), ("change_type", "remove")])];
        let (plan, violations) = compute_delta(&staged, &live, &["imei"], ImportMode::Delta);
        assert!(plan.remove.is_empty());
        assert_eq!(violations.invalid_remove, 1);
    }

    #[test]
    fn delta_mode_accepts_valid_add_remove_update() {
        let live: BTreeMap<String, ImportRow> = BTreeMap::from([
            ("A".to_string(), row(&[("imei", "A")])),
            ("B".to_string(), row(&[("imei", "B")])),
        ]);
        let staged = vec![
            row(&[("imei", "A"), ("change_type", "remove")]),
            row(&[("imei", "B"), ("change_type", "update"), ("status", "x")]),
            row(&[("imei", "C"), ("change_type", "add")]),
        ];
        let (plan, violations) = compute_delta(&staged, &live, &["imei"], ImportMode::Delta);
        assert_eq!(violations, DeltaViolations::default());
        assert_eq!(plan.remove, vec!["A".to_string()]);
        assert_eq!(plan.update.len(), 1);
        assert_eq!(plan.add.len(), 1);
    }

    #[test]
    fn idempotent_reimport_of_identical_full_snapshot_is_empty_delta() {
        let live: BTreeMap<String, ImportRow> = BTreeMap::from([
            ("A".to_string(), row(&[("imei", "A"), ("status", "x")])),
        ]);
        let staged = vec![row(&[("imei", "A"), ("status", "x")])];
        let (plan, _) = compute_delta(&staged, &live, &["imei"], ImportMode::FullSnapshot);
        assert!(plan.add.is_empty() && plan.remove.is_empty() && plan.update.is_empty());
    }
}
