//! Dimension upsert engine.
//!
//! Merges candidate rows into a dimension table: candidates are de-duplicated
//! by natural key (keep first), keys already present are dropped, and the
//! survivors get contiguous surrogate ids `max+1..max+n` in their original
//! order. Ids are never reused. Re-running with the same candidates is a
//! no-op.
//!
//! Candidate validation happens upstream, in the normalizer: the typed
//! candidate structs cannot represent a missing required field, so a
//! `SchemaError` is raised before a merge is ever attempted and the stored
//! table stays untouched.

use std::collections::HashSet;
use std::hash::Hash;
use tracing::info;

use crate::schema::{
    Constructor, Driver, NewConstructor, NewDriver, NewRace, Race,
};
use crate::store::Warehouse;

/// A dimension table row with a surrogate id and a natural key.
pub trait Dimension: Clone {
    type Candidate;
    type Key: Eq + Hash + Clone;
    const ENTITY: &'static str;

    fn id(&self) -> i64;
    fn key(&self) -> Self::Key;
    fn candidate_key(candidate: &Self::Candidate) -> Self::Key;
    fn assemble(id: i64, candidate: Self::Candidate) -> Self;
}

impl Dimension for Driver {
    type Candidate = NewDriver;
    type Key = String;
    const ENTITY: &'static str = "drivers";

    fn id(&self) -> i64 {
        self.driver_id
    }

    fn key(&self) -> String {
        self.driver_ref.clone()
    }

    fn candidate_key(candidate: &NewDriver) -> String {
        candidate.driver_ref.clone()
    }

    fn assemble(id: i64, c: NewDriver) -> Self {
        Driver {
            driver_id: id,
            driver_ref: c.driver_ref,
            number: c.number,
            code: c.code,
            forename: c.forename,
            surname: c.surname,
        }
    }
}

impl Dimension for Constructor {
    type Candidate = NewConstructor;
    type Key = String;
    const ENTITY: &'static str = "constructors";

    fn id(&self) -> i64 {
        self.constructor_id
    }

    fn key(&self) -> String {
        self.constructor_ref.clone()
    }

    fn candidate_key(candidate: &NewConstructor) -> String {
        candidate.constructor_ref.clone()
    }

    fn assemble(id: i64, c: NewConstructor) -> Self {
        Constructor {
            constructor_id: id,
            constructor_ref: c.constructor_ref,
            name: c.name,
        }
    }
}

impl Dimension for Race {
    type Candidate = NewRace;
    type Key = (i64, i64);
    const ENTITY: &'static str = "races";

    fn id(&self) -> i64 {
        self.race_id
    }

    fn key(&self) -> (i64, i64) {
        (self.year, self.round)
    }

    fn candidate_key(candidate: &NewRace) -> (i64, i64) {
        (candidate.year, candidate.round)
    }

    fn assemble(id: i64, c: NewRace) -> Self {
        Race {
            race_id: id,
            year: c.year,
            round: c.round,
            circuit_id: c.circuit_id,
            name: c.name,
            date: c.date,
        }
    }
}

/// Result of merging candidates into a dimension table.
pub struct UpsertOutcome<D> {
    pub table: Vec<D>,
    pub added: usize,
}

/// Merge candidates into `existing` without persisting.
pub fn merge_dimension<D: Dimension>(
    existing: Vec<D>,
    candidates: Vec<D::Candidate>,
) -> UpsertOutcome<D> {
    let mut seen: HashSet<D::Key> = existing.iter().map(|r| r.key()).collect();
    let max_id = existing.iter().map(|r| r.id()).max().unwrap_or(0);

    let mut table = existing;
    let mut next_id = max_id + 1;
    let mut added = 0;

    for candidate in candidates {
        let key = D::candidate_key(&candidate);
        // Keep-first: a later duplicate (in the batch or in the table) loses.
        if !seen.insert(key) {
            continue;
        }
        table.push(D::assemble(next_id, candidate));
        next_id += 1;
        added += 1;
    }

    if added == 0 {
        info!(entity = D::ENTITY, "no new entries to append");
    } else {
        info!(entity = D::ENTITY, added, "new entries appended");
    }

    UpsertOutcome { table, added }
}

/// Upsert drivers and persist the table when it changed.
pub fn upsert_drivers(
    warehouse: &Warehouse,
    candidates: Vec<NewDriver>,
) -> anyhow::Result<Vec<Driver>> {
    let existing = warehouse.load_drivers()?;
    let outcome = merge_dimension(existing, candidates);
    if outcome.added > 0 {
        warehouse.save_drivers(&outcome.table)?;
    }
    Ok(outcome.table)
}

/// Upsert constructors and persist the table when it changed.
pub fn upsert_constructors(
    warehouse: &Warehouse,
    candidates: Vec<NewConstructor>,
) -> anyhow::Result<Vec<Constructor>> {
    let existing = warehouse.load_constructors()?;
    let outcome = merge_dimension(existing, candidates);
    if outcome.added > 0 {
        warehouse.save_constructors(&outcome.table)?;
    }
    Ok(outcome.table)
}

/// Upsert races and persist the table when it changed.
pub fn upsert_races(
    warehouse: &Warehouse,
    candidates: Vec<NewRace>,
) -> anyhow::Result<Vec<Race>> {
    let existing = warehouse.load_races()?;
    let outcome = merge_dimension(existing, candidates);
    if outcome.added > 0 {
        warehouse.save_races(&outcome.table)?;
    }
    Ok(outcome.table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(id: i64, driver_ref: &str) -> Driver {
        Driver {
            driver_id: id,
            driver_ref: driver_ref.to_string(),
            number: None,
            code: None,
            forename: None,
            surname: None,
        }
    }

    fn candidate(driver_ref: &str) -> NewDriver {
        NewDriver {
            driver_ref: driver_ref.to_string(),
            number: None,
            code: None,
            forename: None,
            surname: None,
        }
    }

    #[test]
    fn test_ids_are_contiguous_and_monotonic() {
        let existing = vec![driver(1, "hamilton"), driver(7, "alonso")];
        let outcome = merge_dimension(
            existing,
            vec![candidate("piastri"), candidate("bearman"), candidate("colapinto")],
        );
        assert_eq!(outcome.added, 3);
        let new_ids: Vec<i64> = outcome.table[2..].iter().map(|d| d.driver_id).collect();
        assert_eq!(new_ids, vec![8, 9, 10]);
        assert_eq!(outcome.table[2].driver_ref, "piastri");
        assert_eq!(outcome.table[4].driver_ref, "colapinto");
    }

    #[test]
    fn test_batch_deduplicated_keep_first() {
        let first = NewDriver {
            driver_ref: "piastri".to_string(),
            code: Some("PIA".to_string()),
            ..candidate("piastri")
        };
        let outcome = merge_dimension(Vec::<Driver>::new(), vec![first, candidate("piastri")]);
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.table[0].code.as_deref(), Some("PIA"));
    }

    #[test]
    fn test_existing_keys_dropped() {
        let existing = vec![driver(3, "alonso")];
        let outcome = merge_dimension(existing, vec![candidate("alonso"), candidate("gasly")]);
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.table.len(), 2);
        assert_eq!(outcome.table[1].driver_ref, "gasly");
        assert_eq!(outcome.table[1].driver_id, 4);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let batch = vec![candidate("piastri"), candidate("bearman")];
        let once = merge_dimension(Vec::<Driver>::new(), batch.clone());
        let twice = merge_dimension(once.table.clone(), batch);
        assert_eq!(twice.added, 0);
        assert_eq!(twice.table, once.table);
    }

    #[test]
    fn test_empty_candidates_is_noop() {
        let existing = vec![driver(1, "hamilton")];
        let outcome = merge_dimension(existing.clone(), Vec::new());
        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.table, existing);
    }

    #[test]
    fn test_persisting_upsert_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let wh = Warehouse::new(dir.path());

        let table = upsert_drivers(&wh, vec![candidate("hamilton"), candidate("alonso")]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].driver_id, 1);

        // Second run with the same batch changes nothing on disk.
        let again = upsert_drivers(&wh, vec![candidate("hamilton"), candidate("alonso")]).unwrap();
        assert_eq!(again, table);
        assert_eq!(wh.load_drivers().unwrap(), table);
    }
}
