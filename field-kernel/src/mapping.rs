use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::telemetry::TeamId;

/// Opaque quadrant identifier, drawn from the configured set.
pub type FieldId = String;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("unknown quadrant(s): {}", .0.join(", "))]
    UnknownFields(Vec<FieldId>),
    #[error("team number must be numeric: {}", .0.join(", "))]
    BadTeams(Vec<TeamId>),
    #[error("team(s) assigned to more than one quadrant: {}", .0.join(", "))]
    DuplicateTeams(Vec<TeamId>),
    #[error("no quadrant with that ID exists: {0}")]
    NoSuchField(FieldId),
    #[error("no team currently assigned to {0}")]
    Unassigned(FieldId),
}

/// The authoritative quadrant -> team mapping.
///
/// The quadrant set is fixed at construction; the mapping itself only
/// ever changes by whole-table replacement, so readers see either the
/// prior mapping or the new one, never a mixture.
pub struct AssignmentTable {
    quads: Vec<FieldId>,
    table: RwLock<HashMap<FieldId, TeamId>>,
}

impl AssignmentTable {
    /// Starts with the configured quadrants and no teams assigned.
    pub fn new(quads: Vec<FieldId>) -> Self {
        Self { quads, table: RwLock::new(HashMap::new()) }
    }

    /// The configured quadrants, in configuration order.
    pub fn quads(&self) -> &[FieldId] {
        &self.quads
    }

    /// Snapshot copy of the mapping; callers cannot reach the live
    /// table through the result.
    pub fn current_mapping(&self) -> HashMap<FieldId, TeamId> {
        self.table.read().clone()
    }

    /// The team currently on `field`, distinguishing an unconfigured
    /// quadrant from a configured but empty one.
    pub fn team_on(&self, field: &str) -> Result<TeamId, MapError> {
        if !self.quads.iter().any(|q| q == field) {
            return Err(MapError::NoSuchField(field.to_string()));
        }
        self.table
            .read()
            .get(field)
            .cloned()
            .ok_or_else(|| MapError::Unassigned(field.to_string()))
    }

    /// Replaces the whole table at once. Disruptive: any team already
    /// on a field is moved or dropped with no transition. Validation
    /// happens entirely before the write lock is taken, so a rejected
    /// mapping leaves the prior table untouched.
    ///
    /// A team may appear on at most one quadrant; duplicates are
    /// rejected rather than silently collapsed.
    pub fn immediate_remap(&self, new: HashMap<FieldId, TeamId>) -> Result<(), MapError> {
        let mut unknown: Vec<FieldId> =
            new.keys().filter(|f| !self.quads.contains(*f)).cloned().collect();
        if !unknown.is_empty() {
            unknown.sort();
            return Err(MapError::UnknownFields(unknown));
        }

        let mut bad: Vec<TeamId> = new
            .values()
            .filter(|t| t.is_empty() || !t.chars().all(|c| c.is_ascii_digit()))
            .cloned()
            .collect();
        if !bad.is_empty() {
            bad.sort();
            return Err(MapError::BadTeams(bad));
        }

        let mut seen = HashSet::new();
        let mut dups: Vec<TeamId> =
            new.values().filter(|t| !seen.insert(t.as_str())).cloned().collect();
        if !dups.is_empty() {
            dups.sort();
            dups.dedup();
            return Err(MapError::DuplicateTeams(dups));
        }

        *self.table.write() = new;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn quads() -> Vec<FieldId> {
        vec!["NE".into(), "NW".into(), "SE".into(), "SW".into()]
    }

    fn mapping(pairs: &[(&str, &str)]) -> HashMap<FieldId, TeamId> {
        pairs.iter().map(|(f, t)| (f.to_string(), t.to_string())).collect()
    }

    #[test]
    fn remap_replaces_whole_table() {
        let table = AssignmentTable::new(quads());
        table.immediate_remap(mapping(&[("NE", "100"), ("SW", "200")])).unwrap();
        assert_eq!(table.current_mapping(), mapping(&[("NE", "100"), ("SW", "200")]));

        // Full replace, not a merge: SW disappears.
        table.immediate_remap(mapping(&[("NW", "300")])).unwrap();
        assert_eq!(table.current_mapping(), mapping(&[("NW", "300")]));
    }

    #[test]
    fn rejects_unknown_quads_and_names_them() {
        let table = AssignmentTable::new(quads());
        table.immediate_remap(mapping(&[("NE", "100")])).unwrap();

        let err = table
            .immediate_remap(mapping(&[("NE", "100"), ("CENTER", "200")]))
            .unwrap_err();
        assert_eq!(err, MapError::UnknownFields(vec!["CENTER".into()]));
        assert!(err.to_string().contains("CENTER"));

        // Prior mapping untouched.
        assert_eq!(table.current_mapping(), mapping(&[("NE", "100")]));
    }

    #[test]
    fn rejects_non_numeric_teams() {
        let table = AssignmentTable::new(quads());
        let err = table.immediate_remap(mapping(&[("NE", "abc")])).unwrap_err();
        assert_eq!(err, MapError::BadTeams(vec!["abc".into()]));
        assert!(table.current_mapping().is_empty());
    }

    #[test]
    fn rejects_same_team_on_two_quads() {
        let table = AssignmentTable::new(quads());
        let err = table
            .immediate_remap(mapping(&[("NE", "100"), ("SW", "100")]))
            .unwrap_err();
        assert_eq!(err, MapError::DuplicateTeams(vec!["100".into()]));
        assert!(table.current_mapping().is_empty());
    }

    #[test]
    fn lookup_distinguishes_unknown_from_unassigned() {
        let table = AssignmentTable::new(quads());
        table.immediate_remap(mapping(&[("NE", "100")])).unwrap();

        assert_eq!(table.team_on("NE").unwrap(), "100");
        assert_eq!(table.team_on("SW").unwrap_err(), MapError::Unassigned("SW".into()));
        assert_eq!(
            table.team_on("CENTER").unwrap_err(),
            MapError::NoSuchField("CENTER".into())
        );
    }

    #[test]
    fn readers_never_see_a_torn_mapping() {
        let table = Arc::new(AssignmentTable::new(quads()));
        let before = mapping(&[("NE", "100"), ("SW", "200")]);
        let after = mapping(&[("NE", "300"), ("NW", "400")]);
        table.immediate_remap(before.clone()).unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let mut readers = Vec::new();
        for _ in 0..4 {
            let table = table.clone();
            let stop = stop.clone();
            let (before, after) = (before.clone(), after.clone());
            readers.push(std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let snap = table.current_mapping();
                    assert!(snap == before || snap == after, "torn mapping: {snap:?}");
                }
            }));
        }

        for _ in 0..500 {
            table.immediate_remap(after.clone()).unwrap();
            table.immediate_remap(before.clone()).unwrap();
        }
        stop.store(true, Ordering::Relaxed);
        for r in readers {
            r.join().unwrap();
        }
    }
}
