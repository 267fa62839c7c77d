// ── Link reconciliation ──
//
// Classifies every active record against its peer's table. Pure: the
// result depends only on the directory and tables passed in.

use std::collections::HashSet;
use std::sync::Arc;

use crate::model::{Address, BrokenLink, Device, LinkStatus};
use crate::store::DeviceTable;

/// `(owner, group, target, is_controller)` for every active record.
type LinkKey = (Address, u8, Address, bool);

/// Classify every in-use, non-highwater record.
///
/// Returns nothing while a scan is outstanding: a table that is still
/// being read must not be mistaken for a missing one. Output is ordered by
/// owning device, then memory address.
///
/// A reciprocal exists when the peer holds an in-use record with the same
/// group, pointing back at the owner, in the opposite role. Any such
/// record satisfies the match; records are not paired one-to-one.
pub fn classify(
    directory: &[Arc<Device>],
    tables: &[Arc<DeviceTable>],
    any_loading: bool,
) -> Vec<BrokenLink> {
    if any_loading {
        return Vec::new();
    }

    let known: HashSet<Address> = directory.iter().map(|d| d.address).collect();
    let loaded: HashSet<Address> = tables.iter().map(|t| t.address()).collect();
    let index: HashSet<LinkKey> = tables
        .iter()
        .flat_map(|table| {
            let owner = table.address();
            table
                .records()
                .iter()
                .filter(|r| r.is_active())
                .map(move |r| (owner, r.group, r.target, r.is_controller))
        })
        .collect();

    let name_of = |address: &Address| {
        directory
            .iter()
            .find(|d| d.address == *address)
            .and_then(|d| d.name.clone())
    };

    let mut findings = Vec::new();
    for table in tables {
        let owner = table.address();
        let owner_name = name_of(&owner);
        for record in table.records().iter().filter(|r| r.is_active()) {
            let peer = record.target;
            let status = if !known.contains(&peer) {
                LinkStatus::MissingTarget
            } else if !loaded.contains(&peer) {
                LinkStatus::TargetDbNotLoaded
            } else if index.contains(&(peer, record.group, owner, !record.is_controller)) {
                LinkStatus::Found
            } else if record.is_controller {
                LinkStatus::MissingResponder
            } else {
                LinkStatus::MissingController
            };
            findings.push(BrokenLink::new(owner, owner_name.clone(), record, status));
        }
    }

    tracing::debug!(
        tables = tables.len(),
        findings = findings.len(),
        broken = findings.iter().filter(|f| f.status.is_broken()).count(),
        "Classification complete"
    );
    findings
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::AldbRecord;
    use crate::store::RecordStore;
    use pretty_assertions::assert_eq;

    const A: Address = Address::new([0xaa, 0xaa, 0xaa]);
    const B: Address = Address::new([0xbb, 0xbb, 0xbb]);
    const C: Address = Address::new([0xcc, 0xcc, 0xcc]);
    const D: Address = Address::new([0xdd, 0xdd, 0xdd]);

    fn rec(mem_addr: i32, is_controller: bool, group: u8, target: Address) -> AldbRecord {
        AldbRecord {
            mem_addr,
            in_use: true,
            is_controller,
            highwater: false,
            group,
            target,
            target_name: None,
            data1: 255,
            data2: 0,
            data3: 1,
            dirty: false,
        }
    }

    fn store_with(known: &[Address]) -> RecordStore {
        let store = RecordStore::new();
        store.set_directory(
            known
                .iter()
                .map(|a| Device {
                    address: *a,
                    name: None,
                })
                .collect(),
        );
        store
    }

    fn run(store: &RecordStore, any_loading: bool) -> Vec<(Address, i32, LinkStatus)> {
        classify(&store.devices_snapshot(), &store.tables_snapshot(), any_loading)
            .into_iter()
            .map(|f| (f.address, f.mem_addr, f.status))
            .collect()
    }

    #[test]
    fn reciprocal_pair_is_found() {
        let store = store_with(&[A, B]);
        store.apply_load(A, vec![rec(4095, true, 4, B)]);
        store.apply_load(B, vec![rec(4095, false, 4, A)]);
        assert_eq!(
            run(&store, false),
            vec![(A, 4095, LinkStatus::Found), (B, 4095, LinkStatus::Found)]
        );
    }

    #[test]
    fn missing_halves_are_reported_by_role() {
        let store = store_with(&[A, B]);
        store.apply_load(A, vec![rec(4095, true, 4, B), rec(4087, false, 7, B)]);
        store.apply_load(B, vec![]);
        assert_eq!(
            run(&store, false),
            vec![
                (A, 4087, LinkStatus::MissingController),
                (A, 4095, LinkStatus::MissingResponder),
            ]
        );
    }

    #[test]
    fn group_and_role_must_match() {
        let store = store_with(&[A, B]);
        store.apply_load(A, vec![rec(4095, true, 4, B)]);
        // Wrong group, then wrong role.
        store.apply_load(B, vec![rec(4095, false, 5, A), rec(4087, true, 4, A)]);
        let results = run(&store, false);
        assert_eq!(results[0], (A, 4095, LinkStatus::MissingResponder));
    }

    #[test]
    fn unknown_and_unloaded_peers() {
        let store = store_with(&[A, D]);
        store.apply_load(A, vec![rec(4095, true, 1, C), rec(4087, true, 1, D)]);
        assert_eq!(
            run(&store, false),
            vec![
                (A, 4087, LinkStatus::TargetDbNotLoaded),
                (A, 4095, LinkStatus::MissingTarget),
            ]
        );
    }

    #[test]
    fn inactive_and_highwater_records_are_skipped() {
        let store = store_with(&[A, B]);
        let mut unused = rec(4095, true, 1, B);
        unused.in_use = false;
        let mut sentinel = rec(4087, true, 1, B);
        sentinel.highwater = true;
        store.apply_load(A, vec![unused, sentinel]);
        store.apply_load(B, vec![]);
        assert!(run(&store, false).is_empty());
    }

    #[test]
    fn inactive_peer_record_does_not_satisfy_match() {
        let store = store_with(&[A, B]);
        store.apply_load(A, vec![rec(4095, true, 1, B)]);
        let mut responder = rec(4095, false, 1, A);
        responder.in_use = false;
        store.apply_load(B, vec![responder]);
        assert_eq!(run(&store, false), vec![(A, 4095, LinkStatus::MissingResponder)]);
    }

    #[test]
    fn duplicate_reciprocals_all_match() {
        let store = store_with(&[A, B]);
        store.apply_load(A, vec![rec(4095, true, 1, B), rec(4087, true, 1, B)]);
        store.apply_load(B, vec![rec(4095, false, 1, A)]);
        assert!(run(&store, false).iter().all(|(_, _, s)| *s == LinkStatus::Found));
    }

    #[test]
    fn nothing_while_loading() {
        let store = store_with(&[A, B]);
        store.apply_load(A, vec![rec(4095, true, 1, B)]);
        assert!(run(&store, true).is_empty());
    }

    #[test]
    fn classification_is_idempotent() {
        let store = store_with(&[A, B]);
        store.apply_load(A, vec![rec(4095, true, 1, B), rec(4087, false, 2, C)]);
        store.apply_load(B, vec![rec(4095, false, 1, A)]);
        let first = classify(&store.devices_snapshot(), &store.tables_snapshot(), false);
        let second = classify(&store.devices_snapshot(), &store.tables_snapshot(), false);
        assert_eq!(first, second);
    }
}
