// ── One device's link table ──

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::model::{Address, AldbRecord, RecordChange, RecordSlot};

/// In-memory All-Link Database for one device.
///
/// Holds the working records (with any local edits) next to the baseline
/// captured by the last successful load, so edits can be rolled back
/// exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTable {
    address: Address,
    records: Vec<AldbRecord>,
    baseline: Vec<AldbRecord>,
    loaded_at: DateTime<Utc>,
    next_new_slot: i32,
}

impl DeviceTable {
    /// Build from an authoritative read. Dirty flags are cleared and
    /// records ordered by memory address.
    pub(crate) fn loaded(address: Address, mut records: Vec<AldbRecord>) -> Self {
        for rec in &mut records {
            rec.dirty = false;
        }
        records.sort_by_key(|r| r.mem_addr);
        Self {
            address,
            baseline: records.clone(),
            records,
            loaded_at: Utc::now(),
            next_new_slot: -1,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Records ordered by memory address ascending (staged new records,
    /// which have negative addresses, come first).
    pub fn records(&self) -> &[AldbRecord] {
        &self.records
    }

    pub fn record(&self, mem_addr: i32) -> Option<&AldbRecord> {
        self.records.iter().find(|r| r.mem_addr == mem_addr)
    }

    pub fn dirty_records(&self) -> Vec<AldbRecord> {
        self.records.iter().filter(|r| r.dirty).cloned().collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.records.iter().any(|r| r.dirty)
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    // ── Mutation (store-internal) ────────────────────────────────────

    /// Apply `change` to the record in `slot`, staging a new one for
    /// [`RecordSlot::New`]. Returns the record as it now stands.
    pub(crate) fn edit(
        &mut self,
        slot: RecordSlot,
        change: RecordChange,
        target_name: impl Fn(&Address) -> Option<String>,
    ) -> Result<AldbRecord, CoreError> {
        match slot {
            RecordSlot::New => {
                let mut record = change.into_new_record(self.next_new_slot)?;
                record.target_name = target_name(&record.target);
                self.next_new_slot -= 1;
                self.records.push(record.clone());
                self.records.sort_by_key(|r| r.mem_addr);
                Ok(record)
            }
            RecordSlot::At(mem_addr) => {
                let address = self.address;
                let record = self
                    .records
                    .iter_mut()
                    .find(|r| r.mem_addr == mem_addr)
                    .ok_or(CoreError::RecordNotFound { address, mem_addr })?;
                if change.apply(record) && record.target_name.is_none() {
                    record.target_name = target_name(&record.target);
                }
                Ok(record.clone())
            }
        }
    }

    /// Clear `dirty` on records that still match what was written. A
    /// record edited again since the write stays dirty.
    pub(crate) fn mark_committed(&mut self, written: &[AldbRecord]) -> usize {
        let mut cleared = 0;
        for rec in &mut self.records {
            if rec.dirty && written.contains(rec) {
                rec.dirty = false;
                cleared += 1;
                match self.baseline.iter_mut().find(|b| b.mem_addr == rec.mem_addr) {
                    Some(base) => base.clone_from(rec),
                    None => self.baseline.push(rec.clone()),
                }
            }
        }
        self.baseline.sort_by_key(|r| r.mem_addr);
        cleared
    }

    /// Discard every local edit.
    pub(crate) fn restore_baseline(&mut self) {
        self.records.clone_from(&self.baseline);
        // Committed-but-unreloaded new records keep their slots.
        self.next_new_slot = self
            .records
            .iter()
            .map(|r| r.mem_addr)
            .filter(|m| *m < 0)
            .min()
            .map_or(-1, |m| m - 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::LinkMode;
    use pretty_assertions::assert_eq;

    const OWNER: Address = Address::new([0x1a, 0x2b, 0x3c]);
    const PEER: Address = Address::new([0x44, 0x55, 0x66]);

    fn rec(mem_addr: i32) -> AldbRecord {
        AldbRecord {
            mem_addr,
            in_use: true,
            is_controller: true,
            highwater: false,
            group: 1,
            target: PEER,
            target_name: None,
            data1: 255,
            data2: 28,
            data3: 1,
            dirty: true,
        }
    }

    fn no_names(_: &Address) -> Option<String> {
        None
    }

    #[test]
    fn load_sorts_and_clears_dirty() {
        let table = DeviceTable::loaded(OWNER, vec![rec(4095), rec(4079), rec(4087)]);
        let addrs: Vec<i32> = table.records().iter().map(|r| r.mem_addr).collect();
        assert_eq!(addrs, vec![4079, 4087, 4095]);
        assert!(!table.is_dirty());
    }

    #[test]
    fn new_records_get_distinct_negative_slots() {
        let mut table = DeviceTable::loaded(OWNER, vec![rec(4095)]);
        let change = RecordChange {
            mode: Some(LinkMode::Responder),
            group: Some(2),
            target: Some(PEER),
            ..RecordChange::default()
        };
        let first = table.edit(RecordSlot::New, change.clone(), no_names).unwrap();
        let second = table.edit(RecordSlot::New, change, |_| Some("Peer".into())).unwrap();
        assert_eq!(first.mem_addr, -1);
        assert_eq!(second.mem_addr, -2);
        assert_eq!(second.target_name.as_deref(), Some("Peer"));
        assert_eq!(table.dirty_records().len(), 2);
    }

    #[test]
    fn edit_unknown_slot_is_not_found() {
        let mut table = DeviceTable::loaded(OWNER, vec![rec(4095)]);
        let err = table
            .edit(RecordSlot::At(100), RecordChange::deactivate(), no_names)
            .unwrap_err();
        assert!(matches!(err, CoreError::RecordNotFound { mem_addr: 100, .. }));
        assert!(!table.is_dirty());
    }

    #[test]
    fn restore_baseline_is_exact() {
        let loaded = DeviceTable::loaded(OWNER, vec![rec(4095), rec(4087)]);
        let mut table = loaded.clone();
        table
            .edit(RecordSlot::At(4095), RecordChange::deactivate(), no_names)
            .unwrap();
        table.restore_baseline();
        assert_eq!(table.records(), loaded.records());
    }

    #[test]
    fn commit_keeps_records_edited_after_the_write() {
        let mut table = DeviceTable::loaded(OWNER, vec![rec(4095), rec(4087)]);
        table
            .edit(RecordSlot::At(4095), RecordChange::deactivate(), no_names)
            .unwrap();
        let written = table.dirty_records();
        table
            .edit(
                RecordSlot::At(4087),
                RecordChange {
                    group: Some(9),
                    ..RecordChange::default()
                },
                no_names,
            )
            .unwrap();

        assert_eq!(table.mark_committed(&written), 1);
        assert!(!table.record(4095).unwrap().dirty);
        assert!(table.record(4087).unwrap().dirty);

        // Rolling back drops only the uncommitted edit.
        table.restore_baseline();
        assert!(!table.record(4095).unwrap().in_use);
        assert_eq!(table.record(4087).unwrap().group, 1);
    }
}
