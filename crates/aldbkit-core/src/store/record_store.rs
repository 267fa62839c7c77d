// ── ALDB record store ──
//
// Per-device link tables plus the device directory they are resolved
// against. Local mutations are synchronous; operations that talk to the
// host live in `sync.rs`.

use std::sync::Arc;

use super::collection::Collection;
use super::table::DeviceTable;
use crate::error::CoreError;
use crate::model::{Address, AldbRecord, Device, RecordChange, RecordSlot};
use crate::stream::{Snapshot, SnapshotStream};

/// In-memory record store.
///
/// Each device's table has a single logical owner; concurrent edits to
/// the same device must be serialized by the caller.
pub struct RecordStore {
    pub(crate) tables: Collection<DeviceTable>,
    pub(crate) directory: Collection<Device>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self {
            tables: Collection::new(),
            directory: Collection::new(),
        }
    }

    // ── Directory ────────────────────────────────────────────────────

    /// Replace the device directory.
    pub fn set_directory(&self, devices: Vec<Device>) {
        self.directory
            .replace_all(devices.into_iter().map(|d| (d.address, d)));
    }

    pub fn device(&self, address: &Address) -> Option<Arc<Device>> {
        self.directory.get(address)
    }

    pub fn is_known(&self, address: &Address) -> bool {
        self.directory.contains(address)
    }

    pub fn devices_snapshot(&self) -> Snapshot<Device> {
        self.directory.snapshot()
    }

    /// Known device addresses in ascending order.
    pub fn device_addresses(&self) -> Vec<Address> {
        self.directory.keys()
    }

    /// Directory display name for a device. Display-only; never used to
    /// match records.
    pub fn resolve_name(&self, address: &Address) -> Option<String> {
        self.directory.get(address).and_then(|d| d.name.clone())
    }

    // ── Tables ───────────────────────────────────────────────────────

    pub fn table(&self, address: &Address) -> Option<Arc<DeviceTable>> {
        self.tables.get(address)
    }

    pub fn is_loaded(&self, address: &Address) -> bool {
        self.tables.contains(address)
    }

    pub fn tables_snapshot(&self) -> Snapshot<DeviceTable> {
        self.tables.snapshot()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Bumped on every table or directory change; a content key for
    /// anything derived from the store.
    pub fn version(&self) -> (u64, u64) {
        (self.tables.version(), self.directory.version())
    }

    /// Replace a device's table with an authoritative read.
    pub(crate) fn apply_load(&self, address: Address, mut records: Vec<AldbRecord>) -> Arc<DeviceTable> {
        for rec in &mut records {
            rec.target_name = self.resolve_name(&rec.target);
        }
        let table = DeviceTable::loaded(address, records);
        tracing::debug!(address = %address, records = table.records().len(), "Table loaded");
        self.tables.upsert(address, table.clone());
        Arc::new(table)
    }

    /// Apply a field-level change to one record (or stage a new record
    /// for [`RecordSlot::New`]).
    ///
    /// A change that alters nothing returns the record untouched and not
    /// dirty. Nothing is sent to the device until [`commit`](Self::commit).
    pub fn edit(
        &self,
        address: &Address,
        slot: RecordSlot,
        change: RecordChange,
    ) -> Result<AldbRecord, CoreError> {
        let record = self
            .tables
            .modify(address, |table| {
                table.edit(slot, change, |target| self.resolve_name(target))
            })
            .ok_or(CoreError::TableNotLoaded { address: *address })??;

        tracing::debug!(
            address = %address,
            mem_addr = record.mem_addr,
            dirty = record.dirty,
            "Record staged"
        );
        Ok(record)
    }

    /// Records that would be written by the next commit, after checking
    /// that none of them links the device to itself.
    pub(crate) fn pending_writes(&self, address: &Address) -> Result<Vec<AldbRecord>, CoreError> {
        let table = self
            .table(address)
            .ok_or(CoreError::TableNotLoaded { address: *address })?;
        let dirty = table.dirty_records();
        if let Some(bad) = dirty.iter().find(|r| r.in_use && r.target == *address) {
            return Err(CoreError::validation(format!(
                "record {} on {address} targets its own device",
                bad.mem_addr
            )));
        }
        Ok(dirty)
    }

    pub(crate) fn mark_committed(&self, address: &Address, written: &[AldbRecord]) -> usize {
        self.tables
            .modify(address, |table| Ok::<_, CoreError>(table.mark_committed(written)))
            .and_then(Result::ok)
            .unwrap_or(0)
    }

    /// Roll a device's records back to the last load. Returns `false` if
    /// the table was never loaded.
    pub(crate) fn restore_baseline(&self, address: &Address) -> bool {
        self.tables
            .modify(address, |table| {
                table.restore_baseline();
                Ok::<_, CoreError>(())
            })
            .is_some()
    }

    /// Drop every record and directory entry for a device.
    pub(crate) fn forget_device(&self, address: &Address) {
        self.tables.remove(address);
        self.directory.remove(address);
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_tables(&self) -> SnapshotStream<DeviceTable> {
        SnapshotStream::new(self.tables.subscribe())
    }

    pub fn subscribe_devices(&self) -> SnapshotStream<Device> {
        SnapshotStream::new(self.directory.subscribe())
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::LinkMode;

    const OWNER: Address = Address::new([0x1a, 0x2b, 0x3c]);
    const PEER: Address = Address::new([0x44, 0x55, 0x66]);

    fn rec(mem_addr: i32, target: Address) -> AldbRecord {
        AldbRecord {
            mem_addr,
            in_use: true,
            is_controller: true,
            highwater: false,
            group: 1,
            target,
            target_name: None,
            data1: 255,
            data2: 28,
            data3: 1,
            dirty: false,
        }
    }

    fn store() -> RecordStore {
        let store = RecordStore::new();
        store.set_directory(vec![
            Device {
                address: OWNER,
                name: Some("Kitchen".into()),
            },
            Device {
                address: PEER,
                name: Some("Hall".into()),
            },
        ]);
        store
    }

    #[test]
    fn load_resolves_target_names() {
        let store = store();
        let table = store.apply_load(OWNER, vec![rec(4095, PEER)]);
        assert_eq!(table.records()[0].target_name.as_deref(), Some("Hall"));
    }

    #[test]
    fn edit_requires_loaded_table() {
        let store = store();
        let err = store
            .edit(&OWNER, RecordSlot::At(4095), RecordChange::deactivate())
            .unwrap_err();
        assert!(matches!(err, CoreError::TableNotLoaded { .. }));
    }

    #[test]
    fn new_record_name_is_resolved() {
        let store = store();
        store.apply_load(PEER, vec![]);
        let created = store
            .edit(
                &PEER,
                RecordSlot::New,
                RecordChange {
                    mode: Some(LinkMode::Responder),
                    group: Some(1),
                    target: Some(OWNER),
                    ..RecordChange::default()
                },
            )
            .unwrap();
        assert_eq!(created.target_name.as_deref(), Some("Kitchen"));
    }

    #[test]
    fn self_targeting_record_fails_validation() {
        let store = store();
        store.apply_load(OWNER, vec![rec(4095, PEER)]);
        store
            .edit(
                &OWNER,
                RecordSlot::At(4095),
                RecordChange {
                    target: Some(OWNER),
                    ..RecordChange::default()
                },
            )
            .unwrap();
        assert!(matches!(
            store.pending_writes(&OWNER),
            Err(CoreError::Validation { .. })
        ));
    }

    #[test]
    fn forget_device_drops_table_and_directory_entry() {
        let store = store();
        store.apply_load(PEER, vec![rec(4095, OWNER)]);
        store.forget_device(&PEER);
        assert!(!store.is_loaded(&PEER));
        assert!(!store.is_known(&PEER));
        assert_eq!(store.device_addresses(), vec![OWNER]);
    }
}
