// ── Record store ──
//
// Per-device ALDB tables with push-based change notification.

mod collection;
mod record_store;
mod sync;
mod table;

pub use record_store::RecordStore;
pub use table::DeviceTable;
