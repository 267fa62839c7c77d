// ── Domain model ──
//
// Canonical representation of addresses, link records and findings.
// Wire payloads are converted into these types in `convert`.

pub mod address;
pub mod device;
pub mod link;
pub mod record;

pub use address::{Address, AddressError};
pub use device::{Device, PanelSummary, ScanTarget};
pub use link::{BrokenLink, LinkStatus};
pub use record::{AldbRecord, DEFAULT_DATA, LinkMode, RecordChange, RecordSlot};
