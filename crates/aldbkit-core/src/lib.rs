// aldbkit-core: link-table store, reconciliation, scanning and repair for
// Insteon networks, sitting between aldbkit-api and consumers (CLI).

pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod repair;
pub mod scan;
pub mod store;
pub mod stream;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{BrokenLinkSource, ControllerConfig, DEFAULT_IDLE_TIMEOUT, DEFAULT_TIMEOUT};
pub use controller::Controller;
pub use error::CoreError;
pub use reconcile::classify;
pub use repair::{PendingRepair, RepairAction, Repairer, repair_options};
pub use scan::{Findings, ScanOptions, ScanPhase, ScanStatus, Scanner};
pub use store::{DeviceTable, RecordStore};
pub use stream::{Snapshot, SnapshotStream};
pub use transport::{HostTransport, StatusFeed, Transport};

pub use model::{
    Address, AddressError, AldbRecord, BrokenLink, DEFAULT_DATA, Device, LinkMode, LinkStatus,
    PanelSummary, RecordChange, RecordSlot, ScanTarget,
};
