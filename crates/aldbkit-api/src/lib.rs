// aldbkit-api: Async client for a home-automation host's Insteon ALDB commands
//
// One authenticated WebSocket carries both request/response commands and
// push subscriptions. `aldbkit-core` builds the record store and
// reconciliation logic on top of this crate.

pub mod commands;
pub mod error;
pub mod messages;
pub mod websocket;

pub use error::Error;
pub use messages::{AldbNotification, AldbRecordWire, BrokenLinkWire, DeviceRegistryEntry, LinkingEvent};
pub use websocket::{ConnectOptions, HostClient, HostSubscription, ReconnectConfig};
