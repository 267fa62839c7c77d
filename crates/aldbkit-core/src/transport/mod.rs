// ── Transport collaborator ──
//
// Everything the core needs from the device network, expressed as one
// trait. `HostTransport` implements it over the host's WebSocket channel;
// tests substitute an in-memory fake.

mod host;

use std::future::Future;

use tokio::sync::mpsc;

use crate::error::CoreError;
use crate::model::{Address, AldbRecord, BrokenLink, Device, ScanTarget};

pub use host::HostTransport;

/// Duplex channel to the device network.
///
/// All calls are asynchronous; per-call timeouts and retries are the
/// implementation's business.
pub trait Transport: Send + Sync + 'static {
    /// Enumerate known devices.
    fn list_devices(&self) -> impl Future<Output = Result<Vec<Device>, CoreError>> + Send;

    /// Read a device's table as the network currently holds it.
    fn fetch_table(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<Vec<AldbRecord>, CoreError>> + Send;

    /// Persist the given dirty records to the physical device.
    fn write_table(
        &self,
        address: Address,
        records: Vec<AldbRecord>,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Discard any changes staged on the network side.
    fn reset_table(&self, address: Address) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Start an asynchronous scan. Completion is reported on the status
    /// feed, not by this call.
    fn request_scan(&self, target: ScanTarget) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Remove a device, optionally purging every link that references it.
    fn remove_device(
        &self,
        address: Address,
        purge_all_references: bool,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Put the modem into linking mode for `address`. Resolves `true` once
    /// the device joined, `false` when linking stopped without it.
    fn add_device(&self, address: Address) -> impl Future<Output = Result<bool, CoreError>> + Send;

    /// Open the aggregate loading-status feed.
    fn subscribe_status(&self) -> impl Future<Output = Result<StatusFeed, CoreError>> + Send;

    /// Addresses referenced by links but absent from the network.
    fn list_unknown_devices(&self) -> impl Future<Output = Result<Vec<Address>, CoreError>> + Send;

    /// Broken links as classified by the network side.
    fn list_broken_links(&self) -> impl Future<Output = Result<Vec<BrokenLink>, CoreError>> + Send;

    /// Release the underlying connection.
    fn shutdown(&self) {}
}

// ── StatusFeed ───────────────────────────────────────────────────────

/// Stream of `is_loading` values from the network's scanning service.
///
/// Dropping the feed releases the subscription on the other side.
#[derive(Debug)]
pub struct StatusFeed {
    rx: mpsc::UnboundedReceiver<bool>,
}

impl StatusFeed {
    pub fn new(rx: mpsc::UnboundedReceiver<bool>) -> Self {
        Self { rx }
    }

    /// A connected sender/feed pair.
    pub fn channel() -> (mpsc::UnboundedSender<bool>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx))
    }

    /// Next loading flag, or `None` once the source closed.
    pub async fn next(&mut self) -> Option<bool> {
        self.rx.recv().await
    }
}
