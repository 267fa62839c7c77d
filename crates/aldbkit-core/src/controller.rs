// ── Controller facade ──
//
// The entry point for consumers. Owns the transport, the record store,
// the scan orchestrator and the repair workflow, and exposes the
// operations a panel or CLI needs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::model::{Address, AldbRecord, BrokenLink, Device, PanelSummary, RecordChange, RecordSlot, ScanTarget};
use crate::reconcile::classify;
use crate::repair::{PendingRepair, RepairAction, Repairer, repair_options};
use crate::scan::{Findings, ScanOptions, ScanStatus, Scanner};
use crate::store::{DeviceTable, RecordStore};
use crate::stream::{Snapshot, SnapshotStream};
use crate::transport::{HostTransport, Transport};

/// Cheaply cloneable handle to one host connection.
pub struct Controller<T: Transport = HostTransport> {
    inner: Arc<ControllerInner<T>>,
}

impl<T: Transport> Clone for Controller<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ControllerInner<T: Transport> {
    config: ControllerConfig,
    transport: Arc<T>,
    store: Arc<RecordStore>,
    scanner: Scanner<T>,
    repairer: Repairer<T>,
    cancel: CancellationToken,
}

impl Controller<HostTransport> {
    /// Connect to the host, authenticate and read the device directory.
    pub async fn connect(config: ControllerConfig) -> Result<Self, CoreError> {
        let cancel = CancellationToken::new();
        let transport = HostTransport::connect(&config, cancel.clone()).await?;
        let controller = Self::assemble(config, transport, cancel);
        controller.refresh_directory().await?;
        info!(url = %controller.inner.config.url, "Connected to host");
        Ok(controller)
    }

    /// Connect, run `f`, disconnect. The connection is released even
    /// when `f` fails.
    pub async fn oneshot<F, Fut, R, E>(config: ControllerConfig, f: F) -> Result<R, E>
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: From<CoreError>,
    {
        let controller = Self::connect(config).await?;
        let result = f(controller.clone()).await;
        controller.disconnect().await;
        result
    }
}

impl<T: Transport> Controller<T> {
    /// Build over an already-connected transport. Does not read the
    /// directory; call [`refresh_directory`](Self::refresh_directory).
    pub fn with_transport(config: ControllerConfig, transport: T) -> Self {
        Self::assemble(config, transport, CancellationToken::new())
    }

    fn assemble(config: ControllerConfig, transport: T, cancel: CancellationToken) -> Self {
        let transport = Arc::new(transport);
        let store = Arc::new(RecordStore::new());
        let scanner = Scanner::new(Arc::clone(&transport), Arc::clone(&store), ScanOptions::from(&config));
        let repairer = Repairer::new(scanner.clone());
        Self {
            inner: Arc::new(ControllerInner {
                config,
                transport,
                store,
                scanner,
                repairer,
                cancel,
            }),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.inner.store
    }

    pub fn scanner(&self) -> &Scanner<T> {
        &self.inner.scanner
    }

    /// Release the status subscription and close the connection.
    pub async fn disconnect(&self) {
        self.inner.scanner.close().await;
        self.inner.cancel.cancel();
        self.inner.transport.shutdown();
        debug!("Disconnected");
    }

    // ── Directory ────────────────────────────────────────────────────

    pub async fn refresh_directory(&self) -> Result<usize, CoreError> {
        self.inner.store.load_directory(&*self.inner.transport).await
    }

    /// Link an unknown device into the network. On success the directory
    /// and findings are re-read so it no longer shows as unknown.
    pub async fn discover_device(&self, address: &Address) -> Result<bool, CoreError> {
        info!(address = %address, "Linking device");
        if !self.inner.transport.add_device(*address).await? {
            info!(address = %address, "Linking stopped without the device");
            return Ok(false);
        }
        self.refresh_directory().await?;
        self.refresh_findings_quietly().await;
        Ok(true)
    }

    pub fn devices(&self) -> Snapshot<Device> {
        self.inner.store.devices_snapshot()
    }

    pub fn resolve_name(&self, address: &Address) -> Option<String> {
        self.inner.store.resolve_name(address)
    }

    // ── Record store ─────────────────────────────────────────────────

    /// Read a device's table from the network.
    pub async fn load(&self, address: &Address) -> Result<Arc<DeviceTable>, CoreError> {
        self.inner.store.load(&*self.inner.transport, address).await
    }

    pub fn table(&self, address: &Address) -> Option<Arc<DeviceTable>> {
        self.inner.store.table(address)
    }

    /// Current records of a loaded device, local edits included.
    pub fn records(&self, address: &Address) -> Result<Vec<AldbRecord>, CoreError> {
        self.table(address)
            .map(|t| t.records().to_vec())
            .ok_or(CoreError::TableNotLoaded { address: *address })
    }

    /// Stage a change locally. Nothing is written until [`commit`](Self::commit).
    pub fn edit(&self, address: &Address, slot: RecordSlot, change: RecordChange) -> Result<AldbRecord, CoreError> {
        self.inner.store.edit(address, slot, change)
    }

    /// Write a device's dirty records. Findings are refreshed after a
    /// successful write.
    pub async fn commit(&self, address: &Address) -> Result<usize, CoreError> {
        let written = self.inner.store.commit(&*self.inner.transport, address).await?;
        if written > 0 {
            self.refresh_findings_quietly().await;
        }
        Ok(written)
    }

    /// Discard local edits and reload the device.
    pub async fn reset(&self, address: &Address) -> Result<Arc<DeviceTable>, CoreError> {
        self.inner.store.reset(&*self.inner.transport, address).await
    }

    /// Remove a device from the network. Cannot be undone.
    pub async fn remove_device(&self, address: &Address, purge_all_references: bool) -> Result<(), CoreError> {
        self.inner
            .store
            .remove_device(&*self.inner.transport, address, purge_all_references)
            .await?;
        self.refresh_findings_quietly().await;
        Ok(())
    }

    pub fn subscribe_tables(&self) -> SnapshotStream<DeviceTable> {
        self.inner.store.subscribe_tables()
    }

    pub fn subscribe_devices(&self) -> SnapshotStream<Device> {
        self.inner.store.subscribe_devices()
    }

    // ── Scanning ─────────────────────────────────────────────────────

    /// A consuming view became active: hold the status subscription.
    pub async fn open_view(&self) -> Result<(), CoreError> {
        self.inner.scanner.open().await
    }

    /// The consuming view closed: release the subscription now.
    pub async fn close_view(&self) {
        self.inner.scanner.close().await;
    }

    pub async fn request_scan(&self, target: ScanTarget) -> Result<(), CoreError> {
        self.inner.scanner.request_scan(target).await
    }

    /// Wait, at most `timeout`, until no scan is outstanding and the
    /// tables of finished scans have been re-read.
    pub async fn wait_for_scan(&self, timeout: Duration) -> Result<ScanStatus, CoreError> {
        tokio::time::timeout(timeout, self.inner.scanner.wait_until_settled())
            .await
            .map_err(|_| CoreError::Timeout {
                timeout_secs: timeout.as_secs(),
            })
    }

    pub fn scan_status(&self) -> ScanStatus {
        self.inner.scanner.status()
    }

    pub fn watch_scan_status(&self) -> watch::Receiver<ScanStatus> {
        self.inner.scanner.watch_status()
    }

    // ── Findings ─────────────────────────────────────────────────────

    /// Classify every loaded table now. Empty while a scan is outstanding.
    pub fn classify(&self) -> Vec<BrokenLink> {
        let store = &self.inner.store;
        classify(
            &store.devices_snapshot(),
            &store.tables_snapshot(),
            self.inner.scanner.any_loading(),
        )
    }

    pub async fn refresh_findings(&self) -> Result<Arc<Findings>, CoreError> {
        self.inner.scanner.refresh_findings().await
    }

    /// Broken links from the latest findings (healthy links omitted).
    pub fn broken_links(&self) -> Vec<BrokenLink> {
        self.inner
            .scanner
            .findings()
            .broken_links
            .iter()
            .filter(|l| l.status.is_broken())
            .cloned()
            .collect()
    }

    pub fn unknown_devices(&self) -> Vec<Address> {
        self.inner.scanner.findings().unknown_devices.clone()
    }

    pub fn summary(&self) -> PanelSummary {
        self.inner.scanner.summary()
    }

    /// The latest finding for one record.
    pub fn finding(&self, address: &Address, mem_addr: i32) -> Result<BrokenLink, CoreError> {
        self.inner
            .scanner
            .findings()
            .broken_links
            .iter()
            .find(|l| l.address == *address && l.mem_addr == mem_addr)
            .cloned()
            .ok_or(CoreError::RecordNotFound {
                address: *address,
                mem_addr,
            })
    }

    async fn refresh_findings_quietly(&self) {
        if let Err(e) = self.inner.scanner.refresh_findings().await {
            warn!(error = %e, "Findings refresh failed");
        }
    }

    // ── Repair ───────────────────────────────────────────────────────

    pub fn repair_options(&self, link: &BrokenLink) -> Vec<RepairAction> {
        repair_options(link)
    }

    pub async fn rescan_target(&self, link: &BrokenLink) -> Result<ScanTarget, CoreError> {
        self.inner.repairer.rescan_target(link).await
    }

    pub async fn rescan_owner(&self, link: &BrokenLink) -> Result<ScanTarget, CoreError> {
        self.inner.repairer.rescan_owner(link).await
    }

    pub fn stage_delete(&self, link: &BrokenLink) -> Result<PendingRepair<T>, CoreError> {
        self.inner.repairer.stage_delete(link)
    }

    pub fn stage_reciprocal(&self, link: &BrokenLink) -> Result<PendingRepair<T>, CoreError> {
        self.inner.repairer.stage_reciprocal(link)
    }

    pub async fn remove_target(&self, link: &BrokenLink, purge_all_references: bool) -> Result<(), CoreError> {
        self.inner.repairer.remove_target(link, purge_all_references).await
    }
}
