// ── Scan orchestration ──
//
// Drives asynchronous table scans to completion. The network reports an
// aggregate loading flag on a push feed; on its falling edge the tables
// that were being scanned are re-read and findings recomputed once.

mod subscription;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use strum::Display;
use tokio::sync::{Mutex, watch};

use self::subscription::StatusSubscription;
use crate::config::{BrokenLinkSource, ControllerConfig};
use crate::error::CoreError;
use crate::model::{Address, BrokenLink, PanelSummary, ScanTarget};
use crate::reconcile::classify;
use crate::store::RecordStore;
use crate::transport::Transport;

// ── State types ──────────────────────────────────────────────────────

/// Lifecycle of one scan target. Targets not being scanned are `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ScanPhase {
    Idle,
    /// Request sent, not yet acknowledged.
    Requested,
    /// Acknowledged; waiting for the loading flag to fall.
    InFlight,
}

/// Process-wide scan state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStatus {
    /// True while any table scan is outstanding.
    pub any_loading: bool,
    /// Finished scans whose tables are still being re-read.
    pub pending_passes: u32,
    /// Scan passes fully processed (tables re-read, findings rebuilt).
    pub completed_passes: u64,
}

impl ScanStatus {
    /// No scan outstanding and every finished scan processed.
    pub fn is_settled(&self) -> bool {
        !self.any_loading && self.pending_passes == 0
    }
}

/// Latest derived listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Findings {
    pub broken_links: Vec<BrokenLink>,
    pub unknown_devices: Vec<Address>,
    /// `None` until the first successful refresh.
    pub computed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub idle_timeout: Duration,
    pub broken_links: BrokenLinkSource,
}

impl From<&ControllerConfig> for ScanOptions {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            idle_timeout: config.idle_timeout,
            broken_links: config.broken_links,
        }
    }
}

// ── Scanner ──────────────────────────────────────────────────────────

/// Scan orchestrator. Cheaply cloneable.
pub struct Scanner<T: Transport> {
    inner: Arc<ScanInner<T>>,
}

impl<T: Transport> Clone for Scanner<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ScanInner<T: Transport> {
    transport: Arc<T>,
    store: Arc<RecordStore>,
    options: ScanOptions,
    status: watch::Sender<ScanStatus>,
    phases: DashMap<ScanTarget, ScanPhase>,
    findings: ArcSwap<Findings>,
    subscription: Mutex<Option<StatusSubscription>>,
    /// Falling edges seen. Held while a pass claims its InFlight targets
    /// and while an acknowledged request marks its target InFlight.
    edges: Mutex<u64>,
}

impl<T: Transport> Scanner<T> {
    pub fn new(transport: Arc<T>, store: Arc<RecordStore>, options: ScanOptions) -> Self {
        let (status, _) = watch::channel(ScanStatus::default());
        Self {
            inner: Arc::new(ScanInner {
                transport,
                store,
                options,
                status,
                phases: DashMap::new(),
                findings: ArcSwap::from_pointee(Findings::default()),
                subscription: Mutex::new(None),
                edges: Mutex::new(0),
            }),
        }
    }

    pub(crate) fn store(&self) -> &Arc<RecordStore> {
        &self.inner.store
    }

    pub(crate) fn transport(&self) -> &T {
        &self.inner.transport
    }

    // ── State observation ────────────────────────────────────────────

    pub fn status(&self) -> ScanStatus {
        *self.inner.status.borrow()
    }

    pub fn any_loading(&self) -> bool {
        self.status().any_loading
    }

    pub fn watch_status(&self) -> watch::Receiver<ScanStatus> {
        self.inner.status.subscribe()
    }

    pub fn phase(&self, target: &ScanTarget) -> ScanPhase {
        self.inner
            .phases
            .get(target)
            .map_or(ScanPhase::Idle, |p| *p.value())
    }

    /// Cached findings. Empty while a scan is outstanding.
    pub fn findings(&self) -> Arc<Findings> {
        if self.any_loading() {
            return Arc::new(Findings::default());
        }
        self.inner.findings.load_full()
    }

    pub fn summary(&self) -> PanelSummary {
        let any_loading = self.any_loading();
        let findings = self.inner.findings.load();
        if any_loading || findings.computed_at.is_none() {
            return PanelSummary {
                any_loading,
                broken_links: None,
                unknown_devices: None,
            };
        }
        PanelSummary {
            any_loading,
            broken_links: Some(
                findings
                    .broken_links
                    .iter()
                    .filter(|l| l.status.is_broken())
                    .count(),
            ),
            unknown_devices: Some(findings.unknown_devices.len()),
        }
    }

    // ── Subscription lifecycle ───────────────────────────────────────

    /// Acquire the status subscription if it is not already held. Called
    /// when a consuming view becomes active, and before every scan.
    pub async fn open(&self) -> Result<(), CoreError> {
        let mut slot = self.inner.subscription.lock().await;
        if slot.as_ref().is_some_and(StatusSubscription::is_active) {
            return Ok(());
        }

        let feed = self.inner.transport.subscribe_status().await?;
        let weak = Arc::downgrade(&self.inner);
        *slot = Some(StatusSubscription::spawn(
            feed,
            self.inner.options.idle_timeout,
            move |is_loading| {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade() {
                        Scanner { inner }.handle_status(is_loading).await;
                    }
                }
            },
        ));
        tracing::info!(
            lifetime_secs = self.inner.options.idle_timeout.as_secs(),
            "Status subscription acquired"
        );
        Ok(())
    }

    /// Release the status subscription now (the consuming view closed).
    pub async fn close(&self) {
        if let Some(sub) = self.inner.subscription.lock().await.take() {
            sub.release();
            tracing::info!("Status subscription released");
        }
    }

    /// Whether a live status subscription is held.
    pub async fn is_subscribed(&self) -> bool {
        self.inner
            .subscription
            .lock()
            .await
            .as_ref()
            .is_some_and(StatusSubscription::is_active)
    }

    // ── Scanning ─────────────────────────────────────────────────────

    /// Ask the network to scan `target`.
    ///
    /// Re-establishes the status subscription first if it expired. On
    /// success the loading flag is raised; on failure it is left alone and
    /// the error returned, since no completion will ever be announced.
    ///
    /// The host may report the scan finished before it acknowledges the
    /// request. When a falling edge arrived in that window and nothing is
    /// loading now, the target is re-read immediately instead.
    pub async fn request_scan(&self, target: ScanTarget) -> Result<(), CoreError> {
        self.open().await?;

        let epoch = *self.inner.edges.lock().await;
        self.inner.phases.insert(target, ScanPhase::Requested);
        if let Err(e) = self.inner.transport.request_scan(target).await {
            self.inner.phases.remove(&target);
            tracing::warn!(target = %target, error = %e, "Scan request failed");
            return Err(e);
        }

        let edges = self.inner.edges.lock().await;
        if *edges != epoch && !self.any_loading() {
            self.inner.phases.remove(&target);
            self.inner.status.send_modify(|s| s.pending_passes += 1);
            drop(edges);
            tracing::info!(target = %target, "Scan finished before acknowledgement");
            self.finish_pass(&[target]).await;
            return Ok(());
        }

        self.inner.phases.insert(target, ScanPhase::InFlight);
        self.inner.status.send_if_modified(|s| {
            let rising = !s.any_loading;
            s.any_loading = true;
            rising
        });
        drop(edges);
        tracing::info!(target = %target, "Scan requested");
        Ok(())
    }

    /// Wait until no scan is outstanding and every finished one has been
    /// processed. Returns at once when already settled; callers should
    /// bound the wait with a timeout.
    pub async fn wait_until_settled(&self) -> ScanStatus {
        let mut rx = self.inner.status.subscribe();
        match rx.wait_for(ScanStatus::is_settled).await {
            Ok(status) => *status,
            // The sender lives as long as `self`.
            Err(_) => self.status(),
        }
    }

    /// Rebuild broken-link and unknown-device listings. Skipped (empty
    /// result) while a scan is outstanding.
    pub async fn refresh_findings(&self) -> Result<Arc<Findings>, CoreError> {
        if self.any_loading() {
            tracing::debug!("Scan outstanding; findings hidden");
            return Ok(Arc::new(Findings::default()));
        }

        let store = &self.inner.store;
        let broken_links = match self.inner.options.broken_links {
            BrokenLinkSource::Local => {
                classify(&store.devices_snapshot(), &store.tables_snapshot(), false)
            }
            BrokenLinkSource::Host => self.inner.transport.list_broken_links().await?,
        };
        let unknown_devices = self.inner.transport.list_unknown_devices().await?;

        let findings = Arc::new(Findings {
            broken_links,
            unknown_devices,
            computed_at: Some(Utc::now()),
        });
        self.inner.findings.store(Arc::clone(&findings));
        tracing::debug!(
            broken = findings.broken_links.len(),
            unknown = findings.unknown_devices.len(),
            "Findings refreshed"
        );
        Ok(findings)
    }

    // ── Push handling ────────────────────────────────────────────────

    async fn handle_status(&self, is_loading: bool) {
        let claimed = {
            let mut edges = self.inner.edges.lock().await;
            let mut falling = false;
            self.inner.status.send_if_modified(|s| {
                let was_loading = s.any_loading;
                s.any_loading = is_loading;
                falling = was_loading && !is_loading;
                if falling {
                    s.pending_passes += 1;
                }
                was_loading != is_loading
            });
            tracing::debug!(is_loading, falling, "Scan status");
            if !falling {
                return;
            }
            *edges += 1;
            self.claim_in_flight()
        };
        self.finish_pass(&claimed).await;
    }

    /// Take every InFlight target back to Idle. Caller holds `edges`.
    fn claim_in_flight(&self) -> Vec<ScanTarget> {
        let claimed: Vec<ScanTarget> = self
            .inner
            .phases
            .iter()
            .filter(|p| *p.value() == ScanPhase::InFlight)
            .map(|p| *p.key())
            .collect();
        for target in &claimed {
            self.inner.phases.remove(target);
        }
        claimed
    }

    /// Re-read the tables of finished targets, then recompute findings
    /// against them. Pairs with one `pending_passes` increment.
    async fn finish_pass(&self, targets: &[ScanTarget]) {
        let addresses = self.addresses_for(targets).await;
        tracing::info!(
            targets = targets.len(),
            tables = addresses.len(),
            "Scan complete; reloading tables"
        );

        let transport = &*self.inner.transport;
        for address in &addresses {
            // Failures keep the previous table; already logged by the store.
            let _ = self.inner.store.load(transport, address).await;
        }

        if let Err(e) = self.refresh_findings().await {
            tracing::warn!(error = %e, "Findings refresh failed");
        }
        self.inner.status.send_modify(|s| {
            s.pending_passes = s.pending_passes.saturating_sub(1);
            s.completed_passes += 1;
        });
    }

    async fn addresses_for(&self, targets: &[ScanTarget]) -> BTreeSet<Address> {
        let mut addresses = BTreeSet::new();
        for target in targets {
            match target {
                ScanTarget::Device(address) => {
                    addresses.insert(*address);
                }
                ScanTarget::All => {
                    if let Err(e) = self.inner.store.load_directory(&*self.inner.transport).await {
                        tracing::warn!(error = %e, "Directory refresh failed");
                    }
                    addresses.extend(self.inner.store.device_addresses());
                }
            }
        }
        addresses
    }
}
