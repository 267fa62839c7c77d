// ── Host WebSocket transport ──

use aldbkit_api::messages::{ALL_DEVICES, AldbRecordWire};
use std::time::Duration;

use aldbkit_api::{AldbNotification, ConnectOptions, HostClient, LinkingEvent, ReconnectConfig};
use tokio_util::sync::CancellationToken;

use super::{StatusFeed, Transport};
use crate::config::ControllerConfig;
use crate::convert::registry_device;
use crate::error::CoreError;
use crate::model::{Address, AldbRecord, BrokenLink, Device, ScanTarget};

/// Longest the modem is left in linking mode for a single device.
const LINKING_WINDOW: Duration = Duration::from_secs(180);

/// [`Transport`] over an authenticated host connection.
#[derive(Clone)]
pub struct HostTransport {
    client: HostClient,
}

impl HostTransport {
    pub fn new(client: HostClient) -> Self {
        Self { client }
    }

    /// Connect and authenticate using `config`.
    pub async fn connect(config: &ControllerConfig, cancel: CancellationToken) -> Result<Self, CoreError> {
        let options = ConnectOptions {
            timeout: config.timeout,
            reconnect: ReconnectConfig {
                max_retries: config.connect_retries,
                ..ReconnectConfig::default()
            },
        };
        let client = HostClient::connect(&config.url, &config.token, options, cancel)
            .await
            .map_err(|e| match CoreError::from(e) {
                CoreError::ConnectionFailed { reason, .. } => CoreError::ConnectionFailed {
                    url: config.url.to_string(),
                    reason,
                },
                other => other,
            })?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &HostClient {
        &self.client
    }
}

impl Transport for HostTransport {
    async fn list_devices(&self) -> Result<Vec<Device>, CoreError> {
        let entries = self.client.device_registry().await?;
        let mut devices: Vec<Device> = entries.iter().filter_map(registry_device).collect();
        devices.sort_by_key(|d| d.address);
        devices.dedup_by_key(|d| d.address);
        Ok(devices)
    }

    async fn fetch_table(&self, address: Address) -> Result<Vec<AldbRecord>, CoreError> {
        self.client
            .aldb_get(&address.id())
            .await?
            .into_iter()
            .map(AldbRecord::try_from)
            .collect()
    }

    async fn write_table(&self, address: Address, records: Vec<AldbRecord>) -> Result<(), CoreError> {
        let device = address.id();
        for record in &records {
            let wire = AldbRecordWire::from(record);
            if record.is_new() {
                self.client.aldb_create(&device, &wire).await?;
            } else {
                self.client.aldb_change(&device, &wire).await?;
            }
        }
        self.client.aldb_write(&device).await?;
        tracing::info!(address = %address, records = records.len(), "Table written");
        Ok(())
    }

    async fn reset_table(&self, address: Address) -> Result<(), CoreError> {
        self.client.aldb_reset(&address.id()).await?;
        Ok(())
    }

    async fn request_scan(&self, target: ScanTarget) -> Result<(), CoreError> {
        let device = match target {
            ScanTarget::Device(address) => address.id(),
            ScanTarget::All => ALL_DEVICES.to_owned(),
        };
        self.client.aldb_load(&device).await?;
        Ok(())
    }

    async fn remove_device(&self, address: Address, purge_all_references: bool) -> Result<(), CoreError> {
        self.client
            .device_remove(&address.id(), purge_all_references)
            .await?;
        Ok(())
    }

    async fn add_device(&self, address: Address) -> Result<bool, CoreError> {
        let mut subscription = self.client.device_add(&address.id()).await?;
        let outcome = tokio::time::timeout(LINKING_WINDOW, async {
            loop {
                match subscription.next_decoded::<LinkingEvent>().await {
                    Some(LinkingEvent::DeviceAdded { address: added }) => {
                        match Address::parse(&added) {
                            Ok(joined) if joined == address => return true,
                            Ok(joined) => tracing::info!(%joined, "Another device joined while linking"),
                            Err(e) => tracing::warn!(added, error = %e, "Ignoring linking event"),
                        }
                    }
                    Some(LinkingEvent::LinkingStopped) | None => return false,
                    Some(LinkingEvent::Other) => {}
                }
            }
        })
        .await;
        if let Err(e) = subscription.unsubscribe().await {
            tracing::debug!(error = %e, "Linking unsubscribe failed");
        }
        match outcome {
            Ok(joined) => Ok(joined),
            Err(_) => Err(CoreError::Timeout {
                timeout_secs: LINKING_WINDOW.as_secs(),
            }),
        }
    }

    async fn subscribe_status(&self) -> Result<StatusFeed, CoreError> {
        let mut subscription = self.client.subscribe_aldb_status().await?;
        let (tx, feed) = StatusFeed::channel();

        // Forward status flags until the feed is dropped, then release
        // the host-side subscription.
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = tx.closed() => break,
                    note = subscription.next_notification() => match note {
                        Some(AldbNotification::Status { is_loading }) => {
                            if tx.send(is_loading).is_err() {
                                break;
                            }
                        }
                        Some(AldbNotification::Other) => {}
                        // Channel gone; nothing left to release.
                        None => return,
                    }
                }
            }
            if let Err(e) = subscription.unsubscribe().await {
                tracing::debug!(error = %e, "Status unsubscribe failed");
            }
        });

        Ok(feed)
    }

    async fn list_unknown_devices(&self) -> Result<Vec<Address>, CoreError> {
        let raw = self.client.unknown_devices().await?;
        let mut unknown = Vec::with_capacity(raw.len());
        for entry in raw {
            match Address::parse(&entry) {
                Ok(address) => unknown.push(address),
                Err(e) => tracing::warn!(entry, error = %e, "Ignoring unknown-device entry"),
            }
        }
        unknown.sort_unstable();
        unknown.dedup();
        Ok(unknown)
    }

    async fn list_broken_links(&self) -> Result<Vec<BrokenLink>, CoreError> {
        self.client
            .broken_links()
            .await?
            .into_iter()
            .map(BrokenLink::try_from)
            .collect()
    }

    fn shutdown(&self) {
        self.client.shutdown();
    }
}
