// ── Typed host commands ──
//
// Thin wrappers over `HostClient::call` for each Insteon command the
// host exposes. Addresses are passed through as strings; validation
// happens in `aldbkit-core` before anything reaches the wire.

use serde_json::{Value, json};

use crate::error::Error;
use crate::messages::{
    AldbRecordWire, BrokenLinkWire, DeviceRegistryEntry, INSTEON_DOMAIN, command,
};
use crate::websocket::{HostClient, HostSubscription};

impl HostClient {
    // ── All-Link Database ────────────────────────────────────────────

    /// Current in-memory table for one device, as the host holds it.
    pub async fn aldb_get(&self, device_address: &str) -> Result<Vec<AldbRecordWire>, Error> {
        self.call_typed(command::ALDB_GET, json!({ "device_address": device_address }))
            .await
    }

    /// Ask the host to (re)scan a device's table. Pass
    /// [`ALL_DEVICES`](crate::messages::ALL_DEVICES) to scan everything.
    /// Completion is announced on the `notify_all` subscription.
    pub async fn aldb_load(&self, device_address: &str) -> Result<(), Error> {
        self.call(command::ALDB_LOAD, json!({ "device_address": device_address }))
            .await
            .map(drop)
    }

    /// Stage a change to an existing record on the host.
    pub async fn aldb_change(
        &self,
        device_address: &str,
        record: &AldbRecordWire,
    ) -> Result<(), Error> {
        self.call(
            command::ALDB_CHANGE,
            json!({ "device_address": device_address, "record": record }),
        )
        .await
        .map(drop)
    }

    /// Stage a new record on the host.
    pub async fn aldb_create(
        &self,
        device_address: &str,
        record: &AldbRecordWire,
    ) -> Result<(), Error> {
        self.call(
            command::ALDB_CREATE,
            json!({ "device_address": device_address, "record": record }),
        )
        .await
        .map(drop)
    }

    /// Write every staged change to the physical device.
    pub async fn aldb_write(&self, device_address: &str) -> Result<(), Error> {
        self.call(command::ALDB_WRITE, json!({ "device_address": device_address }))
            .await
            .map(drop)
    }

    /// Discard staged changes on the host.
    pub async fn aldb_reset(&self, device_address: &str) -> Result<(), Error> {
        self.call(command::ALDB_RESET, json!({ "device_address": device_address }))
            .await
            .map(drop)
    }

    /// Subscribe to aggregate scan status.
    pub async fn subscribe_aldb_status(&self) -> Result<HostSubscription, Error> {
        self.subscribe(command::ALDB_NOTIFY_ALL, Value::Null).await
    }

    // ── Devices ──────────────────────────────────────────────────────

    /// Remove a device from the network. With `remove_all_refs`, links
    /// to it are also purged from every other device.
    pub async fn device_remove(&self, device_address: &str, remove_all_refs: bool) -> Result<(), Error> {
        self.call(
            command::DEVICE_REMOVE,
            json!({ "device_address": device_address, "remove_all_refs": remove_all_refs }),
        )
        .await
        .map(drop)
    }

    /// Put the modem into linking mode for one device. Progress arrives
    /// on the returned subscription as
    /// [`LinkingEvent`](crate::messages::LinkingEvent)s.
    pub async fn device_add(&self, device_address: &str) -> Result<HostSubscription, Error> {
        self.subscribe(
            command::DEVICE_ADD,
            json!({ "multiple": false, "device_address": device_address }),
        )
        .await
    }

    /// Addresses referenced by links but not present in the network.
    pub async fn unknown_devices(&self) -> Result<Vec<String>, Error> {
        self.call_typed(command::UNKNOWN_DEVICES, Value::Null).await
    }

    /// Host-computed broken link findings.
    pub async fn broken_links(&self) -> Result<Vec<BrokenLinkWire>, Error> {
        self.call_typed(command::BROKEN_LINKS, Value::Null).await
    }

    /// Device registry entries that belong to the Insteon integration.
    pub async fn device_registry(&self) -> Result<Vec<DeviceRegistryEntry>, Error> {
        let entries: Vec<DeviceRegistryEntry> =
            self.call_typed(command::DEVICE_REGISTRY, Value::Null).await?;
        let total = entries.len();
        let insteon: Vec<_> = entries
            .into_iter()
            .filter(|e| e.insteon_address().is_some())
            .collect();
        tracing::debug!(total, insteon = insteon.len(), domain = INSTEON_DOMAIN, "Loaded device registry");
        Ok(insteon)
    }
}
