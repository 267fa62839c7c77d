// ── Wire-to-domain conversions ──
//
// Bridges raw `aldbkit_api` payloads into `aldbkit_core::model` types.
// Addresses are validated here; a malformed address from the host is a
// transport fault, not a user input error.

use aldbkit_api::messages::{AldbRecordWire, BrokenLinkWire, DeviceRegistryEntry};

use crate::error::CoreError;
use crate::model::{Address, AldbRecord, BrokenLink, Device, LinkStatus};

// ── Helpers ────────────────────────────────────────────────────────

fn host_address(raw: &str) -> Result<Address, CoreError> {
    Address::parse(raw).map_err(|e| CoreError::Transport {
        message: format!("host sent {e}"),
        code: None,
    })
}

// ── Records ────────────────────────────────────────────────────────

impl TryFrom<AldbRecordWire> for AldbRecord {
    type Error = CoreError;

    fn try_from(wire: AldbRecordWire) -> Result<Self, Self::Error> {
        Ok(Self {
            mem_addr: wire.mem_addr,
            in_use: wire.in_use,
            is_controller: wire.is_controller,
            highwater: wire.highwater,
            group: wire.group,
            target: host_address(&wire.target)?,
            target_name: wire.target_name,
            data1: wire.data1,
            data2: wire.data2,
            data3: wire.data3,
            dirty: wire.dirty,
        })
    }
}

impl From<&AldbRecord> for AldbRecordWire {
    fn from(record: &AldbRecord) -> Self {
        Self {
            mem_addr: record.mem_addr,
            in_use: record.in_use,
            is_controller: record.is_controller,
            highwater: record.highwater,
            group: record.group,
            target: record.target.id(),
            target_name: record.target_name.clone(),
            data1: record.data1,
            data2: record.data2,
            data3: record.data3,
            dirty: record.dirty,
        }
    }
}

// ── Findings ───────────────────────────────────────────────────────

impl TryFrom<BrokenLinkWire> for BrokenLink {
    type Error = CoreError;

    fn try_from(wire: BrokenLinkWire) -> Result<Self, Self::Error> {
        let status: LinkStatus = wire.status.parse().map_err(|_| CoreError::Transport {
            message: format!("unknown link status '{}'", wire.status),
            code: None,
        })?;

        Ok(Self {
            address: host_address(&wire.address)?,
            device_name: wire.device_name,
            mem_addr: wire.mem_addr,
            in_use: wire.in_use,
            group: wire.group,
            is_controller: wire.is_controller,
            highwater: wire.highwater,
            target: host_address(&wire.target)?,
            target_name: wire.target_name,
            data1: wire.data1,
            data2: wire.data2,
            data3: wire.data3,
            status,
        })
    }
}

// ── Directory ──────────────────────────────────────────────────────

/// Directory entry for a registry device, or `None` when the entry
/// carries no usable Insteon address.
pub(crate) fn registry_device(entry: &DeviceRegistryEntry) -> Option<Device> {
    let raw = entry.insteon_address()?;
    match Address::parse(raw) {
        Ok(address) => Some(Device {
            address,
            name: entry.display_name().map(str::to_owned),
        }),
        Err(e) => {
            tracing::debug!(id = %entry.id, error = %e, "Skipping registry entry");
            None
        }
    }
}
