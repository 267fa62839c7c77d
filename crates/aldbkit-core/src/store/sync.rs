// ── Host-backed store operations ──
//
// Load, commit, reset and device removal: the store operations that go
// through the transport. Each one leaves the store consistent when the
// transport fails.

use std::sync::Arc;

use super::RecordStore;
use super::table::DeviceTable;
use crate::error::CoreError;
use crate::model::{Address, AldbRecord};
use crate::transport::Transport;

impl RecordStore {
    /// Refresh the device directory.
    pub async fn load_directory<T: Transport>(&self, transport: &T) -> Result<usize, CoreError> {
        let devices = transport.list_devices().await?;
        let count = devices.len();
        self.set_directory(devices);
        tracing::debug!(devices = count, "Directory loaded");
        Ok(count)
    }

    /// Read a device's table, replacing whatever is held locally and
    /// clearing dirty flags. On failure the previous table is kept.
    pub async fn load<T: Transport>(
        &self,
        transport: &T,
        address: &Address,
    ) -> Result<Arc<DeviceTable>, CoreError> {
        match transport.fetch_table(*address).await {
            Ok(records) => Ok(self.apply_load(*address, records)),
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "Table load failed");
                Err(e)
            }
        }
    }

    /// Write every dirty record of a device. Returns how many records were
    /// written; zero (with no transport call) when nothing is dirty.
    ///
    /// On failure the records stay dirty so the commit can be retried or
    /// the edits reset. When a new record was written the table is
    /// re-read so it carries the address the device assigned.
    pub async fn commit<T: Transport>(&self, transport: &T, address: &Address) -> Result<usize, CoreError> {
        let pending = self.pending_writes(address)?;
        if pending.is_empty() {
            tracing::debug!(address = %address, "Nothing to commit");
            return Ok(0);
        }

        if let Err(e) = transport.write_table(*address, pending.clone()).await {
            tracing::warn!(address = %address, error = %e, "Commit failed; records left dirty");
            return Err(e);
        }

        let cleared = self.mark_committed(address, &pending);
        tracing::info!(address = %address, written = pending.len(), cleared, "Commit complete");

        // New records only learn their memory address from the device.
        if pending.iter().any(AldbRecord::is_new) {
            if let Err(e) = self.load(transport, address).await {
                tracing::warn!(address = %address, error = %e, "Reload after commit failed");
            }
        }
        Ok(pending.len())
    }

    /// Discard local edits and reload from the device.
    ///
    /// The local rollback happens first, so the last loaded records are
    /// back in place even if the reload fails.
    pub async fn reset<T: Transport>(
        &self,
        transport: &T,
        address: &Address,
    ) -> Result<Arc<DeviceTable>, CoreError> {
        if !self.restore_baseline(address) {
            return Err(CoreError::TableNotLoaded { address: *address });
        }
        tracing::info!(address = %address, "Local edits discarded");

        transport.reset_table(*address).await?;
        self.load(transport, address).await
    }

    /// Remove a device from the network and forget it locally. Cannot be
    /// undone.
    pub async fn remove_device<T: Transport>(
        &self,
        transport: &T,
        address: &Address,
        purge_all_references: bool,
    ) -> Result<(), CoreError> {
        transport.remove_device(*address, purge_all_references).await?;
        self.forget_device(address);
        tracing::info!(address = %address, purge_all_references, "Device removed");
        Ok(())
    }
}
