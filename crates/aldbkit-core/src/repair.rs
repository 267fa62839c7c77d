// ── Repair workflow ──
//
// Turns a classified finding into the corrective record mutation. Every
// mutation is staged through the store and only reaches the device on an
// explicit confirm; nothing here commits on its own.

use serde::Serialize;
use strum::Display;

use crate::error::CoreError;
use crate::model::{Address, AldbRecord, BrokenLink, LinkStatus, RecordChange, RecordSlot, ScanTarget};
use crate::scan::Scanner;
use crate::transport::Transport;

/// A corrective action that may be offered for a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(tag = "action", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RepairAction {
    /// Re-read a device's table; no record is touched.
    Rescan { target: ScanTarget },
    /// Mark the offending record unused.
    DeleteRecord,
    /// Stage the missing half of the link on the peer.
    CreateReciprocal,
    /// Remove a device from the network.
    RemoveDevice { address: Address },
}

/// Actions applicable to `link`. Healthy links get none.
///
/// A link whose peer is unknown only offers removal of the peer or a
/// reload of the owner; nothing is edited.
pub fn repair_options(link: &BrokenLink) -> Vec<RepairAction> {
    match link.status {
        LinkStatus::Found => Vec::new(),
        LinkStatus::TargetDbNotLoaded => vec![RepairAction::Rescan {
            target: ScanTarget::Device(link.target),
        }],
        LinkStatus::MissingController | LinkStatus::MissingResponder => {
            vec![RepairAction::DeleteRecord, RepairAction::CreateReciprocal]
        }
        LinkStatus::MissingTarget => vec![
            RepairAction::RemoveDevice {
                address: link.target,
            },
            RepairAction::Rescan {
                target: ScanTarget::Device(link.address),
            },
        ],
    }
}

fn require(link: &BrokenLink, ok: bool, action: &str) -> Result<(), CoreError> {
    if ok {
        Ok(())
    } else {
        Err(CoreError::validation(format!(
            "cannot {action} for a {} link",
            link.status
        )))
    }
}

// ── Repairer ─────────────────────────────────────────────────────────

/// Applies repair actions against the store and scanner.
pub struct Repairer<T: Transport> {
    scanner: Scanner<T>,
}

impl<T: Transport> Clone for Repairer<T> {
    fn clone(&self) -> Self {
        Self {
            scanner: self.scanner.clone(),
        }
    }
}

impl<T: Transport> Repairer<T> {
    pub fn new(scanner: Scanner<T>) -> Self {
        Self { scanner }
    }

    /// Scan the peer of a link whose peer table is unknown. The finding
    /// may resolve itself once that table is read.
    pub async fn rescan_target(&self, link: &BrokenLink) -> Result<ScanTarget, CoreError> {
        require(link, link.status == LinkStatus::TargetDbNotLoaded, "rescan the target")?;
        let target = ScanTarget::Device(link.target);
        self.scanner.request_scan(target).await?;
        tracing::info!(owner = %link.address, target = %link.target, "Repair: peer rescan");
        Ok(target)
    }

    /// Reload the owning device of a link whose peer is unknown.
    pub async fn rescan_owner(&self, link: &BrokenLink) -> Result<ScanTarget, CoreError> {
        require(link, link.status == LinkStatus::MissingTarget, "reload the owner")?;
        let target = ScanTarget::Device(link.address);
        self.scanner.request_scan(target).await?;
        tracing::info!(owner = %link.address, "Repair: owner rescan");
        Ok(target)
    }

    /// Stage deletion of the offending record.
    pub fn stage_delete(&self, link: &BrokenLink) -> Result<PendingRepair<T>, CoreError> {
        require(link, link.status.is_missing_reciprocal(), "delete the record")?;
        let record = self.scanner.store().edit(
            &link.address,
            RecordSlot::At(link.mem_addr),
            RecordChange::deactivate(),
        )?;
        tracing::info!(address = %link.address, mem_addr = link.mem_addr, "Repair: delete staged");
        Ok(self.pending(link.address, record))
    }

    /// Stage the missing reciprocal record on the peer.
    ///
    /// The peer's table must be loaded. The record is only written when
    /// the returned handle is confirmed.
    pub fn stage_reciprocal(&self, link: &BrokenLink) -> Result<PendingRepair<T>, CoreError> {
        require(link, link.status.is_missing_reciprocal(), "create a reciprocal")?;
        let change = RecordChange::reciprocal_of(link.address, &link.record());
        let record = self
            .scanner
            .store()
            .edit(&link.target, RecordSlot::New, change)?;
        tracing::info!(
            address = %link.target,
            mem_addr = record.mem_addr,
            group = record.group,
            mode = %record.mode(),
            "Repair: reciprocal staged"
        );
        Ok(self.pending(link.target, record))
    }

    /// Remove the unknown peer of a link from the network.
    pub async fn remove_target(&self, link: &BrokenLink, purge_all_references: bool) -> Result<(), CoreError> {
        require(link, link.status == LinkStatus::MissingTarget, "remove the target")?;
        self.scanner
            .store()
            .remove_device(self.scanner.transport(), &link.target, purge_all_references)
            .await?;
        if let Err(e) = self.scanner.refresh_findings().await {
            tracing::warn!(error = %e, "Findings refresh after removal failed");
        }
        Ok(())
    }

    fn pending(&self, address: Address, record: AldbRecord) -> PendingRepair<T> {
        PendingRepair {
            address,
            record,
            scanner: self.scanner.clone(),
        }
    }
}

// ── PendingRepair ────────────────────────────────────────────────────

/// A staged repair awaiting the caller's decision.
///
/// Dropping it unresolved leaves the record dirty until the next load,
/// commit or reset of that device.
#[must_use = "a staged repair is neither written nor discarded until resolved"]
pub struct PendingRepair<T: Transport> {
    address: Address,
    record: AldbRecord,
    scanner: Scanner<T>,
}

impl<T: Transport> PendingRepair<T> {
    /// Device whose table holds the staged change.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The record as staged.
    pub fn record(&self) -> &AldbRecord {
        &self.record
    }

    /// Commit the device's dirty records, then refresh findings. Returns
    /// how many records were written.
    ///
    /// Other dirty records on the same device are written too.
    pub async fn confirm(self) -> Result<usize, CoreError> {
        let written = self
            .scanner
            .store()
            .commit(self.scanner.transport(), &self.address)
            .await?;
        if let Err(e) = self.scanner.refresh_findings().await {
            tracing::warn!(error = %e, "Findings refresh after repair failed");
        }
        Ok(written)
    }

    /// Discard the staged change (and any other local edit on the
    /// device), restoring the last loaded records.
    pub async fn decline(self) -> Result<(), CoreError> {
        tracing::info!(address = %self.address, "Repair declined");
        self.scanner
            .store()
            .reset(self.scanner.transport(), &self.address)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::AldbRecord;

    const A: Address = Address::new([0xaa, 0xaa, 0xaa]);
    const B: Address = Address::new([0xbb, 0xbb, 0xbb]);

    fn link(status: LinkStatus) -> BrokenLink {
        let record = AldbRecord {
            mem_addr: 4095,
            in_use: true,
            is_controller: true,
            highwater: false,
            group: 4,
            target: B,
            target_name: None,
            data1: 255,
            data2: 0,
            data3: 1,
            dirty: false,
        };
        BrokenLink::new(A, None, &record, status)
    }

    #[test]
    fn healthy_link_offers_nothing() {
        assert!(repair_options(&link(LinkStatus::Found)).is_empty());
    }

    #[test]
    fn unloaded_peer_offers_peer_rescan_only() {
        assert_eq!(
            repair_options(&link(LinkStatus::TargetDbNotLoaded)),
            vec![RepairAction::Rescan {
                target: ScanTarget::Device(B)
            }]
        );
    }

    #[test]
    fn missing_reciprocal_offers_delete_or_create() {
        for status in [LinkStatus::MissingController, LinkStatus::MissingResponder] {
            assert_eq!(
                repair_options(&link(status)),
                vec![RepairAction::DeleteRecord, RepairAction::CreateReciprocal]
            );
        }
    }

    #[test]
    fn unknown_peer_offers_no_edit() {
        let options = repair_options(&link(LinkStatus::MissingTarget));
        assert!(!options.contains(&RepairAction::DeleteRecord));
        assert!(!options.contains(&RepairAction::CreateReciprocal));
        assert!(options.contains(&RepairAction::RemoveDevice { address: B }));
    }

    #[test]
    fn action_names() {
        assert_eq!(RepairAction::CreateReciprocal.to_string(), "create_reciprocal");
        insta::assert_json_snapshot!(repair_options(&link(LinkStatus::MissingTarget)), @r#"
        [
          {
            "action": "remove_device",
            "address": "BB.BB.BB"
          },
          {
            "action": "rescan",
            "target": {
              "device": "AA.AA.AA"
            }
          }
        ]
        "#);
    }
}
