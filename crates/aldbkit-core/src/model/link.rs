// ── Link findings ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::address::Address;
use super::record::{AldbRecord, LinkMode};

/// Health of one link record relative to its peer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LinkStatus {
    /// Responder record with no matching controller on the peer.
    MissingController,
    /// Controller record with no matching responder on the peer.
    MissingResponder,
    /// The peer is not a known device.
    MissingTarget,
    /// A reciprocal record exists.
    Found,
    /// The peer's table has not been read yet.
    TargetDbNotLoaded,
}

impl LinkStatus {
    pub fn is_broken(self) -> bool {
        !matches!(self, Self::Found)
    }

    /// Statuses where one side of the link is absent.
    pub fn is_missing_reciprocal(self) -> bool {
        matches!(self, Self::MissingController | Self::MissingResponder)
    }
}

/// A classified link record. Derived from the store, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenLink {
    /// Device owning the record.
    pub address: Address,
    pub device_name: Option<String>,
    pub mem_addr: i32,
    pub in_use: bool,
    pub group: u8,
    pub is_controller: bool,
    pub highwater: bool,
    pub target: Address,
    pub target_name: Option<String>,
    pub data1: u8,
    pub data2: u8,
    pub data3: u8,
    pub status: LinkStatus,
}

impl BrokenLink {
    pub fn new(
        address: Address,
        device_name: Option<String>,
        record: &AldbRecord,
        status: LinkStatus,
    ) -> Self {
        Self {
            address,
            device_name,
            mem_addr: record.mem_addr,
            in_use: record.in_use,
            group: record.group,
            is_controller: record.is_controller,
            highwater: record.highwater,
            target: record.target,
            target_name: record.target_name.clone(),
            data1: record.data1,
            data2: record.data2,
            data3: record.data3,
            status,
        }
    }

    pub fn mode(&self) -> LinkMode {
        LinkMode::from_controller(self.is_controller)
    }

    /// The offending record as the finding captured it.
    pub fn record(&self) -> AldbRecord {
        AldbRecord {
            mem_addr: self.mem_addr,
            in_use: self.in_use,
            is_controller: self.is_controller,
            highwater: self.highwater,
            group: self.group,
            target: self.target,
            target_name: self.target_name.clone(),
            data1: self.data1,
            data2: self.data2,
            data3: self.data3,
            dirty: false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names() {
        assert_eq!(LinkStatus::TargetDbNotLoaded.to_string(), "target_db_not_loaded");
        assert_eq!(
            "missing_responder".parse::<LinkStatus>().unwrap(),
            LinkStatus::MissingResponder
        );
        assert_eq!(
            serde_json::to_string(&LinkStatus::MissingTarget).unwrap(),
            "\"missing_target\""
        );
    }

    #[test]
    fn only_found_is_healthy() {
        assert!(!LinkStatus::Found.is_broken());
        assert!(LinkStatus::MissingTarget.is_broken());
        assert!(LinkStatus::MissingController.is_missing_reciprocal());
        assert!(!LinkStatus::TargetDbNotLoaded.is_missing_reciprocal());
    }
}
