// ── Devices and scan targets ──

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::address::{Address, AddressError};

/// A device known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub address: Address,
    pub name: Option<String>,
}

/// What a scan request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanTarget {
    Device(Address),
    All,
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(address) => write!(f, "{address}"),
            Self::All => f.write_str("all"),
        }
    }
}

impl FromStr for ScanTarget {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            Address::parse(s).map(Self::Device)
        }
    }
}

/// Aggregate counts for an overview screen. Counts are `None` while a
/// scan is outstanding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PanelSummary {
    pub any_loading: bool,
    pub broken_links: Option<usize>,
    pub unknown_devices: Option<usize>,
}
