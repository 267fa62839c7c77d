// ── ALDB record domain types ──

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::address::Address;
use crate::error::CoreError;

/// Payload bytes for records created without explicit data.
pub const DEFAULT_DATA: (u8, u8, u8) = (255, 0, 1);

/// Role the owning device plays in a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum LinkMode {
    #[strum(to_string = "controller", serialize = "c")]
    Controller,
    #[strum(to_string = "responder", serialize = "r")]
    Responder,
}

impl LinkMode {
    pub fn from_controller(is_controller: bool) -> Self {
        if is_controller {
            Self::Controller
        } else {
            Self::Responder
        }
    }

    pub fn is_controller(self) -> bool {
        matches!(self, Self::Controller)
    }

    /// The role the peer's matching record must have.
    pub fn reciprocal(self) -> Self {
        match self {
            Self::Controller => Self::Responder,
            Self::Responder => Self::Controller,
        }
    }
}

/// One row of a device's All-Link Database.
///
/// `mem_addr` identifies the storage slot on the device. Negative values
/// mark records staged locally that the device has not stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AldbRecord {
    pub mem_addr: i32,
    pub in_use: bool,
    pub is_controller: bool,
    pub highwater: bool,
    pub group: u8,
    pub target: Address,
    /// Display name resolved from the device directory.
    pub target_name: Option<String>,
    pub data1: u8,
    pub data2: u8,
    pub data3: u8,
    pub dirty: bool,
}

impl AldbRecord {
    pub fn is_new(&self) -> bool {
        self.mem_addr < 0
    }

    pub fn mode(&self) -> LinkMode {
        LinkMode::from_controller(self.is_controller)
    }

    /// Whether the record participates in link reconciliation.
    pub fn is_active(&self) -> bool {
        self.in_use && !self.highwater
    }

    pub fn slot(&self) -> RecordSlot {
        RecordSlot::At(self.mem_addr)
    }
}

// ── RecordSlot ───────────────────────────────────────────────────────

/// Which record an edit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordSlot {
    /// Stage a brand-new record.
    New,
    /// An existing record, by memory address.
    At(i32),
}

impl fmt::Display for RecordSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => f.write_str("new"),
            Self::At(mem_addr) => write!(f, "{mem_addr}"),
        }
    }
}

impl FromStr for RecordSlot {
    type Err = CoreError;

    /// `new`, a decimal memory address, or a `0x`-prefixed hex one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("new") {
            return Ok(Self::New);
        }
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => i32::from_str_radix(hex, 16),
            None => s.parse(),
        };
        parsed
            .map(Self::At)
            .map_err(|_| CoreError::validation(format!("invalid memory address '{s}'")))
    }
}

// ── RecordChange ─────────────────────────────────────────────────────

/// Field-level mutation for [`RecordStore::edit`](crate::store::RecordStore::edit).
///
/// `None` leaves a field untouched. When creating a record, `target`,
/// `group` and `mode` are required; `in_use` defaults to `true` and the
/// payload to [`DEFAULT_DATA`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordChange {
    pub in_use: Option<bool>,
    pub mode: Option<LinkMode>,
    pub group: Option<u8>,
    pub target: Option<Address>,
    pub data1: Option<u8>,
    pub data2: Option<u8>,
    pub data3: Option<u8>,
}

impl RecordChange {
    /// Mark a record as no longer in use.
    pub fn deactivate() -> Self {
        Self {
            in_use: Some(false),
            ..Self::default()
        }
    }

    /// The record `owner` needs so that `record` has a reciprocal.
    pub fn reciprocal_of(owner: Address, record: &AldbRecord) -> Self {
        let (data1, data2, data3) = DEFAULT_DATA;
        Self {
            in_use: Some(true),
            mode: Some(record.mode().reciprocal()),
            group: Some(record.group),
            target: Some(owner),
            data1: Some(data1),
            data2: Some(data2),
            data3: Some(data3),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to an existing record. Returns `false` (and leaves the record
    /// untouched) when no field actually changes.
    pub(crate) fn apply(&self, record: &mut AldbRecord) -> bool {
        let mut next = record.clone();
        if let Some(in_use) = self.in_use {
            next.in_use = in_use;
        }
        if let Some(mode) = self.mode {
            next.is_controller = mode.is_controller();
        }
        if let Some(group) = self.group {
            next.group = group;
        }
        if let Some(target) = self.target {
            if target != next.target {
                next.target = target;
                next.target_name = None;
            }
        }
        if let Some(v) = self.data1 {
            next.data1 = v;
        }
        if let Some(v) = self.data2 {
            next.data2 = v;
        }
        if let Some(v) = self.data3 {
            next.data3 = v;
        }

        if next == *record {
            return false;
        }
        next.highwater = false;
        next.dirty = true;
        *record = next;
        true
    }

    /// Build a staged record for slot `mem_addr`.
    pub(crate) fn into_new_record(self, mem_addr: i32) -> Result<AldbRecord, CoreError> {
        let target = self
            .target
            .ok_or_else(|| CoreError::validation("a new record needs a target address"))?;
        let group = self
            .group
            .ok_or_else(|| CoreError::validation("a new record needs a group"))?;
        let mode = self
            .mode
            .ok_or_else(|| CoreError::validation("a new record needs a mode (controller or responder)"))?;
        let (data1, data2, data3) = DEFAULT_DATA;

        Ok(AldbRecord {
            mem_addr,
            in_use: self.in_use.unwrap_or(true),
            is_controller: mode.is_controller(),
            highwater: false,
            group,
            target,
            target_name: None,
            data1: self.data1.unwrap_or(data1),
            data2: self.data2.unwrap_or(data2),
            data3: self.data3.unwrap_or(data3),
            dirty: true,
        })
    }
}
