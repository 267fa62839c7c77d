// ── Wire types ──
//
// JSON shapes exchanged with the host. Field names follow the host's
// snake_case payloads exactly; conversion to domain types happens in
// `aldbkit-core`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Command names ────────────────────────────────────────────────────

pub mod command {
    pub const ALDB_GET: &str = "insteon/aldb/get";
    pub const ALDB_LOAD: &str = "insteon/aldb/load";
    pub const ALDB_CHANGE: &str = "insteon/aldb/change";
    pub const ALDB_CREATE: &str = "insteon/aldb/create";
    pub const ALDB_WRITE: &str = "insteon/aldb/write";
    pub const ALDB_RESET: &str = "insteon/aldb/reset";
    pub const ALDB_NOTIFY_ALL: &str = "insteon/aldb/notify_all";
    pub const DEVICE_REMOVE: &str = "insteon/device/remove";
    pub const DEVICE_ADD: &str = "insteon/device/add";
    pub const BROKEN_LINKS: &str = "insteon/config/get_broken_links";
    pub const UNKNOWN_DEVICES: &str = "insteon/config/get_unknown_devices";
    pub const DEVICE_REGISTRY: &str = "config/device_registry/list";
    pub const UNSUBSCRIBE: &str = "unsubscribe_events";
}

/// `device_address` value that asks the host to scan every device.
pub const ALL_DEVICES: &str = "all";

/// Identifier domain used in device registry entries.
pub const INSTEON_DOMAIN: &str = "insteon";

// ── Records ──────────────────────────────────────────────────────────

/// One All-Link Database row as the host serializes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AldbRecordWire {
    pub mem_addr: i32,
    pub in_use: bool,
    pub is_controller: bool,
    pub highwater: bool,
    pub group: u8,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    pub data1: u8,
    pub data2: u8,
    pub data3: u8,
    #[serde(default)]
    pub dirty: bool,
}

/// A broken-link finding as computed by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenLinkWire {
    pub address: String,
    #[serde(default)]
    pub device_name: Option<String>,
    pub mem_addr: i32,
    pub in_use: bool,
    pub group: u8,
    pub is_controller: bool,
    pub highwater: bool,
    pub target: String,
    #[serde(default)]
    pub target_name: Option<String>,
    pub data1: u8,
    pub data2: u8,
    pub data3: u8,
    pub status: String,
}

/// Device registry entry (only the fields we read).
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRegistryEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub name_by_user: Option<String>,
    #[serde(default)]
    pub identifiers: Vec<(String, String)>,
}

impl DeviceRegistryEntry {
    /// The Insteon address this entry carries, if any.
    pub fn insteon_address(&self) -> Option<&str> {
        self.identifiers
            .iter()
            .find(|(domain, _)| domain == INSTEON_DOMAIN)
            .map(|(_, address)| address.as_str())
    }

    /// User-assigned name first, integration name second.
    pub fn display_name(&self) -> Option<&str> {
        self.name_by_user.as_deref().or(self.name.as_deref())
    }
}

// ── Notifications ────────────────────────────────────────────────────

/// Push notification delivered on the `notify_all` subscription.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AldbNotification {
    /// Aggregate loading flag across all device scans.
    Status { is_loading: bool },
    /// Any other notification type (per-record progress, etc.).
    #[serde(other)]
    Other,
}

/// Events delivered on a `device/add` subscription while the modem is in
/// linking mode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkingEvent {
    DeviceAdded { address: String },
    LinkingStopped,
    #[serde(other)]
    Other,
}

// ── Frames ───────────────────────────────────────────────────────────

/// Failure payload of a `result` frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostFailure {
    #[serde(default = "unknown_code")]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

fn unknown_code() -> String {
    "unknown_error".into()
}

/// A decoded frame from the host after authentication.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Incoming {
    Result {
        id: u64,
        outcome: Result<Value, HostFailure>,
    },
    Event {
        id: u64,
        event: Value,
    },
    Other {
        kind: String,
    },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    id: Option<u64>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<HostFailure>,
    #[serde(default)]
    event: Option<Value>,
}

/// Decode a text frame. The host may coalesce several messages into a
/// JSON array; each element is decoded independently and malformed
/// elements are skipped.
pub(crate) fn parse_frames(text: &str) -> Vec<Incoming> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to parse host frame");
            return Vec::new();
        }
    };

    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    items.into_iter().filter_map(decode_frame).collect()
}

fn decode_frame(value: Value) -> Option<Incoming> {
    let raw: RawFrame = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping frame without a type");
            return None;
        }
    };

    match (raw.kind.as_str(), raw.id) {
        ("result", Some(id)) => {
            let outcome = if raw.success.unwrap_or(false) {
                Ok(raw.result.unwrap_or(Value::Null))
            } else {
                Err(raw.error.unwrap_or_else(|| HostFailure {
                    code: unknown_code(),
                    message: String::new(),
                }))
            };
            Some(Incoming::Result { id, outcome })
        }
        ("event", Some(id)) => Some(Incoming::Event {
            id,
            event: raw.event.unwrap_or(Value::Null),
        }),
        _ => Some(Incoming::Other { kind: raw.kind }),
    }
}

/// Build a command frame `{id, type, ...payload}`.
///
/// Non-object payloads are ignored; commands without arguments pass
/// `Value::Null`.
pub(crate) fn build_command(id: u64, command: &str, payload: Value) -> Value {
    let mut frame = match payload {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    frame.insert("id".into(), id.into());
    frame.insert("type".into(), command.into());
    Value::Object(frame)
}

// ── Tests ────────────────────────────────────────────────────────────
