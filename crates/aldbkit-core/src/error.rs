// ── Core error types ──
//
// Domain errors from aldbkit-core. Consumers never see WebSocket frames
// or raw host payloads; the `From<aldbkit_api::Error>` impl translates
// transport-layer errors into domain variants.

use thiserror::Error;

use crate::model::{Address, AddressError};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to host at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Host disconnected")]
    Disconnected,

    #[error("Host request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("No record at memory address {mem_addr} on device {address}")]
    RecordNotFound { address: Address, mem_addr: i32 },

    #[error("Device not found: {address}")]
    DeviceNotFound { address: String },

    #[error("All-Link Database for {address} has not been loaded")]
    TableNotLoaded { address: Address },

    // ── Transport errors (wrapped, not exposed raw) ──────────────────
    #[error("Host error: {message}")]
    Transport {
        message: String,
        /// Host-reported error code (e.g. `"not_found"`), if any.
        code: Option<String>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Whether the failure came from talking to the host rather than
    /// from local validation.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::Disconnected
                | Self::Timeout { .. }
                | Self::Transport { .. }
        )
    }
}

impl From<AddressError> for CoreError {
    fn from(err: AddressError) -> Self {
        Self::Validation {
            message: err.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<aldbkit_api::Error> for CoreError {
    fn from(err: aldbkit_api::Error) -> Self {
        use aldbkit_api::Error as Api;

        match err {
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            Api::Connect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason,
            },
            Api::Closed { .. } => CoreError::Disconnected,
            Api::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Protocol(message) => CoreError::Transport {
                message,
                code: None,
            },
            Api::Command {
                command,
                code,
                message,
            } => CoreError::Transport {
                message: format!("{command}: {message}"),
                code: Some(code),
            },
            Api::Deserialization { message, body: _ } => CoreError::Transport {
                message: format!("Unexpected payload: {message}"),
                code: None,
            },
        }
    }
}
