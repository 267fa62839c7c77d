use thiserror::Error;

/// Top-level error type for the `aldbkit-api` crate.
///
/// Covers every failure mode of the host channel: authentication,
/// connection, command results, and payload decoding.
/// `aldbkit-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The host rejected the access token.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// WebSocket connection could not be established.
    #[error("WebSocket connection failed: {0}")]
    Connect(String),

    /// The channel closed while a request or subscription was outstanding.
    #[error("Host channel closed (code {code}): {reason}")]
    Closed { code: u16, reason: String },

    /// Request timed out waiting for its result frame.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The host sent something the handshake did not expect.
    #[error("Protocol error: {0}")]
    Protocol(String),

    // ── Commands ────────────────────────────────────────────────────
    /// The host answered a command with `success: false`.
    #[error("Command '{command}' failed ({code}): {message}")]
    Command {
        command: String,
        code: String,
        message: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the host refused our credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connect(_) | Self::Timeout { .. } | Self::Closed { .. }
        )
    }

    /// Returns `true` if the host reported the target as unknown.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Command { code, .. } if code == "not_found")
    }

    /// Extract the host error code, if available.
    pub fn command_error_code(&self) -> Option<&str> {
        match self {
            Self::Command { code, .. } => Some(code),
            _ => None,
        }
    }
}
