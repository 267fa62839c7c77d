//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use aldbkit_config::ConfigError;
use aldbkit_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to host at {url}")]
    #[diagnostic(
        code(aldbkit::connection_failed),
        help(
            "Check that the host is running and reachable.\n\
             Try: aldbkit --host http://homeassistant.local:8123 status"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Host connection was lost")]
    #[diagnostic(code(aldbkit::disconnected))]
    Disconnected,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(aldbkit::auth_failed),
        help(
            "Create a long-lived access token in your host profile settings.\n\
             Run: aldbkit config set-token"
        )
    )]
    AuthFailed { message: String },

    #[error("No access token configured for profile '{profile}'")]
    #[diagnostic(
        code(aldbkit::no_credentials),
        help(
            "Configure one with: aldbkit config set-token --profile {profile}\n\
             Or set the ALDBKIT_TOKEN environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Lookups ──────────────────────────────────────────────────────
    #[error("Device '{address}' not found")]
    #[diagnostic(
        code(aldbkit::device_not_found),
        help("Run: aldbkit devices list to see known devices")
    )]
    DeviceNotFound { address: String },

    #[error("{message}")]
    #[diagnostic(
        code(aldbkit::not_found),
        help("Run: aldbkit aldb show {address} to see the device's records")
    )]
    RecordNotFound { address: String, message: String },

    #[error("{message}")]
    #[diagnostic(
        code(aldbkit::not_loaded),
        help("Run: aldbkit aldb scan {address} --wait")
    )]
    TableNotLoaded { address: String, message: String },

    // ── Host ─────────────────────────────────────────────────────────
    #[error("Host error ({code}): {message}")]
    #[diagnostic(code(aldbkit::host_error))]
    Host { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(aldbkit::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(aldbkit::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: aldbkit config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No host configured")]
    #[diagnostic(
        code(aldbkit::no_config),
        help(
            "Create a profile with: aldbkit config init\n\
             Or pass --host and --token.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(aldbkit::config))]
    Config(Box<ConfigError>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Prompt failed: {0}")]
    #[diagnostic(
        code(aldbkit::prompt),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    Prompt(String),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Timed out after {seconds}s")]
    #[diagnostic(
        code(aldbkit::timeout),
        help("Increase the limit with --timeout or --wait-timeout.")
    )]
    Timeout { seconds: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Disconnected => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::DeviceNotFound { .. }
            | Self::RecordNotFound { .. }
            | Self::TableNotLoaded { .. }
            | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoConfig { .. } | Self::Prompt(_) => exit_code::USAGE,
            Self::Host { .. } | Self::Config(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }

    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── CoreError → CliError ─────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::Disconnected => Self::Disconnected,
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Validation { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::RecordNotFound { address, .. } => Self::RecordNotFound {
                address: address.to_string(),
                message,
            },
            CoreError::DeviceNotFound { address } => Self::DeviceNotFound { address },
            CoreError::TableNotLoaded { address } => Self::TableNotLoaded {
                address: address.to_string(),
                message,
            },
            CoreError::Transport { message, code } => Self::Host {
                code: code.unwrap_or_else(|| "unknown".into()),
                message,
            },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

// ── ConfigError → CliError ───────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::UnknownProfile { profile } => Self::ProfileNotFound {
                name: profile,
                available: "(see: aldbkit config profiles)".into(),
            },
            other => Self::Config(Box::new(other)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use aldbkit_core::Address;

    use super::*;

    #[test]
    fn core_errors_keep_their_exit_class() {
        let addr = Address::new([0x1a, 0x2b, 0x3c]);
        let not_loaded = CliError::from(CoreError::TableNotLoaded { address: addr });
        assert_eq!(not_loaded.exit_code(), exit_code::NOT_FOUND);
        assert!(not_loaded.to_string().contains("1A.2B.3C"));

        let timeout = CliError::from(CoreError::Timeout { timeout_secs: 30 });
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let host = CliError::from(CoreError::Transport {
            message: "write failed".into(),
            code: None,
        });
        assert!(matches!(host, CliError::Host { ref code, .. } if code == "unknown"));
    }

    #[test]
    fn missing_token_is_an_auth_failure() {
        let err = CliError::from(ConfigError::NoCredentials {
            profile: "home".into(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
