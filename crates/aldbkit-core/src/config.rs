// ── Runtime connection configuration ──
//
// Describes *how* to reach the host and how the core behaves once
// connected. Carries credentials and tuning but never touches disk; the
// CLI builds a `ControllerConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;

/// How long a status subscription may sit without a notification before
/// it is released.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(20 * 60);

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where broken-link findings come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum BrokenLinkSource {
    /// Classify locally from loaded tables.
    #[default]
    Local,
    /// Ask the host, and treat its answer as authoritative.
    Host,
}

/// Configuration for one host connection.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Host WebSocket URL (e.g. `ws://homeassistant.local:8123/api/websocket`).
    pub url: Url,
    /// Long-lived access token.
    pub token: SecretString,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Lifetime of a status subscription, counted from acquisition.
    pub idle_timeout: Duration,
    pub broken_links: BrokenLinkSource,
    /// Retries for the initial connection. `None` retries forever.
    pub connect_retries: Option<u32>,
}

impl ControllerConfig {
    pub fn new(url: Url, token: SecretString) -> Self {
        Self {
            url,
            token,
            timeout: DEFAULT_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            broken_links: BrokenLinkSource::default(),
            connect_retries: Some(3),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ControllerConfig::new(
            "ws://localhost:8123/api/websocket".parse().unwrap(),
            SecretString::from("t".to_owned()),
        );
        assert_eq!(cfg.idle_timeout, Duration::from_secs(1200));
        assert_eq!(cfg.broken_links, BrokenLinkSource::Local);
        assert_eq!("HOST".parse::<BrokenLinkSource>().unwrap(), BrokenLinkSource::Host);
    }
}
