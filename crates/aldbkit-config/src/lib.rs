//! Shared configuration for aldbkit.
//!
//! TOML profiles, token resolution (env + keyring + plaintext), and
//! translation to `aldbkit_core::ControllerConfig`. The CLI layers its
//! global flags on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use aldbkit_core::{BrokenLinkSource, ControllerConfig, DEFAULT_IDLE_TIMEOUT, DEFAULT_TIMEOUT};

/// Environment variable consulted for the token when a profile names none.
pub const TOKEN_ENV: &str = "ALDBKIT_TOKEN";

const KEYRING_SERVICE: &str = "aldbkit";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no access token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named host profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use when none is given explicitly.
    pub fn active_profile_name(&self) -> &str {
        self.default_profile.as_deref().unwrap_or("default")
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Per-request timeout, e.g. `"30s"`.
    #[serde(default = "default_timeout")]
    pub timeout: String,

    /// Status subscription lifetime, e.g. `"20m"`.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: String,

    #[serde(default)]
    pub broken_links: BrokenLinkSource,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            idle_timeout: default_idle_timeout(),
            broken_links: BrokenLinkSource::default(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> String {
    humantime::format_duration(DEFAULT_TIMEOUT).to_string()
}
fn default_idle_timeout() -> String {
    humantime::format_duration(DEFAULT_IDLE_TIMEOUT).to_string()
}

/// A named host profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Host base URL (`http://homeassistant.local:8123`) or its
    /// WebSocket endpoint (`ws://.../api/websocket`).
    pub host: String,

    /// Access token (plaintext; prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the token.
    pub token_env: Option<String>,

    /// Override request timeout.
    pub timeout: Option<String>,

    /// Override subscription lifetime.
    pub idle_timeout: Option<String>,

    /// Override broken-link source.
    pub broken_links: Option<BrokenLinkSource>,

    /// Initial connection retries; `0` disables retrying.
    pub connect_retries: Option<u32>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "aldbkit", "aldbkit").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("aldbkit");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` merged over defaults, then `ALDBKIT_` environment
/// variables (`ALDBKIT_DEFAULTS__OUTPUT=json`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ALDBKIT_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Value parsing ───────────────────────────────────────────────────

/// Parse a human duration (`"30s"`, `"20m"`, `"1h 30m"`).
pub fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("'{value}': {e}"),
    })
}

/// Turn a host base URL into its WebSocket endpoint.
///
/// `http`/`https` become `ws`/`wss` with `/api/websocket` appended;
/// `ws`/`wss` URLs are taken as-is.
pub fn websocket_url(host: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::Validation {
        field: "host".into(),
        reason,
    };
    let mut url: Url = host
        .trim()
        .parse()
        .map_err(|e| invalid(format!("'{host}': {e}")))?;

    let scheme = match url.scheme() {
        "ws" | "wss" => return Ok(url),
        "http" => "ws",
        "https" => "wss",
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    };
    url.set_scheme(scheme)
        .map_err(|()| invalid(format!("cannot use '{host}' as a WebSocket URL")))?;
    let path = format!("{}/api/websocket", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the access token: env var → system keyring → plaintext.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's token_env, else the global variable
    let env_name = profile.token_env.as_deref().unwrap_or(TOKEN_ENV);
    if let Ok(val) = std::env::var(env_name) {
        if !val.is_empty() {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a token in the system keyring for `profile_name`.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(token)?;
    Ok(())
}

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token"))
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ControllerConfig` from a profile, with profile values
/// overriding `defaults`.
pub fn profile_to_controller_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ControllerConfig, ConfigError> {
    let url = websocket_url(&profile.host)?;
    let token = resolve_token(profile, profile_name)?;

    let mut config = ControllerConfig::new(url, token);
    config.timeout = parse_duration(
        "timeout",
        profile.timeout.as_deref().unwrap_or(&defaults.timeout),
    )?;
    config.idle_timeout = parse_duration(
        "idle_timeout",
        profile
            .idle_timeout
            .as_deref()
            .unwrap_or(&defaults.idle_timeout),
    )?;
    config.broken_links = profile.broken_links.unwrap_or(defaults.broken_links);
    if let Some(retries) = profile.connect_retries {
        config.connect_retries = Some(retries);
    }
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    const SAMPLE: &str = r#"
default_profile = "home"

[defaults]
output = "json"
idle_timeout = "5m"

[profiles.home]
host = "http://homeassistant.local:8123"
token = "plain-token"
token_env = "ALDBKIT_TEST_UNSET_TOKEN"
broken_links = "host"
"#;

    fn sample() -> Config {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        load_config_from(&path).unwrap()
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let cfg = sample();
        assert_eq!(cfg.active_profile_name(), "home");
        assert_eq!(cfg.defaults.output, "json");
        assert_eq!(cfg.defaults.color, "auto");
        assert_eq!(cfg.defaults.timeout, "30s");
        assert!(cfg.profile("home").is_ok());
        assert!(matches!(
            cfg.profile("cabin"),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.defaults.idle_timeout, "20m");
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn profile_translates_to_controller_config() {
        let cfg = sample();
        let profile = cfg.profile("home").unwrap();
        let controller = profile_to_controller_config(profile, "home-test", &cfg.defaults).unwrap();

        assert_eq!(
            controller.url.as_str(),
            "ws://homeassistant.local:8123/api/websocket"
        );
        assert_eq!(controller.idle_timeout, Duration::from_secs(300));
        assert_eq!(controller.timeout, Duration::from_secs(30));
        assert_eq!(controller.broken_links, BrokenLinkSource::Host);
        assert_eq!(controller.token.expose_secret(), "plain-token");
    }

    #[test]
    fn host_urls_become_websocket_endpoints() {
        assert_eq!(
            websocket_url("https://ha.example.com/").unwrap().as_str(),
            "wss://ha.example.com/api/websocket"
        );
        assert_eq!(
            websocket_url("ws://10.0.0.2:8123/api/websocket").unwrap().as_str(),
            "ws://10.0.0.2:8123/api/websocket"
        );
        assert!(websocket_url("ftp://ha.local").is_err());
        assert!(websocket_url("not a url").is_err());
    }

    #[test]
    fn durations_are_human_readable() {
        assert_eq!(parse_duration("t", "20m").unwrap(), Duration::from_secs(1200));
        assert_eq!(parse_duration("t", " 1h 30m ").unwrap(), Duration::from_secs(5400));
        assert!(matches!(
            parse_duration("idle_timeout", "soon"),
            Err(ConfigError::Validation { ref field, .. }) if field == "idle_timeout"
        ));
    }

    #[test]
    fn save_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                host: "http://ha.local:8123".into(),
                connect_retries: Some(0),
                ..Profile::default()
            },
        );
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profile("default").unwrap().connect_retries, Some(0));
    }
}
