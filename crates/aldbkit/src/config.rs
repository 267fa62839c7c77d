//! CLI configuration: thin wrapper around `aldbkit_config`.
//!
//! Adds the resolution step that lets global flags (`--host`, `--token`,
//! `--timeout`) override whatever the active profile says.

use secrecy::SecretString;

use aldbkit_core::ControllerConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use aldbkit_config::{
    Config, Profile, config_path, load_config_or_default, parse_duration, save_config,
    store_token,
};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| config.active_profile_name().to_owned())
}

/// Comma-separated profile names, for help text.
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}

/// Build a `ControllerConfig` from the config file, profile and flags.
pub fn build_controller_config(global: &GlobalOpts) -> Result<ControllerConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        return resolve_profile(profile, &profile_name, &cfg, global);
    }

    // An explicitly requested profile must exist.
    if global.profile.is_some() {
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available_profiles(&cfg),
        });
    }

    // No profile: flags / env vars alone.
    let host = global.host.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let profile = Profile {
        host: host.to_owned(),
        ..Profile::default()
    };
    resolve_profile(&profile, &profile_name, &cfg, global)
}

/// Translate a `Profile` plus global flags into a `ControllerConfig`.
///
/// Flag overrides take priority over profile values.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<ControllerConfig, CliError> {
    let mut profile = profile.clone();
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(ref timeout) = global.timeout {
        profile.timeout = Some(timeout.clone());
    }

    if let Some(ref token) = global.token {
        profile.token = Some(token.clone());
    }

    let mut config =
        aldbkit_config::profile_to_controller_config(&profile, profile_name, &cfg.defaults)?;
    // An explicit `--token` beats the env/keyring lookup order.
    if let Some(ref token) = global.token {
        config.token = SecretString::from(token.clone());
    }
    Ok(config)
}
