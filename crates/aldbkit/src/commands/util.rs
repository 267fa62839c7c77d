//! Shared helpers for command handlers.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use aldbkit_core::{Address, BrokenLinkSource, Controller, RecordSlot, ScanTarget};

use crate::error::CliError;

pub fn parse_address(field: &str, input: &str) -> Result<Address, CliError> {
    Address::parse(input).map_err(|e| CliError::validation(field, e.to_string()))
}

pub fn parse_slot(input: &str) -> Result<RecordSlot, CliError> {
    input
        .parse()
        .map_err(|e: aldbkit_core::CoreError| CliError::validation("memory address", e.to_string()))
}

/// A memory address that must name an existing record.
pub fn parse_mem_addr(input: &str) -> Result<i32, CliError> {
    match parse_slot(input)? {
        RecordSlot::At(mem_addr) => Ok(mem_addr),
        RecordSlot::New => Err(CliError::validation(
            "memory address",
            "an existing record is required here",
        )),
    }
}

/// `Kitchen (1A.2B.3C)`, or the bare address when the name is unknown.
pub fn display_name(name: Option<&str>, address: &Address) -> String {
    match name {
        Some(name) => format!("{name} ({address})"),
        None => address.to_string(),
    }
}

/// Load `address` unless it is already in the store.
pub async fn ensure_loaded(controller: &Controller, address: &Address) -> Result<(), CliError> {
    if controller.table(address).is_none() {
        controller.load(address).await?;
    }
    Ok(())
}

/// Load every directory device so local classification sees the whole
/// network. Skipped when the host is the authority for findings.
pub async fn load_for_findings(controller: &Controller) -> Result<(), CliError> {
    if controller.config().broken_links == BrokenLinkSource::Host {
        return Ok(());
    }
    for device in controller.devices().iter() {
        if let Err(e) = ensure_loaded(controller, &device.address).await {
            warn!(address = %device.address, error = %e, "Skipping unreadable device");
        }
    }
    Ok(())
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Prompt(e.to_string()))
}

/// Steady spinner on stderr; hidden under `--quiet`.
pub fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} {elapsed}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_owned());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Block until the outstanding scan pass finishes, at most `limit`.
pub async fn wait_for_scan(
    controller: &Controller,
    target: ScanTarget,
    limit: Duration,
    quiet: bool,
) -> Result<(), CliError> {
    let spinner = spinner(&format!("Scanning {target}..."), quiet);
    let result = controller.wait_for_scan(limit).await;
    spinner.finish_and_clear();
    result?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn slot_and_address_parsing() {
        assert_eq!(parse_mem_addr("0x0fff").unwrap(), 4095);
        assert!(parse_mem_addr("new").is_err());
        assert!(matches!(parse_slot("new").unwrap(), RecordSlot::New));
        assert!(matches!(
            parse_address("device", "nope"),
            Err(CliError::Validation { .. })
        ));
    }

    #[test]
    fn names_fall_back_to_address() {
        let addr = Address::new([0x1a, 0x2b, 0x3c]);
        assert_eq!(display_name(Some("Hall"), &addr), "Hall (1A.2B.3C)");
        assert_eq!(display_name(None, &addr), "1A.2B.3C");
    }
}
