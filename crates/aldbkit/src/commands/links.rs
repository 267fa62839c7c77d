//! Broken-link listing and repair.

use std::time::Duration;

use tabled::Tabled;

use aldbkit_core::{BrokenLink, Controller, LinkStatus, PendingRepair, RepairAction, ScanTarget};

use crate::cli::{GlobalOpts, LinksArgs, LinksCommand};
use crate::error::CliError;
use crate::output;

use super::aldb::mem_label;
use super::util;

/// Upper bound for the rescan a repair triggers.
const REPAIR_SCAN_LIMIT: Duration = Duration::from_secs(10 * 60);

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct LinkRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Mem")]
    mem: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Group")]
    group: u8,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Repair")]
    repair: String,
}

fn link_row(link: &BrokenLink, color: bool) -> LinkRow {
    LinkRow {
        device: util::display_name(link.device_name.as_deref(), &link.address),
        mem: mem_label(link.mem_addr),
        mode: link.mode().to_string(),
        group: link.group,
        target: util::display_name(link.target_name.as_deref(), &link.target),
        status: output::status_label(link.status, color),
        repair: describe_options(link),
    }
}

fn describe_options(link: &BrokenLink) -> String {
    aldbkit_core::repair_options(link)
        .iter()
        .map(|action| match action {
            RepairAction::Rescan { target } => format!("rescan {target}"),
            RepairAction::RemoveDevice { address } => format!("remove {address}"),
            other => other.to_string().replace('_', " "),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn pending_detail<T: aldbkit_core::Transport>(pending: &PendingRepair<T>) -> String {
    let r = pending.record();
    format!(
        "Staged on {}: {} group {} -> {} (mem {}, in use: {})",
        pending.address(),
        r.mode(),
        r.group,
        util::display_name(r.target_name.as_deref(), &r.target),
        mem_label(r.mem_addr),
        r.in_use,
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: LinksArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        LinksCommand::List { device, all } => {
            let owner = device
                .as_deref()
                .map(|d| util::parse_address("device", d))
                .transpose()?;

            util::load_for_findings(controller).await?;
            let findings = controller.refresh_findings().await?;
            let links: Vec<BrokenLink> = findings
                .broken_links
                .iter()
                .filter(|l| all || l.status.is_broken())
                .filter(|l| owner.is_none_or(|a| l.address == a))
                .cloned()
                .collect();

            let color = output::should_color(&global.color);
            let out = output::render_list(
                &global.output,
                &links,
                |l| link_row(l, color),
                |l| format!("{} {} {}", l.address, l.mem_addr, l.status),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        LinksCommand::Repair {
            device,
            mem,
            create,
            reload,
            purge,
        } => {
            let address = util::parse_address("device", &device)?;
            let mem_addr = util::parse_mem_addr(&mem)?;

            util::load_for_findings(controller).await?;
            controller.refresh_findings().await?;
            let link = controller.finding(&address, mem_addr)?;

            match link.status {
                LinkStatus::Found => {
                    output::note("Link is healthy; nothing to repair.", global.quiet);
                    Ok(())
                }
                LinkStatus::TargetDbNotLoaded => {
                    reject_flags(&link, &[("--create", create), ("--reload", reload), ("--purge", purge)])?;
                    let target = controller.rescan_target(&link).await?;
                    finish_rescan(controller, &link, target, global).await
                }
                LinkStatus::MissingController | LinkStatus::MissingResponder => {
                    reject_flags(&link, &[("--reload", reload), ("--purge", purge)])?;
                    let pending = if create {
                        controller.stage_reciprocal(&link)?
                    } else {
                        controller.stage_delete(&link)?
                    };
                    settle(pending, global).await
                }
                LinkStatus::MissingTarget => {
                    reject_flags(&link, &[("--create", create)])?;
                    if reload {
                        let target = controller.rescan_owner(&link).await?;
                        return finish_rescan(controller, &link, target, global).await;
                    }
                    let prompt = format!(
                        "Remove {} from the network{}? This cannot be undone",
                        link.target,
                        if purge { " and purge every link to it" } else { "" }
                    );
                    if !util::confirm(&prompt, global.yes)? {
                        output::note("Cancelled.", global.quiet);
                        return Ok(());
                    }
                    controller.remove_target(&link, purge).await?;
                    output::note(&format!("Removed {}", link.target), global.quiet);
                    Ok(())
                }
            }
        }
    }
}

fn reject_flags(link: &BrokenLink, flags: &[(&str, bool)]) -> Result<(), CliError> {
    match flags.iter().find(|(_, set)| *set) {
        Some((flag, _)) => Err(CliError::validation(
            flag,
            format!("does not apply to a {} link", link.status),
        )),
        None => Ok(()),
    }
}

/// Confirm or decline a staged repair. Only a confirm writes to the device.
async fn settle(pending: PendingRepair<aldbkit_core::HostTransport>, global: &GlobalOpts) -> Result<(), CliError> {
    output::note(&pending_detail(&pending), global.quiet);
    let address = pending.address();
    if util::confirm(&format!("Write this change to {address}?"), global.yes)? {
        let written = pending.confirm().await?;
        output::note(&format!("Wrote {written} record(s) to {address}"), global.quiet);
    } else {
        pending.decline().await?;
        output::note("Discarded; the device was not changed.", global.quiet);
    }
    Ok(())
}

async fn finish_rescan(
    controller: &Controller,
    link: &BrokenLink,
    target: ScanTarget,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::wait_for_scan(controller, target, REPAIR_SCAN_LIMIT, global.quiet).await?;
    match controller.finding(&link.address, link.mem_addr) {
        Ok(updated) => output::note(
            &format!("After rescan: {}", updated.status),
            global.quiet,
        ),
        Err(_) => output::note("After rescan: record no longer present", global.quiet),
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use aldbkit_core::{Address, AldbRecord};

    use super::*;

    fn link(status: LinkStatus) -> BrokenLink {
        let record = AldbRecord {
            mem_addr: 4095,
            in_use: true,
            is_controller: true,
            highwater: false,
            group: 1,
            target: Address::new([0x44, 0x55, 0x66]),
            target_name: None,
            data1: 3,
            data2: 28,
            data3: 1,
            dirty: false,
        };
        BrokenLink::new(Address::new([0x1a, 0x2b, 0x3c]), Some("Hall".into()), &record, status)
    }

    #[test]
    fn options_are_described_for_humans() {
        assert_eq!(
            describe_options(&link(LinkStatus::MissingResponder)),
            "delete record, create reciprocal"
        );
        assert_eq!(
            describe_options(&link(LinkStatus::MissingTarget)),
            "remove 44.55.66, rescan 1A.2B.3C"
        );
        assert_eq!(describe_options(&link(LinkStatus::Found)), "");
    }

    #[test]
    fn row_shows_names_and_slot() {
        let row = link_row(&link(LinkStatus::MissingResponder), false);
        assert_eq!(row.device, "Hall (1A.2B.3C)");
        assert_eq!(row.mem, "0FFF");
        assert_eq!(row.status, "missing_responder");
    }

    #[test]
    fn flags_must_fit_the_status() {
        let l = link(LinkStatus::MissingTarget);
        assert!(reject_flags(&l, &[("--create", false)]).is_ok());
        assert!(matches!(
            reject_flags(&l, &[("--create", true)]),
            Err(CliError::Validation { .. })
        ));
    }
}
