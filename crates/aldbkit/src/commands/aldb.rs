//! Link table command handlers.

use tabled::Tabled;

use aldbkit_core::{AldbRecord, Controller, LinkMode, RecordChange, RecordSlot, ScanTarget};

use crate::cli::{AldbArgs, AldbCommand, EditArgs, GlobalOpts};
use crate::config::parse_duration;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Mem")]
    mem: String,
    #[tabled(rename = "In Use")]
    in_use: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Group")]
    group: u8,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Data")]
    data: String,
    #[tabled(rename = "Modified")]
    modified: &'static str,
}

/// `New` for staged records, otherwise the hex slot.
pub(super) fn mem_label(mem_addr: i32) -> String {
    if mem_addr < 0 {
        "New".into()
    } else {
        format!("{mem_addr:04X}")
    }
}

impl From<&AldbRecord> for RecordRow {
    fn from(r: &AldbRecord) -> Self {
        let in_use = if r.highwater {
            "highwater".into()
        } else if r.in_use {
            "yes".into()
        } else {
            "no".into()
        };
        Self {
            mem: mem_label(r.mem_addr),
            in_use,
            mode: r.mode().to_string(),
            group: r.group,
            target: util::display_name(r.target_name.as_deref(), &r.target),
            data: format!("{:02X} {:02X} {:02X}", r.data1, r.data2, r.data3),
            modified: if r.dirty { "*" } else { "" },
        }
    }
}

fn detail(r: &AldbRecord) -> String {
    [
        format!("Mem:      {}", mem_label(r.mem_addr)),
        format!("In use:   {}", r.in_use),
        format!("Mode:     {}", r.mode()),
        format!("Group:    {}", r.group),
        format!(
            "Target:   {}",
            util::display_name(r.target_name.as_deref(), &r.target)
        ),
        format!("Data:     {} {} {}", r.data1, r.data2, r.data3),
        format!("Modified: {}", if r.dirty { "yes" } else { "no" }),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: AldbArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        AldbCommand::Show { device } => {
            let address = util::parse_address("device", &device)?;
            let table = controller.load(&address).await?;
            output::note(
                &format!(
                    "{}: {} records, read {}",
                    util::display_name(controller.resolve_name(&address).as_deref(), &address),
                    table.records().len(),
                    table
                        .loaded_at()
                        .with_timezone(&chrono::Local)
                        .format("%H:%M:%S")
                ),
                global.quiet,
            );
            let out = output::render_list(
                &global.output,
                table.records(),
                |r| RecordRow::from(r),
                |r| mem_label(r.mem_addr),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        AldbCommand::Scan {
            target,
            wait,
            wait_timeout,
        } => {
            let target: ScanTarget = target
                .parse()
                .map_err(|e: aldbkit_core::AddressError| CliError::validation("target", e.to_string()))?;
            let limit = parse_duration("wait-timeout", &wait_timeout)?;

            controller.request_scan(target).await?;
            if !wait {
                output::note(
                    &format!("Scan of {target} requested; results arrive as devices respond."),
                    global.quiet,
                );
                return Ok(());
            }

            util::wait_for_scan(controller, target, limit, global.quiet).await?;

            let summary = controller.summary();
            let out = output::render_single(
                &global.output,
                &summary,
                |s| {
                    format!(
                        "Scan of {target} complete.\nBroken links:    {}\nUnknown devices: {}",
                        s.broken_links.unwrap_or_default(),
                        s.unknown_devices.unwrap_or_default()
                    )
                },
                |s| s.broken_links.unwrap_or_default().to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        AldbCommand::Edit(edit) => handle_edit(controller, edit, global).await,

        AldbCommand::Reset { device } => {
            let address = util::parse_address("device", &device)?;
            let table = controller.reset(&address).await?;
            output::note(
                &format!(
                    "Reset {address}: {} records reloaded from the device",
                    table.records().len()
                ),
                global.quiet,
            );
            Ok(())
        }
    }
}

async fn handle_edit(
    controller: &Controller,
    edit: EditArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let address = util::parse_address("device", &edit.device)?;
    let slot = util::parse_slot(&edit.mem)?;
    let change = RecordChange {
        in_use: edit.in_use,
        mode: edit
            .mode
            .as_deref()
            .map(|m| {
                m.parse::<LinkMode>().map_err(|_| {
                    CliError::validation("mode", format!("expected controller or responder, got '{m}'"))
                })
            })
            .transpose()?,
        group: edit.group,
        target: edit
            .target
            .as_deref()
            .map(|t| util::parse_address("target", t))
            .transpose()?,
        data1: edit.data1,
        data2: edit.data2,
        data3: edit.data3,
    };
    if change.is_empty() {
        return Err(CliError::validation(
            "edit",
            "nothing to change; pass at least one of --target, --group, --mode, --in-use, --data1..3",
        ));
    }

    util::ensure_loaded(controller, &address).await?;
    let record = controller.edit(&address, slot, change)?;
    if !record.dirty {
        output::note("Record already matches; nothing to write.", global.quiet);
        return Ok(());
    }

    let out = output::render_single(&global.output, &record, detail, |r| mem_label(r.mem_addr));
    output::print_output(&out, global.quiet);

    let action = match slot {
        RecordSlot::New => format!("Create this record on {address}?"),
        RecordSlot::At(_) => format!("Write this change to {address}?"),
    };
    if util::confirm(&action, global.yes)? {
        let written = controller.commit(&address).await?;
        output::note(&format!("Wrote {written} record(s) to {address}"), global.quiet);
    } else {
        controller.reset(&address).await?;
        output::note("Discarded.", global.quiet);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_records_show_as_new() {
        assert_eq!(mem_label(-1), "New");
        assert_eq!(mem_label(4095), "0FFF");
    }
}
