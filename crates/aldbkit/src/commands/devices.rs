//! Device directory command handlers.

use tabled::Tabled;

use aldbkit_core::{Address, Controller, Device};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Records")]
    records: String,
    #[tabled(rename = "Modified")]
    modified: &'static str,
}

#[derive(Tabled)]
struct UnknownRow {
    #[tabled(rename = "Address")]
    address: String,
}

pub async fn handle(
    controller: &Controller,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List => {
            let devices: Vec<Device> = controller.devices().iter().map(|d| (**d).clone()).collect();
            let out = output::render_list(
                &global.output,
                &devices,
                |d| {
                    // Only tables read during this invocation are known.
                    let table = controller.table(&d.address);
                    DeviceRow {
                        address: d.address.to_string(),
                        name: d.name.clone().unwrap_or_default(),
                        records: table
                            .as_ref()
                            .map_or_else(|| "-".into(), |t| t.records().len().to_string()),
                        modified: if table.is_some_and(|t| t.is_dirty()) { "*" } else { "" },
                    }
                },
                |d| d.address.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Unknown => {
            util::load_for_findings(controller).await?;
            let findings = controller.refresh_findings().await?;
            let unknown: Vec<Address> = findings.unknown_devices.clone();
            let out = output::render_list(
                &global.output,
                &unknown,
                |a| UnknownRow {
                    address: a.to_string(),
                },
                Address::to_string,
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Discover { device } => {
            let address = util::parse_address("device", &device)?;
            let spinner = util::spinner(&format!("Linking {address}..."), global.quiet);
            let joined = controller.discover_device(&address).await;
            spinner.finish_and_clear();
            if joined? {
                output::note(&format!("Added {address}"), global.quiet);
            } else {
                output::note(&format!("{address} did not respond"), global.quiet);
            }
            Ok(())
        }

        DevicesCommand::Remove { device, purge } => {
            let address = util::parse_address("device", &device)?;
            let name = util::display_name(controller.resolve_name(&address).as_deref(), &address);
            let prompt = if purge {
                format!("Remove {name} and every link that references it? This cannot be undone")
            } else {
                format!("Remove {name} from the network? This cannot be undone")
            };
            if !util::confirm(&prompt, global.yes)? {
                output::note("Cancelled.", global.quiet);
                return Ok(());
            }
            controller.remove_device(&address, purge).await?;
            output::note(&format!("Removed {name}"), global.quiet);
            Ok(())
        }
    }
}
