//! Overview handler.

use serde::Serialize;

use aldbkit_core::Controller;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct Overview {
    host: String,
    devices: usize,
    any_loading: bool,
    broken_links: Option<usize>,
    unknown_devices: Option<usize>,
}

fn count(value: Option<usize>) -> String {
    value.map_or_else(|| "(scan in progress)".into(), |n| n.to_string())
}

pub async fn handle(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    // Counts are only meaningful once nothing is loading.
    if !controller.scan_status().any_loading {
        util::load_for_findings(controller).await?;
        controller.refresh_findings().await?;
    }
    let summary = controller.summary();
    let overview = Overview {
        host: controller.config().url.to_string(),
        devices: controller.devices().len(),
        any_loading: summary.any_loading,
        broken_links: summary.broken_links,
        unknown_devices: summary.unknown_devices,
    };

    let out = output::render_single(
        &global.output,
        &overview,
        |o| {
            [
                format!("Host:            {}", o.host),
                format!("Devices:         {}", o.devices),
                format!("Loading:         {}", if o.any_loading { "yes" } else { "no" }),
                format!("Broken links:    {}", count(o.broken_links)),
                format!("Unknown devices: {}", count(o.unknown_devices)),
            ]
            .join("\n")
        },
        |o| count(o.broken_links),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
