//! Command dispatch: bridges CLI args -> controller calls -> output formatting.

pub mod aldb;
pub mod config_cmd;
pub mod devices;
pub mod links;
pub mod status;
pub mod util;

use aldbkit_core::Controller;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a host-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Aldb(args) => aldb::handle(controller, args, global).await,
        Command::Links(args) => links::handle(controller, args, global).await,
        Command::Devices(args) => devices::handle(controller, args, global).await,
        Command::Status => status::handle(controller, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
