//! Clap derive structures for the `aldbkit` CLI.
//!
//! Defines the command tree, global flags, and shared types. Kept free of
//! workspace crates so `build.rs` can include it for man pages.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// aldbkit -- inspect and repair Insteon All-Link Databases
#[derive(Debug, Parser)]
#[command(
    name = "aldbkit",
    version,
    about = "Inspect and repair Insteon All-Link Databases",
    long_about = "Reads device link tables through a home-automation host, finds\n\
        one-sided or dangling links, and stages repairs that are only\n\
        written to the device after confirmation.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Host profile to use
    #[arg(long, short = 'p', env = "ALDBKIT_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Host URL, http(s) base or ws(s) endpoint (overrides profile)
    #[arg(long, short = 'H', env = "ALDBKIT_HOST", global = true)]
    pub host: Option<String>,

    /// Long-lived access token
    #[arg(long, env = "ALDBKIT_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ALDBKIT_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Request timeout, e.g. "30s"
    #[arg(long, env = "ALDBKIT_TIMEOUT", global = true)]
    pub timeout: Option<String>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read, scan, edit and reset device link tables
    #[command(alias = "db")]
    Aldb(AldbArgs),

    /// Find and repair broken links
    #[command(alias = "l")]
    Links(LinksArgs),

    /// Known and unknown devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Overview: scan state, broken-link and unknown-device counts
    Status,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ALDB
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct AldbArgs {
    #[command(subcommand)]
    pub command: AldbCommand,
}

#[derive(Debug, Subcommand)]
pub enum AldbCommand {
    /// Print a device's link table
    #[command(alias = "get")]
    Show {
        /// Device address (e.g. 1A.2B.3C)
        device: String,
    },

    /// Ask the network to re-read link tables
    Scan {
        /// Device address, or "all"
        target: String,

        /// Hold the status subscription until the scan completes
        #[arg(long, short = 'w')]
        wait: bool,

        /// Give up waiting after this long
        #[arg(long, default_value = "10m", requires = "wait")]
        wait_timeout: String,
    },

    /// Change one record (or create one with `new`), then write it
    Edit(EditArgs),

    /// Discard pending changes and reload a device's table
    Reset {
        /// Device address
        device: String,
    },
}

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Device address
    pub device: String,

    /// Memory address (decimal or 0x-hex), or "new"
    #[arg(value_name = "MEM")]
    pub mem: String,

    /// Linked device address
    #[arg(long)]
    pub target: Option<String>,

    /// Link group (0-255)
    #[arg(long)]
    pub group: Option<u8>,

    /// Role of this device: controller (c) or responder (r)
    #[arg(long)]
    pub mode: Option<String>,

    /// Whether the record is active
    #[arg(long)]
    pub in_use: Option<bool>,

    #[arg(long)]
    pub data1: Option<u8>,

    #[arg(long)]
    pub data2: Option<u8>,

    #[arg(long)]
    pub data3: Option<u8>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LINKS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LinksArgs {
    #[command(subcommand)]
    pub command: LinksCommand,
}

#[derive(Debug, Subcommand)]
pub enum LinksCommand {
    /// List broken links across all devices
    #[command(alias = "ls")]
    List {
        /// Only links owned by this device
        #[arg(long)]
        device: Option<String>,

        /// Include healthy links
        #[arg(long, short = 'a')]
        all: bool,
    },

    /// Repair one broken link
    Repair {
        /// Device owning the record
        device: String,

        /// Memory address of the record
        #[arg(value_name = "MEM")]
        mem: String,

        /// Create the missing reciprocal instead of deleting the record
        #[arg(long, conflicts_with = "reload")]
        create: bool,

        /// For an unknown peer: reload the owner instead of removing the peer
        #[arg(long)]
        reload: bool,

        /// When removing an unknown peer, purge every link that references it
        #[arg(long)]
        purge: bool,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEVICES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List devices known to the host
    #[command(alias = "ls")]
    List,

    /// List addresses referenced by links but unknown to the host
    Unknown,

    /// Link an unknown device into the network (press its set button)
    Discover {
        /// Device address
        device: String,
    },

    /// Remove a device from the network
    #[command(alias = "rm")]
    Remove {
        /// Device address
        device: String,

        /// Also remove every link on other devices that references it
        #[arg(long)]
        purge: bool,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store an access token in the system keyring
    SetToken {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },

    /// Print the config file path
    Path,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
