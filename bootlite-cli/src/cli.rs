use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::commands::{status::StatusArgs, upgrade::UpgradeArgs};

/// bootlite - kernel upgrades and boot status for bootlite systems
#[derive(Parser, Debug)]
#[command(name = "bootlite", author, version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// Log at debug level
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install a new kernel/initrd pair and rotate the boot links
    Upgrade(UpgradeArgs),

    /// Show where the boot links point
    Status(StatusArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}
