use std::path::{Path, PathBuf};

use bootlite::constants::paths::SYSTEM_ROOT;
use bootlite::kernel::status::{self, BootStatus};
use clap::Args;
use comfy_table::{Table, presets};

use crate::cli::OutputFormat;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// System root to inspect
    #[arg(long, default_value = SYSTEM_ROOT)]
    pub root: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

pub fn execute(args: StatusArgs, _global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    if !args.root.is_dir() {
        anyhow::bail!("{} is not a directory", args.root.display());
    }

    let status = status::inspect(&args.root);
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Table => print_table(&status),
    }
    Ok(())
}

fn print_table(status: &BootStatus) {
    println!(
        "VERSION: {}",
        status.version_id.as_deref().unwrap_or("unknown")
    );

    let mut table = Table::new();
    table.load_preset(presets::NOTHING);
    table.set_header(vec!["KIND", "CURRENT", "PREVIOUS"]);
    for slot in &status.slots {
        table.add_row(vec![
            slot.kind.to_string(),
            describe(slot.current.as_deref(), slot.current_resolves),
            describe(slot.previous.as_deref(), slot.previous_resolves),
        ]);
    }
    println!("{table}");
}

fn describe(target: Option<&Path>, resolves: bool) -> String {
    match target {
        None => "-".to_string(),
        Some(path) if resolves => path.display().to_string(),
        Some(path) => format!("{} (missing)", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        assert_eq!(describe(None, false), "-");
        assert_eq!(describe(Some(Path::new("vmlinuz-v2")), true), "vmlinuz-v2");
        assert_eq!(
            describe(Some(Path::new("vmlinuz-v1")), false),
            "vmlinuz-v1 (missing)"
        );
    }
}
