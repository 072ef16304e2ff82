use std::path::PathBuf;

use bootlite::constants::envs;
use bootlite::constants::paths::{SYSTEM_ROOT, UPGRADE_LOCK};
use bootlite::upgrade::{self, UpgradeConfig};
use clap::{Args, CommandFactory};

use crate::cli::{Cli, OutputFormat};

#[derive(Args, Debug)]
pub struct UpgradeArgs {
    /// Reboot the host if the kernel changed
    #[arg(long, env = envs::UPGRADE_REBOOT)]
    pub reboot: bool,

    /// System root holding the new kernel, initrd and sha256sum
    #[arg(long, env = envs::UPGRADE_SOURCE, default_value = SYSTEM_ROOT)]
    pub source: PathBuf,

    /// System root whose boot directory is updated
    #[arg(long, env = envs::UPGRADE_DESTINATION, default_value = SYSTEM_ROOT)]
    pub destination: PathBuf,

    #[arg(long, env = envs::UPGRADE_LOCK_FILE, default_value = UPGRADE_LOCK, hide = true)]
    pub lock_file: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl UpgradeArgs {
    fn config(&self) -> UpgradeConfig {
        UpgradeConfig {
            reboot: self.reboot,
            source: self.source.clone(),
            destination: self.destination.clone(),
            lock_file: self.lock_file.clone(),
        }
    }
}

pub fn execute(args: UpgradeArgs, _global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    if let Err(e) = upgrade::check_distinct(&args.source, &args.destination) {
        let mut cmd = Cli::command();
        if let Some(sub) = cmd.find_subcommand_mut("upgrade") {
            let _ = sub.print_help();
        }
        return Err(e.into());
    }

    let report = upgrade::run(&args.config())?;
    tracing::debug!(?report, "Upgrade finished");

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
        OutputFormat::Table => {
            if report.changed {
                println!("Kernel updated");
            } else {
                println!("Kernel unchanged");
            }
            if !report.rotation_errors.is_empty() {
                println!("Boot links incomplete, reboot skipped:");
                for error in &report.rotation_errors {
                    println!("  {}", error);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> UpgradeArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            crate::cli::Commands::Upgrade(args) => args,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["bootlite", "upgrade", "--source", "/new"]);
        assert!(!args.reboot);
        assert_eq!(args.source, PathBuf::from("/new"));
        assert_eq!(args.destination, PathBuf::from(SYSTEM_ROOT));
        assert_eq!(args.lock_file, PathBuf::from(UPGRADE_LOCK));
    }

    #[test]
    fn test_config_carries_flags() {
        let args = parse(&[
            "bootlite",
            "upgrade",
            "--reboot",
            "--source",
            "/a",
            "--destination",
            "/b",
            "--lock-file",
            "/tmp/l",
        ]);
        let config = args.config();
        assert!(config.reboot);
        assert_eq!(config.destination, PathBuf::from("/b"));
        assert_eq!(config.lock_file, PathBuf::from("/tmp/l"));
    }
}
