#![allow(dead_code)]

use assert_cmd::Command;
use std::time::Duration;

use bootlite_test_utils::BootFixture;

const BOOTLITE_ENVS: &[&str] = &[
    "BOOTLITE_UPGRADE_REBOOT",
    "BOOTLITE_UPGRADE_SOURCE",
    "BOOTLITE_UPGRADE_DESTINATION",
    "BOOTLITE_UPGRADE_LOCK_FILE",
];

/// `bootlite` with no inherited bootlite environment.
pub fn bootlite() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_bootlite"));
    cmd.timeout(Duration::from_secs(30));
    for name in BOOTLITE_ENVS {
        cmd.env_remove(name);
    }
    cmd
}

/// `bootlite upgrade` wired to a fixture's source, target and lock file.
pub fn upgrade(fx: &BootFixture) -> Command {
    let mut cmd = bootlite();
    cmd.arg("upgrade")
        .arg("--source")
        .arg(fx.source())
        .arg("--destination")
        .arg(fx.target())
        .arg("--lock-file")
        .arg(fx.lock_file());
    cmd
}
