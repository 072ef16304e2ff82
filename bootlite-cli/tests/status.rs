use bootlite_test_utils::BootFixture;
use predicates::prelude::*;
use rstest::rstest;

mod common;

fn upgraded() -> BootFixture {
    let fx = BootFixture::new();
    fx.install_running("v1");
    fx.provision("v2");
    common::upgrade(&fx).assert().success();
    fx
}

#[test]
fn test_status_table() {
    let fx = upgraded();

    common::bootlite()
        .arg("status")
        .arg("--root")
        .arg(fx.target())
        .assert()
        .success()
        .stdout(predicate::str::contains("VERSION: v1"))
        .stdout(predicate::str::contains("KIND"))
        .stdout(predicate::str::contains("vmlinuz-v2"))
        .stdout(predicate::str::contains("initrd-v1"));
}

#[test]
fn test_status_json() {
    let fx = upgraded();

    let output = common::bootlite()
        .arg("status")
        .arg("--root")
        .arg(fx.target())
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["version_id"], "v1");
    assert_eq!(value["slots"][0]["kind"], "vmlinuz");
    assert_eq!(value["slots"][1]["kind"], "initrd");
    assert_eq!(value["slots"][0]["current_resolves"], true);
}

#[rstest]
#[case("table")]
#[case("json")]
fn test_status_of_empty_root(#[case] format: &str) {
    let fx = BootFixture::new();

    common::bootlite()
        .arg("status")
        .arg("--root")
        .arg(fx.target())
        .args(["--format", format])
        .assert()
        .success();
}

#[test]
fn test_status_missing_root_fails() {
    let fx = BootFixture::new();

    common::bootlite()
        .arg("status")
        .arg("--root")
        .arg(fx.path().join("missing"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a directory"));
}

#[test]
fn test_unknown_format_rejected() {
    common::bootlite()
        .args(["status", "--format", "yaml"])
        .assert()
        .failure();
}
