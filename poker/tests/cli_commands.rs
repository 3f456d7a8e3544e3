//! CLI tests for the `poker` binary.

use std::fs;
use std::process::Command;

use poker::exit_codes;
use poker::io::config_store::{DeclaredEntry, write_entries};
use poker::manifest::MANIFEST_FILE_NAME;
use poker::test_support::TestOrigin;

fn poker() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_poker"));
    for var in ["SERVICE_CONFIG_FILE", "SERVICES_DIR", "HOST_SERVICES_DIR", "DRY_RUN"] {
        command.env_remove(var);
    }
    command
}

#[test]
fn env_prints_service_environment() {
    let temp = tempfile::tempdir().expect("tempdir");
    let repo = temp.path().join("services/demo/_repository");
    fs::create_dir_all(&repo).expect("repo");
    fs::write(
        repo.join(MANIFEST_FILE_NAME),
        "configuration:\n  containerName: demo-web\n  directories:\n    data: data\n",
    )
    .expect("manifest");

    let output = poker()
        .args(["env", "demo", "--host-services-dir", "/host/services"])
        .env("SERVICES_DIR", temp.path().join("services"))
        .output()
        .expect("poker env");

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.lines().collect::<Vec<_>>(),
        vec![
            "SERVICE_ID=demo",
            "SERVICE_NAME=demo",
            "CONTAINER_NAME=demo-web",
            "DATA-DIR=/host/services/demo/data",
        ]
    );
}

#[test]
fn pass_without_roots_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = poker()
        .current_dir(temp.path())
        .arg("pass")
        .output()
        .expect("poker pass");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("SERVICES_DIR"));
}

#[test]
fn dry_run_pass_reports_failed_clone() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("custom.yml");
    let missing = temp.path().join("no-such-origin.git");
    write_entries(
        &config,
        &[DeclaredEntry::new("demo", missing.display().to_string())],
    )
    .expect("config");

    let output = poker()
        .arg("pass")
        .env("SERVICE_CONFIG_FILE", &config)
        .env("DRY_RUN", "yes")
        .args(["--services-dir"])
        .arg(temp.path().join("services"))
        .args(["--host-services-dir", "/host/services"])
        .output()
        .expect("poker pass");

    assert_eq!(output.status.code(), Some(exit_codes::SERVICE_FAILED), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("failed=1"), "{stdout}");
    assert!(stdout.contains("service: id=demo status=error:"), "{stdout}");
}

#[test]
fn pass_with_relative_services_root_clones_under_it() {
    let origin = TestOrigin::new("configuration:\n  directories:\n    data: data\n")
        .expect("origin");
    let temp = tempfile::tempdir().expect("tempdir");
    write_entries(
        &temp.path().join("services.yml"),
        &[DeclaredEntry::new("demo", origin.url())],
    )
    .expect("config");

    let output = poker()
        .current_dir(temp.path())
        .args(["pass", "--services-dir", "services", "--host-services-dir", "/host/services"])
        .output()
        .expect("poker pass");

    assert_eq!(output.status.code(), Some(exit_codes::OK), "{output:?}");
    let service_dir = temp.path().join("services/demo");
    assert!(service_dir.join("_repository").join(MANIFEST_FILE_NAME).is_file());
    assert!(service_dir.join("data").is_dir());
    assert!(!service_dir.join("services").exists());
    assert!(String::from_utf8_lossy(&output.stdout).contains("status=running"));
}
