//! Smoke test for the compiled binary's CLI surface (§6's daemon CLI
//! collaborator contract), spawned as a subprocess rather than linked in,
//! since `tools/dmxd` has no library target.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

#[tokio::test]
async fn help_flag_prints_usage_and_exits_promptly() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_dmxd"))
        .arg("--help")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn dmxd");

    let status = timeout(Duration::from_secs(5), child.wait())
        .await
        .expect("dmxd --help did not exit")
        .expect("failed to wait on dmxd");

    assert!(status.success());
}

#[tokio::test]
async fn rejects_out_of_range_debug_level() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_dmxd"))
        .args(["--debug", "9"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn dmxd");

    let status = timeout(Duration::from_secs(5), child.wait())
        .await
        .expect("dmxd did not exit")
        .expect("failed to wait on dmxd");

    assert!(!status.success());
}
