//! Lifecycle tests driving `sh` in place of the relay.
#![cfg(unix)]

use std::{fs, path::Path, time::Duration};

use rstest::{fixture, rstest};
use tempfile::TempDir;

use crate::emitter::StoreAddress;

use super::{TunnelConfig, TunnelError, TunnelProcess};

#[fixture]
fn scratch() -> TempDir {
    tempfile::tempdir().expect("tempdir")
}

fn config_in(dir: &Path, script: &str) -> TunnelConfig {
    let mut config = TunnelConfig::new(
        dir.join("ca.pem"),
        StoreAddress::Tcp {
            host: "store.example".into(),
            port: 6379,
        },
    )
    .with_command(
        "sh",
        [
            "-c".into(),
            script.to_owned(),
            "relay".into(),
            dir.join("received.conf").display().to_string(),
            dir.join("relay.sock").display().to_string(),
        ],
    );
    config.rendezvous = dir.join("relay.sock");
    config.pid_file = dir.join("relay.pid");
    config.ready_timeout = Duration::from_secs(5);
    config
}

#[rstest]
fn ready_once_socket_appears(scratch: TempDir) {
    let config = config_in(scratch.path(), r#"cat > "$1"; : > "$2"; exec sleep 30"#);
    let expected_conf = config.render();
    let mut tunnel = TunnelProcess::start(config).expect("start relay");

    let address = tunnel.wait_ready().expect("relay ready");
    assert_eq!(address, StoreAddress::Unix(scratch.path().join("relay.sock")));
    assert!(tunnel.id().is_some());

    let received = fs::read_to_string(scratch.path().join("received.conf")).expect("config");
    assert_eq!(received, expected_conf);

    let status = tunnel.terminate().expect("terminate").expect("child was running");
    assert!(!status.success());
    assert!(!scratch.path().join("relay.sock").exists());
    assert!(tunnel.id().is_none());
}

#[rstest]
fn early_exit_is_fatal(scratch: TempDir) {
    let config = config_in(scratch.path(), "cat > /dev/null; exit 3");
    let mut tunnel = TunnelProcess::start(config).expect("start relay");
    match tunnel.wait_ready() {
        Err(TunnelError::ExitedEarly(status)) => assert_eq!(status.code(), Some(3)),
        other => panic!("expected ExitedEarly, got {other:?}"),
    }
}

#[rstest]
fn silent_relay_times_out(scratch: TempDir) {
    let mut config = config_in(scratch.path(), "cat > /dev/null; exec sleep 30");
    config.ready_timeout = Duration::from_millis(100);
    let mut tunnel = TunnelProcess::start(config).expect("start relay");
    assert!(matches!(
        tunnel.wait_ready(),
        Err(TunnelError::ReadyTimeout { .. })
    ));
}

#[rstest]
fn missing_program_fails_to_launch(scratch: TempDir) {
    let config = config_in(scratch.path(), "").with_command(
        scratch.path().join("no-such-stunnel"),
        ["-fd", "0"],
    );
    assert!(matches!(
        TunnelProcess::start(config),
        Err(TunnelError::Launch { .. })
    ));
}

#[rstest]
fn drop_kills_child_and_clears_scratch(scratch: TempDir) {
    let config = config_in(scratch.path(), r#"cat > /dev/null; : > "$2"; exec sleep 30"#);
    let mut tunnel = TunnelProcess::start(config).expect("start relay");
    tunnel.wait_ready().expect("ready");
    fs::write(scratch.path().join("relay.pid"), "1").expect("pid file");
    drop(tunnel);
    assert!(!scratch.path().join("relay.sock").exists());
    assert!(!scratch.path().join("relay.pid").exists());
}

#[rstest]
fn stale_socket_is_removed_before_launch(scratch: TempDir) {
    fs::write(scratch.path().join("relay.sock"), "").expect("stale socket");
    let mut config = config_in(scratch.path(), "cat > /dev/null; exec sleep 30");
    config.ready_timeout = Duration::from_millis(100);
    let mut tunnel = TunnelProcess::start(config).expect("start relay");
    assert!(matches!(
        tunnel.wait_ready(),
        Err(TunnelError::ReadyTimeout { .. })
    ));
}
