//! CLI 端到端测试

use assert_cmd::Command;
use predicates::prelude::*;
use std::net::TcpListener;

fn cli() -> Command {
    Command::cargo_bin("urg-cli").unwrap()
}

#[test]
fn test_config_init_and_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    cli()
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    // 已存在时拒绝覆盖
    cli()
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .failure();

    cli()
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[connection]"))
        .stdout(predicate::str::contains("port = 10940"))
        .stdout(predicate::str::contains("[detection]"));
}

#[test]
fn test_identify_unreachable_sensor_fails() {
    let dir = tempfile::tempdir().unwrap();
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    cli()
        .args(["identify", "--address", "127.0.0.1", "--port"])
        .arg(port.to_string())
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .assert()
        .failure();
}

#[test]
fn test_monitor_rejects_infinite_durations() {
    let dir = tempfile::tempdir().unwrap();
    for flag in ["--baseline-delay", "--recapture-every", "--duration"] {
        cli()
            .args(["monitor", flag, "inf", "--config"])
            .arg(dir.path().join("absent.toml"))
            .assert()
            .failure()
            .stderr(predicate::str::contains(&flag[2..]))
            .stderr(predicate::str::contains("panicked").not());
    }
}

#[test]
fn test_help_lists_commands() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("monitor"))
        .stdout(predicate::str::contains("identify"));
}
