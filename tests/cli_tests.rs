//! Binary-level tests for the pomosync CLI.
//!
//! - TC-B-001: Help and version output
//! - TC-B-002: Argument validation
//! - TC-B-003: Shell completions
//! - TC-B-004: Missing daemon
//! - TC-B-005: Commands against a running daemon

use std::path::PathBuf;
use std::process::{Child, Command as StdCommand, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::Command;
use predicates::prelude::*;

fn pomosync() -> Command {
    Command::cargo_bin("pomosync").unwrap()
}

fn create_temp_socket_path(name: &str) -> PathBuf {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    // Keep the directory so it's not deleted
    std::mem::forget(dir);
    path
}

/// Kills the daemon process when dropped.
struct DaemonGuard(Child);

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn spawn_daemon(socket: &PathBuf) -> DaemonGuard {
    let child = StdCommand::new(assert_cmd::cargo::cargo_bin("pomosync"))
        .arg("daemon")
        .arg("--socket")
        .arg(socket)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while !socket.exists() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(socket.exists(), "daemon did not bind its socket");
    DaemonGuard(child)
}

// ============================================================================
// TC-B-001: Help and Version
// ============================================================================

/// TC-B-001: ヘルプとバージョンの表示
#[test]
fn tc_b_001_help_and_version() {
    pomosync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("configure"))
        .stdout(predicate::str::contains("reset-cycle"));

    pomosync()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

// ============================================================================
// TC-B-002: Argument Validation
// ============================================================================

/// TC-B-002: 範囲外の時間指定は拒否される
#[test]
fn tc_b_002_out_of_range_durations_are_rejected() {
    pomosync()
        .args(["configure", "--focus", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--focus"));

    pomosync()
        .args(["configure", "--long-break", "61"])
        .assert()
        .failure();

    pomosync()
        .args(["select", "nap"])
        .assert()
        .failure();
}

/// TC-B-002b: 何も指定しない configure はエラーになる
#[test]
fn tc_b_002b_configure_requires_a_value() {
    pomosync()
        .args(["configure", "--socket", "/tmp/pomosync_unused.sock"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("エラー"));
}

// ============================================================================
// TC-B-003: Completions
// ============================================================================

/// TC-B-003: シェル補完スクリプトの生成
#[test]
fn tc_b_003_completions() {
    pomosync()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pomosync"));
}

// ============================================================================
// TC-B-004: Missing Daemon
// ============================================================================

/// TC-B-004: Daemon未起動時はエラー終了する
#[test]
fn tc_b_004_missing_daemon() {
    let socket = create_temp_socket_path("missing.sock");
    pomosync()
        .arg("status")
        .arg("--socket")
        .arg(&socket)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Daemonに接続できません"));
}

// ============================================================================
// TC-B-005: Running Daemon
// ============================================================================

/// TC-B-005: 起動中のDaemonに対するコマンド
#[test]
fn tc_b_005_commands_against_daemon() {
    let socket = create_temp_socket_path("primary.sock");
    let _daemon = spawn_daemon(&socket);

    pomosync()
        .arg("--socket")
        .arg(&socket)
        .arg("start")
        .assert()
        .success()
        .stdout(predicate::str::contains("タイマーを開始しました"));

    pomosync()
        .arg("--socket")
        .arg(&socket)
        .args(["select", "long-break"])
        .assert()
        .success()
        .stdout(predicate::str::contains("長い休憩 15:00"));

    pomosync()
        .arg("--socket")
        .arg(&socket)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("primary"))
        .stdout(predicate::str::contains("サイクル: ○○○○ 0/4"));

    pomosync()
        .arg("--socket")
        .arg(&socket)
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("同期先が設定されていません"));
}
