// tests/cli_tests.rs
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

const BANNER_LOG: &str = "\
[info 2022/11/03 14:02:11.604 PST <main> tid=0x1] Startup Configuration:
---------------------------------------------------------------------------
Product-Name: Apache Geode
Product-Version: 1.15.1 #build 3 2022-10-01
Running on: cache-host/10.1.2.3, 16 cpu(s), amd64 Linux 5.15.0
System Properties:
    gemfire.enable-cluster-configuration = true
    user.timezone = America/Los_Angeles
Log4J 2 Configuration:
    log4j2.xml
---------------------------------------------------------------------------
[info 2022/11/03 14:02:15.000 PST <main> tid=0x1] Cache server started
[error 2022/11/03 16:45:00.250 PST <ServerConnection on port 40404> tid=0x44] Exception occurred
\tat org.apache.geode.internal.cache.tier.sockets.BaseCommand.execute(BaseCommand.java:183)
";

fn log_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("server.log"), BANNER_LOG).unwrap();
    dir
}

fn logspan() -> Command {
    let mut cmd = Command::cargo_bin("logspan").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_interval_logfmt_output() {
    let dir = log_dir();
    logspan()
        .arg("interval")
        .arg(dir.path())
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::contains("status=success"))
        .stdout(predicate::str::contains("start=2022-11-03T14:02:11.604-08:00"))
        .stdout(predicate::str::contains("finish=2022-11-03T16:45:00.250-08:00"));
}

#[test]
fn test_metadata_jsonl_output() {
    let dir = log_dir();
    logspan()
        .args(["metadata", "--format", "jsonl"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"version\":\"1.15.1\""))
        .stdout(predicate::str::contains("\"os\":\"amd64 Linux 5.15.0\""))
        .stdout(predicate::str::contains("\"user.timezone\":\"America/Los_Angeles\""))
        .stdout(predicate::str::contains("\"zone\":\"-08:00\""))
        .stdout(predicate::str::contains("\"event_count\":3"));
}

#[test]
fn test_failure_sets_exit_code_one() {
    let dir = log_dir();
    fs::write(dir.path().join("broken.log"), "not a log line\n").unwrap();
    logspan()
        .args(["interval", "--no-color"])
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("status=failure"))
        .stdout(predicate::str::contains("Log format not recognized"))
        .stdout(predicate::str::contains("status=success"));
}

#[test]
fn test_parallel_flag_gives_same_output() {
    let dir = log_dir();
    fs::write(dir.path().join("other.log"), BANNER_LOG).unwrap();
    let sequential = logspan()
        .args(["interval", "--no-color"])
        .arg(dir.path())
        .output()
        .unwrap();
    let parallel = logspan()
        .args(["interval", "--no-color", "--parallel"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(sequential.status.success());
    assert_eq!(sequential.stdout, parallel.stdout);
}

#[test]
fn test_window_filters_files() {
    let dir = log_dir();
    logspan()
        .args(["interval", "--no-color", "--from", "2023-01-01", "--to", "2023-02-01"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout("");

    logspan()
        .args(["interval", "--no-color", "--from", "2022-11-01", "--to", "2022-11-30"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("server.log"));
}

#[test]
fn test_events_subcommand() {
    let dir = log_dir();
    logspan()
        .args(["events", "--format", "jsonl", "--stats"])
        .arg(dir.path().join("server.log"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"message\":\"Cache server started\""))
        .stdout(predicate::str::contains("\"level\":\"error\""))
        .stdout(predicate::str::contains("\"stack_trace\":["))
        .stdout(predicate::str::contains("\"events\":3"));
}

#[test]
fn test_custom_layout_from_config_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("app.log"),
        "2024-05-01 10:00:00,000 INFO  [main] app.Main - booting\n\
         2024-05-01 10:05:00,000 WARN  [main] app.Main - slow\n",
    )
    .unwrap();
    let mut config = NamedTempFile::new().unwrap();
    writeln!(
        config,
        "layout: \"TIMESTAMP LEVEL [THREAD] LOGGER - MESSAGE\"\n\
         timestamp_format: \"yyyy-MM-dd HH:mm:ss,SSS\"\n\
         default_zone: \"+05:30\""
    )
    .unwrap();

    logspan()
        .args(["interval", "--no-color", "--config"])
        .arg(config.path())
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("start=2024-05-01T10:00:00+05:30"))
        .stdout(predicate::str::contains("finish=2024-05-01T10:05:00+05:30"));
}

#[test]
fn test_bad_config_exits_with_two() {
    logspan()
        .args(["interval", "--zone", "Atlantis/Lost", "."])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown zone"));

    logspan()
        .args(["interval", "--timestamp-format", "yyyy-QQ", "."])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Illegal pattern character 'Q'"));
}

#[test]
fn test_missing_root_is_one_failure() {
    let dir = TempDir::new().unwrap();
    logspan()
        .args(["interval", "--no-color"])
        .arg(dir.path().join("nowhere"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("status=failure"))
        .stdout(predicate::str::contains("Cannot read"));
}

#[test]
fn test_last_duration_before_earliest_date_exits_with_two() {
    let dir = log_dir();
    logspan()
        .args(["interval", "--last", "300000years"])
        .arg(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("earliest supported date"));

    logspan()
        .args(["interval", "--no-color", "--last", "2h"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout("");
}
