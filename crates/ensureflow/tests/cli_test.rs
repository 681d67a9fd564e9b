#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn ensure() -> Command {
    let mut cmd = Command::cargo_bin("ensure").unwrap();
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

/// CLIヘルプにサブコマンドが並ぶことを確認
#[test]
fn test_cli_help() {
    ensure()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("差分だけが適用される"))
        .stdout(predicate::str::contains("table"))
        .stdout(predicate::str::contains("bucket"))
        .stdout(predicate::str::contains("queue"))
        .stdout(predicate::str::contains("sg"))
        .stdout(predicate::str::contains("record"))
        .stdout(predicate::str::contains("apply"));
}

#[test]
fn test_cli_version() {
    ensure()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ensureflow"));
}

#[test]
fn test_table_help_shows_preview() {
    ensure()
        .arg("table")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--preview"))
        .stdout(predicate::str::contains("--region"));
}

/// compile はAWSに接続せず望ましい状態を出力する
#[test]
fn test_compile_minimal_table() {
    ensure()
        .args(["compile", "table", "orders", "userid:s:hash"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""TableName": "orders""#))
        .stdout(predicate::str::contains(r#""BillingMode": "PAY_PER_REQUEST""#))
        .stdout(predicate::str::contains(r#""AttributeName": "userid""#));
}

#[test]
fn test_compile_shortcut_implies_provisioned() {
    ensure()
        .args(["compile", "table", "orders", "userid:s:hash", "read=10", "write=10"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""BillingMode": "PROVISIONED""#))
        .stdout(predicate::str::contains(r#""ReadCapacityUnits": 10"#));
}

#[test]
fn test_compile_queue() {
    ensure()
        .args(["compile", "queue", "jobs", "timeout=60"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""QueueName": "jobs""#))
        .stdout(predicate::str::contains(r#""VisibilityTimeout": 60"#));
}

#[test]
fn test_compile_security_group_rules() {
    ensure()
        .args(["compile", "sg", "web", "vpc=main", "tcp:443:0.0.0.0/0", "::sg-0123"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""GroupName": "web""#))
        .stdout(predicate::str::contains(r#""Protocol": "tcp""#))
        .stdout(predicate::str::contains(r#""Source": "sg-0123""#));
}

#[test]
fn test_bad_rule_fails_before_aws() {
    ensure()
        .args(["sg", "web", "tcp:70000:0.0.0.0/0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error [parse]:"));
}

#[test]
fn test_compile_record() {
    ensure()
        .args(["compile", "record", "api.example.com", "ttl=60", "10.0.0.1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""Type": "A""#))
        .stdout(predicate::str::contains(r#""TTL": 60"#))
        .stdout(predicate::str::contains("10.0.0.1"));
}

#[test]
fn test_compile_unknown_kind() {
    ensure()
        .args(["compile", "topic", "news"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown resource kind"));
}

/// 未知のフィールドは AWS に触れる前に path 段階で失敗する
#[test]
fn test_unknown_field_fails_before_aws() {
    ensure()
        .args(["table", "orders", "userid:s:hash", "ProvisionedThroughput.FakeName=10"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error [path]:"))
        .stderr(predicate::str::contains("FakeName"));
}

#[test]
fn test_array_ordering_fails() {
    ensure()
        .args(["table", "orders", "KeySchema.1.AttributeName=userid", "--preview"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error [array-ordering]:"));
}

#[test]
fn test_type_coercion_fails() {
    ensure()
        .args(["queue", "jobs", "timeout=soon"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error [type-coercion]:"));
}

#[test]
fn test_apply_rejects_bad_manifest_entry() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("ensure.yaml");
    fs::write(
        &path,
        "queue:\n  jobs: [\"timeout=60\"]\ntable:\n  orders: [\"userid:s:hash\", \"read=ten\"]\n",
    )
    .unwrap();

    ensure()
        .arg("apply")
        .arg(&path)
        .arg("--preview")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error [type-coercion]:"));
}

#[test]
fn test_apply_missing_manifest_file() {
    let temp_dir = tempfile::tempdir().unwrap();

    ensure()
        .arg("apply")
        .arg(temp_dir.path().join("missing.yaml"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error [config]:"));
}

#[test]
fn test_apply_empty_manifest() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("ensure.yaml");
    fs::write(&path, "table: {}\n").unwrap();

    ensure()
        .arg("apply")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("リソースがありません"));
}

#[test]
fn test_invalid_command() {
    ensure().arg("invalid-command").assert().failure();
}
