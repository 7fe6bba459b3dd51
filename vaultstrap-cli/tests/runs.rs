use predicates::prelude::*;

mod common;

#[test]
fn test_runs_empty_home() {
    let ctx = common::vaultstrap();

    ctx.new_cmd()
        .arg("runs")
        .assert()
        .success()
        .stdout(predicate::str::contains("STAGE"));

    assert!(ctx.home.path().join("runs.db").exists());
    assert!(ctx.home.path().join("logs").is_dir());
}

#[test]
fn test_runs_json_for_unknown_node() {
    let ctx = common::vaultstrap();

    ctx.new_cmd()
        .args(["runs", "--node", "nobody", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_log_file_rotated_daily_under_home() {
    let ctx = common::vaultstrap();

    ctx.new_cmd().arg("runs").assert().success();

    let names: Vec<String> = std::fs::read_dir(ctx.home.path().join("logs"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(
        names.iter().any(|n| n.starts_with("vaultstrap.log.")),
        "log files: {:?}",
        names
    );
}
