use predicates::prelude::*;

mod common;

use common::DEAD_SERVER;

fn cleanup_cmd(ctx: &common::TestContext, node: &str) -> assert_cmd::Command {
    let mut cmd = ctx.new_cmd();
    cmd.args(["cleanup", "--server-url", DEAD_SERVER, "--admin-client", "admin"])
        .args(["--node", node])
        .arg("--key-dir")
        .arg(ctx.home.path().join("keys"));
    cmd
}

#[test]
fn test_cleanup_refuses_node_without_failed_run() {
    let ctx = common::vaultstrap();

    cleanup_cmd(&ctx, "web-1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no failed run recorded for node 'web-1'"))
        .stderr(predicate::str::contains("Error removing").not());
}

#[test]
fn test_cleanup_after_failed_run_reaches_server() {
    let ctx = common::vaultstrap();

    ctx.create_cmd()
        .args(["--hostname", "10.0.0.9", "--node-name", "web-1"])
        .assert()
        .failure();

    cleanup_cmd(&ctx, "web-1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no failed run").not())
        .stderr(predicate::str::contains("Error removing"));
}

#[test]
fn test_cleanup_force_skips_run_log() {
    let ctx = common::vaultstrap();

    cleanup_cmd(&ctx, "web-2")
        .arg("--force")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error removing"));
}
