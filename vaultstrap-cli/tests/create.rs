use predicates::prelude::*;

mod common;

#[test]
fn test_create_rejects_keys_and_credentials_file() {
    let ctx = common::vaultstrap();
    let creds = ctx.home.path().join("aws.creds");
    std::fs::write(&creds, "AWSAccessKeyId=AKIA\nAWSSecretKey=secret\n").unwrap();

    ctx.create_cmd()
        .args(["--image", "ami-123", "--flavor", "m1.small"])
        .args(["--aws-access-key-id", "AKIA", "--aws-secret-access-key", "secret"])
        .arg("--aws-credential-file")
        .arg(&creds)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not both"));

    // Nothing ran, so nothing was recorded
    ctx.new_cmd()
        .args(["runs", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_create_requires_image_and_flavor() {
    let ctx = common::vaultstrap();

    ctx.create_cmd()
        .args(["--image", "ami-123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--image and --flavor"));
}

#[test]
fn test_hostname_requires_node_name() {
    let ctx = common::vaultstrap();

    ctx.create_cmd()
        .args(["--hostname", "10.0.0.9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--node-name"));
}

#[test]
fn test_invalid_preseed_attributes() {
    let ctx = common::vaultstrap();

    ctx.create_cmd()
        .args(["--hostname", "10.0.0.9", "--node-name", "web-1"])
        .args(["--preseed-attributes", "[1,2]"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSON object"));
}

#[test]
fn test_unreachable_server_fails_identity_stage() {
    let ctx = common::vaultstrap();

    ctx.create_cmd()
        .args(["--hostname", "10.0.0.9", "--node-name", "web-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("FAILED(identity)"));

    ctx.new_cmd()
        .args(["runs", "--node", "web-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("identity"))
        .stdout(predicate::str::contains("failed"));
}
