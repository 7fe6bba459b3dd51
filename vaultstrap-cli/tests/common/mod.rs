#![allow(dead_code)]

use assert_cmd::Command;
use std::time::Duration;
use tempfile::TempDir;

/// Unreachable inventory server: connections are refused immediately.
pub const DEAD_SERVER: &str = "http://127.0.0.1:9";

pub struct TestContext {
    pub home: TempDir,
}

impl TestContext {
    pub fn new_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_vaultstrap");
        let mut cmd = Command::new(bin_path);
        cmd.timeout(Duration::from_secs(60));
        cmd.env_remove("RUST_LOG")
            .env_remove("VAULTSTRAP_HOME")
            .env_remove("VAULTSTRAP_SERVER_URL")
            .env_remove("AWS_ACCESS_KEY_ID")
            .env_remove("AWS_SECRET_ACCESS_KEY");
        cmd.arg("--home").arg(self.home.path());
        cmd
    }

    /// `create` against the dead server, with keys written under the home dir.
    pub fn create_cmd(&self) -> Command {
        let mut cmd = self.new_cmd();
        cmd.args(["create", "--server-url", DEAD_SERVER, "--admin-client", "admin"])
            .arg("--key-dir")
            .arg(self.home.path().join("keys"));
        cmd
    }
}

pub fn vaultstrap() -> TestContext {
    TestContext {
        home: TempDir::new().expect("Failed to create test home"),
    }
}
