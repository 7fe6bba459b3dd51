//! Remote convergence.
//!
//! The dispatcher renders a shell procedure that installs the agent, drops
//! the pre-issued client key and first-boot attributes onto the host, then
//! runs the agent once. How the procedure reaches the host is up to the
//! [`RemoteExecutor`]; [`SshExecutor`] shells out to the system `ssh`.

mod dispatcher;
mod ssh;
pub mod template;

pub use dispatcher::BootstrapDispatcher;
pub use ssh::SshExecutor;

use crate::run_list::RunList;
use async_trait::async_trait;
use std::path::PathBuf;
use vaultstrap_shared::SshTarget;
use vaultstrap_shared::errors::BootstrapError;

/// Everything needed to converge one node.
#[derive(Clone, Debug)]
pub struct BootstrapSpec {
    pub target: SshTarget,
    pub node_name: String,
    /// Local path of the node's stored client key.
    pub credential_path: PathBuf,
    pub run_list: RunList,
    pub first_boot_attributes: serde_json::Map<String, serde_json::Value>,
    /// Listed in the procedure for reference; access was granted earlier.
    pub secret_items: Vec<String>,
    pub vault: String,
}

/// A rendered script and how to run it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteProcedure {
    pub script: String,
    pub use_sudo: bool,
}

/// Outcome of a remote procedure that ran to completion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RemoteOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Remote-execution channel.
///
/// Implementations report a non-zero exit through [`RemoteOutput::exit_code`];
/// `Err` is reserved for failing to reach or run on the host at all.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn run(
        &self,
        target: &SshTarget,
        procedure: &RemoteProcedure,
    ) -> Result<RemoteOutput, BootstrapError>;
}
