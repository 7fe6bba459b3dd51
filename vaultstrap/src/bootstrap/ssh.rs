//! Remote execution through the system `ssh` client.

use super::{RemoteExecutor, RemoteOutput, RemoteProcedure};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use vaultstrap_shared::SshTarget;
use vaultstrap_shared::errors::BootstrapError;

/// ssh exits 255 when the connection itself failed.
const SSH_CONNECT_FAILURE: i32 = 255;

/// Pipes the procedure into `bash -s` on the target.
#[derive(Clone, Debug)]
pub struct SshExecutor {
    program: PathBuf,
}

impl Default for SshExecutor {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ssh"),
        }
    }
}

impl SshExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific ssh binary.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command-line arguments for `target`, ending with the remote command.
    pub fn build_args(target: &SshTarget, use_sudo: bool) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-o".into(), "BatchMode=yes".into()];

        if let Some(port) = target.port {
            args.push("-p".into());
            args.push(port.to_string().into());
        }
        if let Some(ref identity) = target.identity_file {
            args.push("-i".into());
            args.push(identity.clone().into_os_string());
        }
        if let Some(ref gateway) = target.gateway {
            args.push("-J".into());
            args.push(gateway.into());
        }
        if !target.host_key_verify {
            args.extend(
                [
                    "-o",
                    "StrictHostKeyChecking=no",
                    "-o",
                    "UserKnownHostsFile=/dev/null",
                ]
                .map(OsString::from),
            );
        }

        args.push(format!("{}@{}", target.user, target.host).into());
        args.push(if use_sudo { "sudo bash -s" } else { "bash -s" }.into());
        args
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(
        &self,
        target: &SshTarget,
        procedure: &RemoteProcedure,
    ) -> Result<RemoteOutput, BootstrapError> {
        let connect_err = |reason: String| BootstrapError::Connect {
            host: target.host.clone(),
            reason,
        };

        tracing::debug!(remote = %target.to_uri(), sudo = procedure.use_sudo, "Spawning ssh");

        let mut child = Command::new(&self.program)
            .args(Self::build_args(target, procedure.use_sudo))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| connect_err(format!("failed to spawn {}: {}", self.program.display(), e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(procedure.script.as_bytes())
                .await
                .map_err(|e| connect_err(format!("failed to send procedure: {}", e)))?;
            // Dropping stdin closes it so `bash -s` sees EOF
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| connect_err(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        // Killed by a signal: no exit code
        let Some(exit_code) = output.status.code() else {
            return Err(connect_err(format!("ssh terminated by signal: {}", stderr.trim())));
        };

        if exit_code == SSH_CONNECT_FAILURE && stdout.is_empty() {
            return Err(connect_err(stderr.trim().to_string()));
        }

        Ok(RemoteOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}
