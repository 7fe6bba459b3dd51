//! Bootstrap dispatch.

use super::template::{self, DEFAULT_TEMPLATE};
use super::{BootstrapSpec, RemoteExecutor, RemoteOutput, RemoteProcedure};
use crate::runtime::options::BootstrapOptions;
use std::sync::Arc;
use std::time::Instant;
use vaultstrap_shared::SshTarget;
use vaultstrap_shared::errors::BootstrapError;

/// Renders and runs the convergence procedure on a target host.
///
/// Runs once. A failed remote procedure is reported, never retried.
pub struct BootstrapDispatcher {
    executor: Arc<dyn RemoteExecutor>,
    options: BootstrapOptions,
}

impl BootstrapDispatcher {
    pub fn new(executor: Arc<dyn RemoteExecutor>, options: BootstrapOptions) -> Self {
        Self { executor, options }
    }

    pub fn options(&self) -> &BootstrapOptions {
        &self.options
    }

    /// Session target for `host` carrying the configured ssh settings.
    pub fn target_for(&self, host: &str) -> SshTarget {
        SshTarget {
            host: host.to_string(),
            user: self.options.ssh_user.clone(),
            port: self.options.ssh_port,
            identity_file: self.options.identity_file.clone(),
            gateway: self.options.ssh_gateway.clone(),
            host_key_verify: self.options.host_key_verify,
        }
    }

    /// Render the procedure without running it.
    pub fn render(&self, spec: &BootstrapSpec) -> Result<RemoteProcedure, BootstrapError> {
        let client_key = std::fs::read_to_string(&spec.credential_path).map_err(|source| {
            BootstrapError::Credential {
                path: spec.credential_path.clone(),
                source,
            }
        })?;

        let source = match self.options.template_file {
            Some(ref path) => std::fs::read_to_string(path).map_err(|e| {
                BootstrapError::Render(format!("failed to read {}: {}", path.display(), e))
            })?,
            None => DEFAULT_TEMPLATE.to_string(),
        };

        let secret = self.data_bag_secret()?;
        let vars = template::variables(spec, &self.options, &client_key, secret.as_deref())?;
        let script = template::render(&source, vars)?;

        Ok(RemoteProcedure {
            script,
            use_sudo: self.options.effective_sudo(),
        })
    }

    /// Inline secret, or the contents of the secret file.
    fn data_bag_secret(&self) -> Result<Option<String>, BootstrapError> {
        if let Some(ref secret) = self.options.secret {
            return Ok(Some(secret.expose().to_string()));
        }
        match self.options.secret_file {
            Some(ref path) => std::fs::read_to_string(path)
                .map(Some)
                .map_err(|source| BootstrapError::Credential {
                    path: path.clone(),
                    source,
                }),
            None => Ok(None),
        }
    }

    pub async fn dispatch(&self, spec: &BootstrapSpec) -> Result<RemoteOutput, BootstrapError> {
        let procedure = self.render(spec)?;

        tracing::info!(
            node = %spec.node_name,
            remote = %spec.target.to_uri(),
            sudo = procedure.use_sudo,
            "Bootstrapping node"
        );

        let started = Instant::now();
        let run = self.executor.run(&spec.target, &procedure);
        let output = match self.options.timeout {
            // Only the local wait is abandoned; the remote procedure keeps running
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                BootstrapError::Timeout {
                    host: spec.target.host.clone(),
                    waited: started.elapsed(),
                }
            })??,
            None => run.await?,
        };

        if !output.success() {
            tracing::error!(
                node = %spec.node_name,
                exit_code = output.exit_code,
                "Remote bootstrap failed"
            );
            return Err(BootstrapError::RemoteFailed {
                exit_code: output.exit_code,
                output: output.combined(),
            });
        }

        tracing::info!(node = %spec.node_name, elapsed = ?started.elapsed(), "Node bootstrapped");
        Ok(output)
    }
}
