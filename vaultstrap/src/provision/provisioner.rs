//! Create-then-poll instance provisioning.

use super::{CloudProvider, Instance, InstanceDescription, InstanceId, InstanceState, ServerDefinition};
use crate::runtime::constants::provision_defaults;
use crate::runtime::options::PollPolicy;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use vaultstrap_shared::errors::ProvisionError;

/// Creates instances and blocks until they are ready.
///
/// Create failures are terminal and never retried here. The instance is
/// left allocated on every failure after the create call succeeded.
pub struct InstanceProvisioner {
    cloud: Arc<dyn CloudProvider>,
    policy: PollPolicy,
    probe_port: Option<u16>,
    probe_timeout: Duration,
}

impl InstanceProvisioner {
    pub fn new(cloud: Arc<dyn CloudProvider>, policy: PollPolicy) -> Self {
        Self {
            cloud,
            policy,
            probe_port: None,
            probe_timeout: provision_defaults::PROBE_TIMEOUT,
        }
    }

    /// Also require a TCP connect to `port` before the instance counts as ready.
    pub fn with_reachability_probe(mut self, port: u16) -> Self {
        self.probe_port = Some(port);
        self
    }

    pub async fn provision(&self, definition: &ServerDefinition) -> Result<Instance, ProvisionError> {
        let id = self.cloud.create_instance(definition).await?;

        tracing::info!(
            instance_id = %id,
            image = %definition.image(),
            flavor = %definition.flavor(),
            "Instance created, waiting for it to become ready"
        );

        self.wait_ready(&id).await
    }

    async fn wait_ready(&self, id: &InstanceId) -> Result<Instance, ProvisionError> {
        let started = Instant::now();
        let mut interval = self.policy.initial_interval;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            match self.cloud.describe_instance(id).await {
                Ok(description) => {
                    if let Some(instance) = self.check_ready(id, description).await? {
                        tracing::info!(
                            instance_id = %id,
                            address = %instance.address(),
                            attempts,
                            elapsed = ?started.elapsed(),
                            "Instance ready"
                        );
                        return Ok(instance);
                    }
                }
                Err(ProvisionError::Api(reason)) => {
                    tracing::warn!(instance_id = %id, %reason, "Describe call failed, will retry");
                }
                Err(e) => return Err(e),
            }

            let elapsed = started.elapsed();
            if elapsed >= self.policy.max_wait {
                return Err(ProvisionError::Timeout {
                    id: id.to_string(),
                    waited: elapsed,
                });
            }

            tokio::time::sleep(interval.min(self.policy.max_wait - elapsed)).await;
            interval = self.policy.next_interval(interval);
        }
    }

    /// Evaluate the ready predicate for one poll result.
    async fn check_ready(
        &self,
        id: &InstanceId,
        description: InstanceDescription,
    ) -> Result<Option<Instance>, ProvisionError> {
        if description.state.is_terminal() {
            return Err(ProvisionError::Failed {
                id: id.to_string(),
                state: description.state.to_string(),
            });
        }

        if description.state != InstanceState::Running {
            tracing::debug!(instance_id = %id, state = %description.state, "Instance not running yet");
            return Ok(None);
        }

        let Some(address) = description.address.filter(|a| !a.is_empty()) else {
            tracing::debug!(instance_id = %id, "Instance running but has no address yet");
            return Ok(None);
        };

        if let Some(port) = self.probe_port
            && !self.is_reachable(&address, port).await
        {
            tracing::debug!(instance_id = %id, %address, port, "Instance not reachable yet");
            return Ok(None);
        }

        Ok(Instance::ready(id.clone(), address))
    }

    async fn is_reachable(&self, address: &str, port: u16) -> bool {
        matches!(
            tokio::time::timeout(self.probe_timeout, TcpStream::connect((address, port))).await,
            Ok(Ok(_))
        )
    }
}
