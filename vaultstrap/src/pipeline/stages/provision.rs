//! Stage 1: Instance provisioning.

use crate::pipeline::types::ProvisionInput;
use crate::provision::{Instance, InstanceProvisioner};
use vaultstrap_shared::errors::ProvisionError;

/// Create an instance and wait until it is reachable.
pub async fn run(input: ProvisionInput<'_>) -> Result<Instance, ProvisionError> {
    let mut provisioner = InstanceProvisioner::new(input.cloud, input.options.provision.clone());
    if let Some(port) = input.options.ssh_probe_port {
        provisioner = provisioner.with_reachability_probe(port);
    }

    provisioner.provision(input.definition).await
}
