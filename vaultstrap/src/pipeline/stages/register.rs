//! Stage 3: Node registration.

use crate::identity::{NodeRecord, NodeRegistrar};
use crate::pipeline::types::RegisterInput;
use vaultstrap_shared::errors::RegistrationError;

/// Create the node record as the node's own client.
pub async fn run(input: RegisterInput<'_>) -> Result<NodeRecord, RegistrationError> {
    NodeRegistrar::new(input.inventory)
        .with_environment(input.options.bootstrap.environment.clone())
        .register(
            input.credential.name(),
            input.request.seed_attributes.clone(),
            &input.request.run_list,
            input.credential,
        )
        .await
}
