//! Stage 5: Remote convergence.

use crate::bootstrap::{BootstrapDispatcher, BootstrapSpec, RemoteOutput};
use crate::pipeline::types::BootstrapInput;
use vaultstrap_shared::errors::BootstrapError;

pub async fn run(input: BootstrapInput<'_>) -> Result<RemoteOutput, BootstrapError> {
    let dispatcher = BootstrapDispatcher::new(input.executor, input.options.bootstrap.clone());

    let spec = BootstrapSpec {
        target: dispatcher.target_for(input.host),
        node_name: input.node_name.to_string(),
        credential_path: input.credential.key_path().to_path_buf(),
        run_list: input.request.run_list.clone(),
        first_boot_attributes: input.request.first_boot_attributes.clone(),
        secret_items: input.request.secret_items.clone(),
        vault: input.options.vault.clone(),
    };

    dispatcher.dispatch(&spec).await
}
