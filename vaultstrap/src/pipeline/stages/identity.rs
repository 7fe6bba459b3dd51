//! Stage 2: Client identity.

use crate::identity::{ClientCredential, IdentityIssuer};
use crate::pipeline::types::IdentityInput;
use vaultstrap_shared::errors::IssuanceError;

pub async fn run(input: IdentityInput<'_>) -> Result<ClientCredential, IssuanceError> {
    IdentityIssuer::new(input.inventory, input.options.credential_dir.clone())
        .issue(input.name)
        .await
}
