//! Client identity issuance.

use super::{ClientCredential, InventoryServer};
use crate::runtime::constants::filenames;
use crate::util::write_private_file;
use std::path::PathBuf;
use std::sync::Arc;
use vaultstrap_shared::errors::IssuanceError;

/// Creates client identities and stores their keys in a node-scoped file.
pub struct IdentityIssuer {
    inventory: Arc<dyn InventoryServer>,
    credential_dir: PathBuf,
}

impl IdentityIssuer {
    pub fn new(inventory: Arc<dyn InventoryServer>, credential_dir: PathBuf) -> Self {
        Self {
            inventory,
            credential_dir,
        }
    }

    /// Issue a new identity for `name`.
    ///
    /// The key is fsynced to `<credential_dir>/<name>.pem` (mode 0600) before
    /// this returns, so it can immediately be used to authenticate.
    pub async fn issue(&self, name: &str) -> Result<ClientCredential, IssuanceError> {
        tracing::info!(client = %name, "Creating client");
        let key = self.inventory.create_client(name).await?;

        let key_path = filenames::client_key(&self.credential_dir, name);
        write_private_file(&key_path, key.private_key.as_bytes()).map_err(|source| {
            IssuanceError::Storage {
                path: key_path.clone(),
                source,
            }
        })?;

        tracing::debug!(client = %name, key_path = %key_path.display(), "Client key stored");
        Ok(ClientCredential::new(name, key_path))
    }
}
