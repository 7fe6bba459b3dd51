//! Node registration.

use super::{ClientCredential, InventoryServer, NodeRecord};
use crate::run_list::RunList;
use std::sync::Arc;
use vaultstrap_shared::errors::RegistrationError;

/// Creates node records as the node's own client, so the record's access
/// rules match those of any peer node rather than an administrator's.
pub struct NodeRegistrar {
    inventory: Arc<dyn InventoryServer>,
    environment: Option<String>,
}

impl NodeRegistrar {
    pub fn new(inventory: Arc<dyn InventoryServer>) -> Self {
        Self {
            inventory,
            environment: None,
        }
    }

    pub fn with_environment(mut self, environment: Option<String>) -> Self {
        self.environment = environment;
        self
    }

    pub async fn register(
        &self,
        name: &str,
        seed_attributes: serde_json::Map<String, serde_json::Value>,
        run_list: &RunList,
        credential: &ClientCredential,
    ) -> Result<NodeRecord, RegistrationError> {
        // Key must be on disk before the inventory call authenticates with it
        std::fs::metadata(credential.key_path()).map_err(|source| {
            RegistrationError::Credential {
                path: credential.key_path().to_path_buf(),
                source,
            }
        })?;

        let node = NodeRecord {
            name: name.to_string(),
            normal_attributes: seed_attributes,
            run_list: run_list.clone(),
            environment: self.environment.clone(),
        };

        tracing::info!(node = %name, client = %credential.name(), "Creating node");
        self.inventory.create_node(credential, &node).await?;

        Ok(node)
    }
}
