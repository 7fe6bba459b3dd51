//! Client identities and node records.
//!
//! - **IdentityIssuer**: creates a client and stores its private key
//! - **NodeRegistrar**: creates the node record, authenticated as that client

mod issuer;
mod registrar;

pub use issuer::IdentityIssuer;
pub use registrar::NodeRegistrar;

use crate::run_list::RunList;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vaultstrap_shared::errors::{ConfigError, IssuanceError, RegistrationError, VaultstrapResult};

/// Freshly issued client key, as returned by the inventory server.
#[derive(Clone)]
pub struct ClientKey {
    pub name: String,
    pub private_key: String,
}

impl std::fmt::Debug for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientKey")
            .field("name", &self.name)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// A client name plus the location of its stored private key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredential {
    name: String,
    key_path: PathBuf,
}

impl ClientCredential {
    pub fn new(name: impl Into<String>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }
}

/// Inventory entry for a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    /// Seed attributes, stored as the node's normal attributes.
    #[serde(default)]
    pub normal_attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub run_list: RunList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

/// Configuration-management server API.
#[async_trait]
pub trait InventoryServer: Send + Sync {
    /// Create a client. Must fail with `AlreadyExists` rather than rotate keys.
    async fn create_client(&self, name: &str) -> Result<ClientKey, IssuanceError>;

    /// Create a node, authenticating as `auth`.
    async fn create_node(
        &self,
        auth: &ClientCredential,
        node: &NodeRecord,
    ) -> Result<(), RegistrationError>;

    /// Names of nodes matching a search query such as `name:web-1`.
    async fn search_nodes(&self, query: &str) -> VaultstrapResult<Vec<String>>;

    async fn delete_node(&self, name: &str) -> VaultstrapResult<()>;

    async fn delete_client(&self, name: &str) -> VaultstrapResult<()>;
}

/// Node and client names share one namespace and one character set.
pub fn validate_node_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::invalid("node name", "must not be empty"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')))
    {
        return Err(ConfigError::invalid(
            "node name",
            format!("'{}' contains invalid character '{}'", name, c),
        ));
    }
    Ok(())
}
