//! Secret access-control metadata.
//!
//! Only the authorized-selector set of a secret item is touched here; the
//! secret payload and its encryption belong to the secret store.

mod updater;

pub use updater::{GrantOutcome, GrantReport, SecretAccessUpdater};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use vaultstrap_shared::errors::GrantError;

/// Search predicate resolving to the clients allowed to read a secret.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selector(String);

impl Selector {
    /// `name:<node>`
    pub fn node_name(node: &str) -> Self {
        Self(format!("name:{}", node))
    }

    pub fn raw(query: impl Into<String>) -> Self {
        Self(query.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A secret item's access metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecretItem {
    pub vault: String,
    pub name: String,
    #[serde(default)]
    pub selectors: BTreeSet<String>,
    /// Clients currently holding a decryption copy. Maintained by the store.
    #[serde(default)]
    pub clients: BTreeSet<String>,
    /// Optimistic concurrency token. Saving a stale version fails.
    #[serde(default)]
    pub version: u64,
    /// Store-specific fields carried through unchanged.
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SecretItem {
    pub fn new(vault: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            vault: vault.into(),
            name: name.into(),
            selectors: BTreeSet::new(),
            clients: BTreeSet::new(),
            version: 0,
            extra: serde_json::Map::new(),
        }
    }

    /// Set union. Returns `true` if the selector was not present before.
    pub fn add_selector(&mut self, selector: &Selector) -> bool {
        self.selectors.insert(selector.as_str().to_string())
    }

    pub fn is_authorized(&self, selector: &Selector) -> bool {
        self.selectors.contains(selector.as_str())
    }
}

/// Secret store API.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fails with `NotFound` when the item does not exist.
    async fn load(&self, vault: &str, item: &str) -> Result<SecretItem, GrantError>;

    /// Persist `item`. Fails with `VersionConflict` if the stored version is no
    /// longer `item.version`.
    async fn save(&self, item: &SecretItem) -> Result<(), GrantError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_node_name() {
        assert_eq!(Selector::node_name("i-abc").as_str(), "name:i-abc");
    }

    #[test]
    fn test_add_selector_is_union() {
        let mut item = SecretItem::new("vault", "db-password");
        let selector = Selector::node_name("i-abc");

        assert!(item.add_selector(&selector));
        assert!(!item.add_selector(&selector));
        assert_eq!(item.selectors.len(), 1);
        assert!(item.is_authorized(&selector));
    }
}
