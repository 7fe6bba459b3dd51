//! Type definitions for the orchestration pipeline.

use super::state::{PipelineState, Stage};
use crate::bootstrap::{RemoteExecutor, RemoteOutput};
use crate::identity::{ClientCredential, InventoryServer, NodeRecord, validate_node_name};
use crate::provision::{CloudProvider, Instance, InstanceId, ServerDefinition};
use crate::run_list::RunList;
use crate::runtime::options::VaultstrapOptions;
use crate::vault::{GrantReport, SecretStore};
use std::path::PathBuf;
use std::sync::Arc;
use ulid::Ulid;
use vaultstrap_shared::errors::{ConfigError, VaultstrapError};

type Attributes = serde_json::Map<String, serde_json::Value>;

/// Where the node comes from.
#[derive(Clone, Debug)]
pub enum NodeTarget {
    /// Create a fresh cloud instance; the node is named after its id.
    Provision(ServerDefinition),
    /// Pre-provisioned host. No cloud call is made.
    Existing { host: String, name: String },
}

/// One node to bring up.
#[derive(Clone, Debug)]
pub struct NodeRequest {
    pub target: NodeTarget,
    /// Stored as the node record's normal attributes.
    pub seed_attributes: Attributes,
    pub run_list: RunList,
    /// Written to the host's first-boot file alongside the run-list.
    pub first_boot_attributes: Attributes,
    /// Secret items to authorize the node on, in the configured vault.
    pub secret_items: Vec<String>,
}

impl NodeRequest {
    pub fn provision(definition: ServerDefinition) -> Self {
        Self::with_target(NodeTarget::Provision(definition))
    }

    pub fn existing(host: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_target(NodeTarget::Existing {
            host: host.into(),
            name: name.into(),
        })
    }

    fn with_target(target: NodeTarget) -> Self {
        Self {
            target,
            seed_attributes: Attributes::new(),
            run_list: RunList::new(),
            first_boot_attributes: Attributes::new(),
            secret_items: Vec::new(),
        }
    }

    pub fn with_run_list(mut self, run_list: RunList) -> Self {
        self.run_list = run_list;
        self
    }

    pub fn with_seed_attributes(mut self, attributes: Attributes) -> Self {
        self.seed_attributes = attributes;
        self
    }

    pub fn with_first_boot_attributes(mut self, attributes: Attributes) -> Self {
        self.first_boot_attributes = attributes;
        self
    }

    pub fn with_secret_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secret_items = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_provision(&self) -> bool {
        matches!(self.target, NodeTarget::Provision(_))
    }

    /// Validate the request. Runs before any external call.
    pub fn sanitize(&self) -> Result<(), ConfigError> {
        if let NodeTarget::Existing { ref host, ref name } = self.target {
            if host.trim().is_empty() {
                return Err(ConfigError::Missing("hostname".into()));
            }
            validate_node_name(name)?;
        }
        if let Some(empty) = self.secret_items.iter().position(|i| i.trim().is_empty()) {
            return Err(ConfigError::invalid(
                "secret items",
                format!("item {} has an empty name", empty + 1),
            ));
        }
        Ok(())
    }
}

/// External systems one orchestration talks to.
///
/// Shared between concurrent orchestrations.
#[derive(Clone)]
pub struct Backends {
    /// Only needed for [`NodeTarget::Provision`].
    pub cloud: Option<Arc<dyn CloudProvider>>,
    pub inventory: Arc<dyn InventoryServer>,
    pub secrets: Arc<dyn SecretStore>,
    pub executor: Arc<dyn RemoteExecutor>,
}

impl Backends {
    pub fn new(
        inventory: Arc<dyn InventoryServer>,
        secrets: Arc<dyn SecretStore>,
        executor: Arc<dyn RemoteExecutor>,
    ) -> Self {
        Self {
            cloud: None,
            inventory,
            secrets,
            executor,
        }
    }

    pub fn with_cloud(mut self, cloud: Arc<dyn CloudProvider>) -> Self {
        self.cloud = Some(cloud);
        self
    }
}

/// A resource created by an orchestration that outlives its failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeakedResource {
    Instance(InstanceId),
    Identity { name: String, key_path: PathBuf },
    Node(String),
}

impl std::fmt::Display for LeakedResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeakedResource::Instance(id) => write!(f, "instance {}", id),
            LeakedResource::Identity { name, key_path } => {
                write!(f, "client {} (key {})", name, key_path.display())
            }
            LeakedResource::Node(name) => write!(f, "node {}", name),
        }
    }
}

/// A successful orchestration.
#[derive(Debug)]
pub struct PipelineReport {
    pub run_id: Ulid,
    pub node_name: String,
    /// Absent for existing hosts.
    pub instance: Option<Instance>,
    pub credential: ClientCredential,
    pub node: NodeRecord,
    /// Empty when no secret items were requested.
    pub grants: GrantReport,
    pub bootstrap: RemoteOutput,
    pub state: PipelineState,
}

impl PipelineReport {
    /// Grant failures, rendered for display.
    pub fn warnings(&self) -> Vec<String> {
        self.grants
            .failures()
            .into_iter()
            .map(|(item, e)| format!("secret item '{}' not granted: {}", item, e))
            .collect()
    }
}

/// An aborted orchestration.
#[derive(Debug, thiserror::Error)]
#[error("FAILED({stage}): {error}")]
pub struct PipelineFailure {
    pub run_id: Ulid,
    pub stage: Stage,
    #[source]
    pub error: VaultstrapError,
    /// Everything created before the failure, oldest first. Never rolled back.
    pub leaked: Vec<LeakedResource>,
}

// ============================================================================
// Stage inputs
// ============================================================================

pub struct ProvisionInput<'a> {
    pub options: &'a VaultstrapOptions,
    pub cloud: Arc<dyn CloudProvider>,
    pub definition: &'a ServerDefinition,
}

pub struct IdentityInput<'a> {
    pub options: &'a VaultstrapOptions,
    pub inventory: Arc<dyn InventoryServer>,
    pub name: &'a str,
}

pub struct RegisterInput<'a> {
    pub options: &'a VaultstrapOptions,
    pub inventory: Arc<dyn InventoryServer>,
    pub credential: &'a ClientCredential,
    pub request: &'a NodeRequest,
}

pub struct SecretsInput<'a> {
    pub options: &'a VaultstrapOptions,
    pub inventory: Arc<dyn InventoryServer>,
    pub secrets: Arc<dyn SecretStore>,
    pub node_name: &'a str,
    pub items: &'a [String],
}

pub struct BootstrapInput<'a> {
    pub options: &'a VaultstrapOptions,
    pub executor: Arc<dyn RemoteExecutor>,
    pub host: &'a str,
    pub node_name: &'a str,
    pub credential: &'a ClientCredential,
    pub request: &'a NodeRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_request_validation() {
        assert!(NodeRequest::existing("10.0.0.9", "web-1").sanitize().is_ok());
        assert_eq!(
            NodeRequest::existing("", "web-1").sanitize().unwrap_err(),
            ConfigError::Missing("hostname".into())
        );
        assert!(NodeRequest::existing("10.0.0.9", "web 1").sanitize().is_err());
        assert!(
            NodeRequest::existing("10.0.0.9", "web-1")
                .with_secret_items(["db-password", " "])
                .sanitize()
                .is_err()
        );
    }

    #[test]
    fn test_failure_display_is_stage_tagged() {
        let failure = PipelineFailure {
            run_id: Ulid::new(),
            stage: Stage::Bootstrap,
            error: VaultstrapError::Internal("boom".into()),
            leaked: vec![LeakedResource::Node("i-abc".into())],
        };
        assert!(failure.to_string().starts_with("FAILED(bootstrap): "));
    }
}
