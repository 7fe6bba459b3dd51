//! Cloud instance provisioning.
//!
//! [`InstanceProvisioner`] submits a [`ServerDefinition`] to a [`CloudProvider`]
//! and polls until the instance is ready, yielding an [`Instance`] with both id
//! and address populated.

mod definition;
mod provisioner;

pub use definition::{ServerDefinition, ServerDefinitionBuilder};
pub use provisioner::InstanceProvisioner;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vaultstrap_shared::errors::ProvisionError;

/// Provider-assigned instance id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider-reported lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
}

impl InstanceState {
    /// States from which an instance never becomes ready on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstanceState::ShuttingDown
                | InstanceState::Terminated
                | InstanceState::Stopping
                | InstanceState::Stopped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InstanceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InstanceState::Pending),
            "running" => Ok(InstanceState::Running),
            "shutting-down" => Ok(InstanceState::ShuttingDown),
            "terminated" => Ok(InstanceState::Terminated),
            "stopping" => Ok(InstanceState::Stopping),
            "stopped" => Ok(InstanceState::Stopped),
            other => Err(format!("unknown instance state '{}'", other)),
        }
    }
}

/// Raw provider view of an instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDescription {
    pub state: InstanceState,
    /// Assigned asynchronously, usually once the instance is running.
    pub address: Option<String>,
}

/// A ready instance: id and address are always non-empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instance {
    id: InstanceId,
    address: String,
}

impl Instance {
    /// Returns `None` unless both id and address are non-empty.
    pub fn ready(id: InstanceId, address: impl Into<String>) -> Option<Self> {
        let address = address.into();
        if id.as_str().is_empty() || address.is_empty() {
            return None;
        }
        Some(Self { id, address })
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Cloud provider compute API.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Submit a create request. Returns as soon as the provider assigns an id.
    async fn create_instance(
        &self,
        definition: &ServerDefinition,
    ) -> Result<InstanceId, ProvisionError>;

    async fn describe_instance(
        &self,
        id: &InstanceId,
    ) -> Result<InstanceDescription, ProvisionError>;

    /// Used only by explicit cleanup, never by the pipeline itself.
    async fn terminate_instance(&self, id: &InstanceId) -> Result<(), ProvisionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_requires_id_and_address() {
        assert!(Instance::ready(InstanceId::new("i-abc"), "10.0.0.5").is_some());
        assert!(Instance::ready(InstanceId::new(""), "10.0.0.5").is_none());
        assert!(Instance::ready(InstanceId::new("i-abc"), "").is_none());
    }

    #[test]
    fn test_state_parse_and_terminal() {
        for state in [
            InstanceState::Pending,
            InstanceState::Running,
            InstanceState::ShuttingDown,
            InstanceState::Terminated,
            InstanceState::Stopping,
            InstanceState::Stopped,
        ] {
            assert_eq!(state.as_str().parse::<InstanceState>().unwrap(), state);
        }
        assert!(!InstanceState::Pending.is_terminal());
        assert!(!InstanceState::Running.is_terminal());
        assert!(InstanceState::Terminated.is_terminal());
        assert!("rebooting".parse::<InstanceState>().is_err());
    }
}
