//! Hierarchical error types for node provisioning.
//!
//! Errors are grouped by the pipeline stage that raises them:
//! - [`ConfigError`]: invalid or conflicting options (raised before any side effect)
//! - [`ProvisionError`]: cloud instance creation and readiness
//! - [`IssuanceError`]: client identity creation
//! - [`RegistrationError`]: node record creation
//! - [`GrantError`]: secret access updates (batched, never fatal to siblings)
//! - [`BootstrapError`]: remote convergence
//!
//! ```ignore
//! match orchestrator.run(request).await {
//!     Err(failure) if failure.error.is_config() => { /* user should fix flags */ }
//!     Err(failure) => { /* inspect failure.leaked, reconcile by hand */ }
//!     Ok(report) => { /* report.grants may still hold failures */ }
//! }
//! ```

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result alias used across the workspace.
pub type VaultstrapResult<T> = Result<T, VaultstrapError>;

// ============================================================================
// Top-Level Error
// ============================================================================

#[derive(Debug, Error)]
pub enum VaultstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Issuance(#[from] IssuanceError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Grant(#[from] GrantError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    /// Inventory query or cleanup call failed outside of issuance/registration.
    #[error("inventory: {0}")]
    Inventory(String),

    /// Local persistence (run log, key files) failed.
    #[error("storage: {0}")]
    Storage(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl VaultstrapError {
    pub fn is_config(&self) -> bool {
        matches!(self, VaultstrapError::Config(_))
    }
}

// ============================================================================
// Configuration Errors (user-fixable, no side effects yet)
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Two options were supplied that cannot be used together.
    #[error("{0}")]
    MutuallyExclusive(String),

    #[error("missing required option: {0}")]
    Missing(String),

    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Provisioning Errors (terminal, instance may stay allocated)
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    /// Provider refused the create call (quota, auth, invalid image).
    #[error("cloud provider rejected the server definition: {0}")]
    Rejected(String),

    /// Instance reached a state it will never leave towards `running`.
    #[error("instance {id} entered state '{state}' while waiting for it to become ready")]
    Failed { id: String, state: String },

    /// Wait budget exhausted. The instance is still allocated.
    #[error("instance {id} not ready after {waited:?}")]
    Timeout { id: String, waited: Duration },

    /// A single API call failed (transient while polling).
    #[error("cloud provider API error: {0}")]
    Api(String),
}

impl ProvisionError {
    /// Id of the instance left behind by this failure, if one was created.
    pub fn instance_id(&self) -> Option<&str> {
        match self {
            ProvisionError::Failed { id, .. } | ProvisionError::Timeout { id, .. } => Some(id),
            _ => None,
        }
    }
}

// ============================================================================
// Identity Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum IssuanceError {
    /// A client with this name exists. Keys are never rotated implicitly.
    #[error("client '{0}' already exists")]
    AlreadyExists(String),

    #[error("inventory server refused client creation: {0}")]
    Server(String),

    #[error("failed to store client key at {}: {}", .path.display(), .source)]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("node '{0}' already exists")]
    Conflict(String),

    #[error("not authorized to create node: {0}")]
    Unauthorized(String),

    #[error("client key {} is unreadable: {}", .path.display(), .source)]
    Credential {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("inventory server refused node creation: {0}")]
    Server(String),
}

// ============================================================================
// Secret Access Errors (collected per item)
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrantError {
    #[error("secret item {vault}/{item} not found")]
    NotFound { vault: String, item: String },

    /// The item changed between load and save.
    #[error("secret item {vault}/{item} was modified concurrently")]
    VersionConflict { vault: String, item: String },

    #[error("secret item {vault}/{item} still conflicting after {attempts} attempts")]
    RetriesExhausted {
        vault: String,
        item: String,
        attempts: u32,
    },

    #[error("secret store error: {0}")]
    Store(String),
}

// ============================================================================
// Bootstrap Errors (terminal, host may be partially converged)
// ============================================================================

#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Client key or data bag secret file could not be read.
    #[error("credential file {} is unreadable: {}", .path.display(), .source)]
    Credential {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to render bootstrap template: {0}")]
    Render(String),

    #[error("failed to open remote session to {host}: {reason}")]
    Connect { host: String, reason: String },

    #[error("remote bootstrap exited with status {exit_code}:\n{output}")]
    RemoteFailed { exit_code: i32, output: String },

    /// Local wait gave up. The remote procedure is left running.
    #[error("gave up waiting for bootstrap on {host} after {waited:?}")]
    Timeout { host: String, waited: Duration },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparent_display() {
        let err: VaultstrapError = BootstrapError::RemoteFailed {
            exit_code: 2,
            output: "chef-client failed".into(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.starts_with("remote bootstrap exited with status 2"));
        assert!(msg.contains("chef-client failed"));
    }

    #[test]
    fn test_provision_error_instance_id() {
        let timeout = ProvisionError::Timeout {
            id: "i-abc".into(),
            waited: Duration::from_secs(5),
        };
        assert_eq!(timeout.instance_id(), Some("i-abc"));
        assert_eq!(ProvisionError::Rejected("quota".into()).instance_id(), None);
    }

    #[test]
    fn test_is_config() {
        let err: VaultstrapError = ConfigError::Missing("image".into()).into();
        assert!(err.is_config());
        assert_eq!(err.to_string(), "missing required option: image");
    }
}
