//! Vaultstrap - provision, register, grant and bootstrap a managed node.
//!
//! One [`Orchestrator`] run takes a single node from nothing (or from an
//! existing host) to a converged, identity-bearing member of the inventory:
//!
//! ```text
//! Provision ──→ Identity ──→ Register ──→ (settle) ──→ Secrets ──→ Bootstrap
//! ```
//!
//! Every external system sits behind a trait ([`CloudProvider`],
//! [`InventoryServer`], [`SecretStore`], [`RemoteExecutor`]) so the pipeline
//! can be driven against real services or in-memory fakes.

pub mod bootstrap;
pub mod identity;
pub mod pipeline;
pub mod provision;
#[cfg(feature = "rest")]
pub mod rest;
pub mod run_list;
pub mod runlog;
pub mod runtime;
pub mod util;
pub mod vault;

pub use bootstrap::{
    BootstrapDispatcher, BootstrapSpec, RemoteExecutor, RemoteOutput, RemoteProcedure, SshExecutor,
};
pub use identity::{
    ClientCredential, ClientKey, IdentityIssuer, InventoryServer, NodeRecord, NodeRegistrar,
};
pub use pipeline::{
    Backends, LeakedResource, NodeRequest, NodeTarget, Orchestrator, PipelineFailure,
    PipelineReport, PipelineState, Stage,
};
pub use provision::{
    CloudProvider, Instance, InstanceDescription, InstanceId, InstanceProvisioner, InstanceState,
    ServerDefinition,
};
pub use run_list::RunList;
pub use runlog::{RunLog, RunOutcome, RunRecord};
pub use runtime::options::{
    BootstrapOptions, CloudCredentials, CloudOptions, DataBagSecret, VaultstrapOptions,
};
pub use vault::{GrantOutcome, GrantReport, SecretAccessUpdater, SecretItem, SecretStore, Selector};

pub use vaultstrap_shared::{
    BootstrapError, ConfigError, GrantError, IssuanceError, ProvisionError, RegistrationError,
    SshTarget, VaultstrapError, VaultstrapResult,
};
