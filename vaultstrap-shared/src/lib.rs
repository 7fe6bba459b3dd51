//! Vaultstrap Shared - Error taxonomy, constants and value types
//!
//! This crate contains the pieces used by both the orchestration library
//! (vaultstrap) and the command-line front end.

pub mod constants;
pub mod errors;
pub mod target;

pub use errors::{
    BootstrapError, ConfigError, GrantError, IssuanceError, ProvisionError, RegistrationError,
    VaultstrapError, VaultstrapResult,
};
pub use target::SshTarget;
