//! Explicit cleanup of resources left behind by failed orchestrations.
//!
//! The orchestrator never calls these; operators or sweepers do, using the
//! `leaked` list of a [`PipelineFailure`](super::PipelineFailure).

use super::types::LeakedResource;
use crate::identity::InventoryServer;
use crate::provision::CloudProvider;
use async_trait::async_trait;
use std::sync::Arc;
use vaultstrap_shared::errors::{VaultstrapError, VaultstrapResult};

/// Releases one kind of leaked resource.
#[async_trait]
pub trait Compensator: Send + Sync {
    fn handles(&self, resource: &LeakedResource) -> bool;

    async fn release(&self, resource: &LeakedResource) -> VaultstrapResult<()>;
}

/// Deletes node records and client identities, and removes stored keys.
pub struct InventoryCompensator {
    inventory: Arc<dyn InventoryServer>,
}

impl InventoryCompensator {
    pub fn new(inventory: Arc<dyn InventoryServer>) -> Self {
        Self { inventory }
    }
}

#[async_trait]
impl Compensator for InventoryCompensator {
    fn handles(&self, resource: &LeakedResource) -> bool {
        matches!(
            resource,
            LeakedResource::Identity { .. } | LeakedResource::Node(_)
        )
    }

    async fn release(&self, resource: &LeakedResource) -> VaultstrapResult<()> {
        match resource {
            LeakedResource::Node(name) => self.inventory.delete_node(name).await,
            LeakedResource::Identity { name, key_path } => {
                self.inventory.delete_client(name).await?;
                match std::fs::remove_file(key_path) {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(VaultstrapError::Storage(format!(
                        "failed to remove {}: {}",
                        key_path.display(),
                        e
                    ))),
                }
            }
            LeakedResource::Instance(_) => Err(unhandled(resource)),
        }
    }
}

/// Terminates cloud instances.
pub struct CloudCompensator {
    cloud: Arc<dyn CloudProvider>,
}

impl CloudCompensator {
    pub fn new(cloud: Arc<dyn CloudProvider>) -> Self {
        Self { cloud }
    }
}

#[async_trait]
impl Compensator for CloudCompensator {
    fn handles(&self, resource: &LeakedResource) -> bool {
        matches!(resource, LeakedResource::Instance(_))
    }

    async fn release(&self, resource: &LeakedResource) -> VaultstrapResult<()> {
        match resource {
            LeakedResource::Instance(id) => Ok(self.cloud.terminate_instance(id).await?),
            _ => Err(unhandled(resource)),
        }
    }
}

/// Release `leaked` newest first, continuing past failures.
///
/// Results are returned in release order.
pub async fn compensate(
    leaked: &[LeakedResource],
    compensators: &[&dyn Compensator],
) -> Vec<(LeakedResource, VaultstrapResult<()>)> {
    let mut results = Vec::with_capacity(leaked.len());

    for resource in leaked.iter().rev() {
        let result = match compensators.iter().find(|c| c.handles(resource)) {
            Some(compensator) => compensator.release(resource).await,
            None => Err(unhandled(resource)),
        };

        match result {
            Ok(()) => tracing::info!(resource = %resource, "Released leaked resource"),
            Err(ref e) => {
                tracing::warn!(resource = %resource, error = %e, "Failed to release leaked resource")
            }
        }
        results.push((resource.clone(), result));
    }

    results
}

fn unhandled(resource: &LeakedResource) -> VaultstrapError {
    VaultstrapError::Internal(format!("no compensator for {}", resource))
}
