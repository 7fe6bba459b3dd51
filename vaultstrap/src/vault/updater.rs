//! Secret access grants.

use super::{SecretStore, Selector};
use std::sync::Arc;
use vaultstrap_shared::errors::GrantError;

/// Result of a single successful grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    Added,
    /// Selector was already authorized; nothing was saved.
    AlreadyAuthorized,
}

/// Per-item outcomes of a best-effort grant over several items, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrantReport {
    results: Vec<(String, Result<GrantOutcome, GrantError>)>,
}

impl GrantReport {
    pub fn push(&mut self, item: impl Into<String>, result: Result<GrantOutcome, GrantError>) {
        self.results.push((item.into(), result));
    }

    pub fn results(&self) -> &[(String, Result<GrantOutcome, GrantError>)] {
        &self.results
    }

    pub fn failures(&self) -> Vec<(&str, &GrantError)> {
        self.results
            .iter()
            .filter_map(|(item, result)| result.as_ref().err().map(|e| (item.as_str(), e)))
            .collect()
    }

    /// Items granted (newly or already).
    pub fn granted(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, result)| result.is_ok())
            .map(|(item, _)| item.as_str())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.results.iter().all(|(_, result)| result.is_ok())
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}

/// Adds selectors to secret items with read-modify-write safety.
///
/// Performs no search-index polling: the selector is assumed resolvable
/// when `grant` is called. A stale selector silently covers zero clients.
pub struct SecretAccessUpdater {
    store: Arc<dyn SecretStore>,
    vault: String,
    max_attempts: u32,
}

impl SecretAccessUpdater {
    pub fn new(store: Arc<dyn SecretStore>, vault: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            store,
            vault: vault.into(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn vault(&self) -> &str {
        &self.vault
    }

    /// Authorize `selector` on `item`.
    ///
    /// Version conflicts from concurrent writers are retried by re-loading,
    /// so a sibling's grant is never overwritten.
    pub async fn grant(&self, item: &str, selector: &Selector) -> Result<GrantOutcome, GrantError> {
        for attempt in 1..=self.max_attempts {
            let mut secret = self.store.load(&self.vault, item).await?;

            if !secret.add_selector(selector) {
                tracing::debug!(vault = %self.vault, item, %selector, "Selector already authorized");
                return Ok(GrantOutcome::AlreadyAuthorized);
            }

            match self.store.save(&secret).await {
                Ok(()) => {
                    tracing::info!(vault = %self.vault, item, %selector, "Granted secret access");
                    return Ok(GrantOutcome::Added);
                }
                Err(GrantError::VersionConflict { .. }) => {
                    tracing::debug!(
                        vault = %self.vault,
                        item,
                        attempt,
                        "Secret item changed concurrently, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(GrantError::RetriesExhausted {
            vault: self.vault.clone(),
            item: item.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// Grant on every item in order. One failure never stops the rest.
    pub async fn grant_all(&self, items: &[String], selector: &Selector) -> GrantReport {
        let mut report = GrantReport::default();
        for item in items {
            let result = self.grant(item, selector).await;
            if let Err(ref e) = result {
                tracing::warn!(vault = %self.vault, item = %item, error = %e, "Grant failed");
            }
            report.push(item.clone(), result);
        }
        report
    }
}
