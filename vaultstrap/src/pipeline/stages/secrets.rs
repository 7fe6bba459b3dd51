//! Stage 4: Secret access.
//!
//! Grants are made by selector, so the node must be searchable before the
//! selector can resolve to its client. The settle wait bridges the gap
//! between node creation and search-index visibility.

use crate::identity::InventoryServer;
use crate::pipeline::types::SecretsInput;
use crate::runtime::options::SettleStrategy;
use crate::vault::{GrantReport, SecretAccessUpdater, Selector};
use tokio::time::Instant;

/// Wait for the node to settle, then grant access on every item.
///
/// Never fails: per-item errors are collected in the report.
pub async fn run(input: SecretsInput<'_>) -> GrantReport {
    let selector = Selector::node_name(input.node_name);

    settle(
        input.inventory.as_ref(),
        input.node_name,
        &selector,
        &input.options.settle,
    )
    .await;

    SecretAccessUpdater::new(
        input.secrets,
        input.options.vault.clone(),
        input.options.grant_attempts,
    )
    .grant_all(input.items, &selector)
    .await
}

/// Returns `true` if the node was seen in search results.
///
/// `Fixed` never queries and always returns `false`.
pub async fn settle(
    inventory: &dyn InventoryServer,
    node_name: &str,
    selector: &Selector,
    strategy: &SettleStrategy,
) -> bool {
    match *strategy {
        SettleStrategy::Fixed { delay } => {
            tracing::info!(node = %node_name, ?delay, "Waiting for search index");
            tokio::time::sleep(delay).await;
            false
        }
        SettleStrategy::Poll { interval, max_wait } => {
            let started = Instant::now();
            loop {
                match inventory.search_nodes(selector.as_str()).await {
                    Ok(names) if names.iter().any(|n| n == node_name) => {
                        tracing::debug!(
                            node = %node_name,
                            elapsed = ?started.elapsed(),
                            "Node visible in search index"
                        );
                        return true;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(node = %node_name, error = %e, "Node search failed");
                    }
                }

                if started.elapsed() >= max_wait {
                    tracing::warn!(
                        node = %node_name,
                        ?max_wait,
                        "Node not visible in search index yet, granting anyway"
                    );
                    return false;
                }
                tokio::time::sleep(interval.min(max_wait.saturating_sub(started.elapsed())))
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{ClientCredential, ClientKey, NodeRecord};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;
    use vaultstrap_shared::errors::{IssuanceError, RegistrationError, VaultstrapResult};

    /// Search index that reveals the node after `lag` queries.
    struct LaggingIndex {
        lag: Mutex<u32>,
        queries: Mutex<u32>,
    }

    impl LaggingIndex {
        fn new(lag: u32) -> Self {
            Self {
                lag: Mutex::new(lag),
                queries: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl InventoryServer for LaggingIndex {
        async fn create_client(&self, _name: &str) -> Result<ClientKey, IssuanceError> {
            unreachable!()
        }

        async fn create_node(
            &self,
            _auth: &ClientCredential,
            _node: &NodeRecord,
        ) -> Result<(), RegistrationError> {
            unreachable!()
        }

        async fn search_nodes(&self, query: &str) -> VaultstrapResult<Vec<String>> {
            *self.queries.lock() += 1;
            let mut lag = self.lag.lock();
            if *lag > 0 {
                *lag -= 1;
                return Ok(vec![]);
            }
            Ok(vec![query.trim_start_matches("name:").to_string()])
        }

        async fn delete_node(&self, _name: &str) -> VaultstrapResult<()> {
            Ok(())
        }

        async fn delete_client(&self, _name: &str) -> VaultstrapResult<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_proceeds_once_visible() {
        let index = LaggingIndex::new(2);
        let strategy = SettleStrategy::Poll {
            interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(60),
        };

        let started = Instant::now();
        let seen = settle(&index, "i-abc", &Selector::node_name("i-abc"), &strategy).await;

        assert!(seen);
        assert_eq!(*index.queries.lock(), 3);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_falls_back_after_max_wait() {
        let index = LaggingIndex::new(u32::MAX);
        let strategy = SettleStrategy::Poll {
            interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(10),
        };

        let started = Instant::now();
        let seen = settle(&index, "i-abc", &Selector::node_name("i-abc"), &strategy).await;

        assert!(!seen);
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert!(started.elapsed() < Duration::from_secs(13));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_waits_full_delay_without_querying() {
        let index = LaggingIndex::new(0);
        let strategy = SettleStrategy::fixed_default();

        let started = Instant::now();
        let seen = settle(&index, "i-abc", &Selector::node_name("i-abc"), &strategy).await;

        assert!(!seen);
        assert_eq!(*index.queries.lock(), 0);
        assert!(started.elapsed() >= Duration::from_secs(60));
    }
}
