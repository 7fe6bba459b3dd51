//! Secret access grants under retries and concurrency.

use futures::future::join_all;
use proptest::prelude::*;
use std::sync::atomic::Ordering;
use vaultstrap::{GrantError, GrantOutcome, SecretAccessUpdater, Selector};
use vaultstrap_test_utils::MemorySecretStore;

#[tokio::test]
async fn test_concurrent_grants_retry_on_conflict() {
    let store = MemorySecretStore::new().with_item("vault", "api-token");
    let updater = SecretAccessUpdater::new(store.clone(), "vault", 10);

    let names: Vec<String> = (0..8).map(|i| format!("web-{}", i)).collect();
    let grants = names.iter().map(|n| {
        let updater = &updater;
        async move { updater.grant("api-token", &Selector::node_name(n)).await }
    });
    let results = join_all(grants).await;
    assert!(results.iter().all(|r| *r == Ok(GrantOutcome::Added)));

    let item = store.item("vault", "api-token").unwrap();
    for name in &names {
        assert!(item.selectors.contains(&format!("name:{}", name)));
    }
    assert_eq!(item.version, names.len() as u64);
    assert!(store.conflicts.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn test_single_attempt_surfaces_exhaustion() {
    let store = MemorySecretStore::new().with_item("vault", "api-token");
    let updater = SecretAccessUpdater::new(store.clone(), "vault", 1);

    let web1 = Selector::node_name("web-1");
    let web2 = Selector::node_name("web-2");
    let (a, b) = tokio::join!(
        updater.grant("api-token", &web1),
        updater.grant("api-token", &web2),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(GrantError::RetriesExhausted { attempts: 1, .. })
    )));
}

#[tokio::test]
async fn test_grant_all_collects_failures() {
    let store = MemorySecretStore::new()
        .with_item("vault", "db-password")
        .with_item("vault", "api-token");
    let updater = SecretAccessUpdater::new(store.clone(), "vault", 3);
    let items: Vec<String> = ["db-password", "missing-secret", "api-token"]
        .into_iter()
        .map(String::from)
        .collect();

    let report = updater
        .grant_all(&items, &Selector::node_name("i-abc"))
        .await;

    assert_eq!(report.len(), 3);
    assert_eq!(report.granted(), vec!["db-password", "api-token"]);
    assert_eq!(report.failures().len(), 1);
    assert!(!report.is_complete());
}

proptest! {
    #[test]
    fn prop_grant_is_idempotent(names in prop::collection::vec("[a-z][a-z0-9-]{0,8}", 1..6)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async {
            let store = MemorySecretStore::new().with_item("vault", "db-password");
            let updater = SecretAccessUpdater::new(store.clone(), "vault", 3);

            for name in &names {
                updater.grant("db-password", &Selector::node_name(name)).await.unwrap();
            }
            let first = store.item("vault", "db-password").unwrap();

            for name in &names {
                let outcome = updater.grant("db-password", &Selector::node_name(name)).await.unwrap();
                prop_assert_eq!(outcome, GrantOutcome::AlreadyAuthorized);
            }
            let second = store.item("vault", "db-password").unwrap();

            prop_assert_eq!(&first, &second);
            for name in &names {
                let selector = format!("name:{}", name);
                prop_assert!(first.selectors.contains(&selector));
            }
            Ok(())
        })?;
    }
}
