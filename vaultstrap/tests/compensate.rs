//! Cleanup of resources reported by failed orchestrations.

use vaultstrap::pipeline::compensate::compensate;
use vaultstrap::pipeline::{CloudCompensator, Compensator, InventoryCompensator};
use vaultstrap::{InstanceId, LeakedResource, NodeRequest, ServerDefinition, VaultstrapError};
use vaultstrap_test_utils::{Harness, ScriptedExecutor};

#[tokio::test]
async fn test_compensate_releases_newest_first() {
    let harness = Harness {
        executor: ScriptedExecutor::exiting(2, "connection reset"),
        ..Harness::new()
    };
    let request = NodeRequest::provision(
        ServerDefinition::builder("ami-123", "m1.small")
            .build()
            .unwrap(),
    );
    let failure = harness.orchestrator().run(request).await.unwrap_err();
    assert_eq!(failure.leaked.len(), 3);

    let inventory = InventoryCompensator::new(harness.inventory.clone());
    let cloud = CloudCompensator::new(harness.cloud.clone());
    let results = compensate(&failure.leaked, &[&inventory as &dyn Compensator, &cloud]).await;

    let order: Vec<&LeakedResource> = results.iter().map(|(r, _)| r).collect();
    assert!(matches!(order[0], LeakedResource::Node(_)));
    assert!(matches!(order[1], LeakedResource::Identity { .. }));
    assert!(matches!(order[2], LeakedResource::Instance(_)));
    assert!(results.iter().all(|(_, r)| r.is_ok()));

    assert!(harness.inventory.node("i-abc").is_none());
    assert!(!harness.inventory.has_client("i-abc"));
    assert!(!harness.temp.path().join("i-abc.pem").exists());
    assert_eq!(
        *harness.cloud.terminated.lock(),
        vec![InstanceId::new("i-abc")]
    );
}

#[tokio::test]
async fn test_compensate_reports_unhandled() {
    let harness = Harness::new();
    let inventory = InventoryCompensator::new(harness.inventory.clone());
    let leaked = vec![
        LeakedResource::Instance(InstanceId::new("i-abc")),
        LeakedResource::Node("web-1".into()),
    ];

    let results = compensate(&leaked, &[&inventory as &dyn Compensator]).await;

    assert!(results[0].1.is_ok());
    assert!(matches!(results[1].1, Err(VaultstrapError::Internal(_))));
    assert_eq!(*harness.inventory.deleted_nodes.lock(), vec!["web-1".to_string()]);
    assert!(harness.cloud.terminated.lock().is_empty());
}

#[tokio::test]
async fn test_missing_key_file_is_not_an_error() {
    let harness = Harness::new();
    let inventory = InventoryCompensator::new(harness.inventory.clone());
    let leaked = LeakedResource::Identity {
        name: "web-1".into(),
        key_path: harness.temp.path().join("web-1.pem"),
    };

    assert!(inventory.release(&leaked).await.is_ok());
    assert_eq!(*harness.inventory.deleted_clients.lock(), vec!["web-1".to_string()]);
}
