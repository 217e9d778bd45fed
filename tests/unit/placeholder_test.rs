//! Tests for placeholder pod management

use std::sync::Arc;

use prometheus_gang_shim::core::{
    GangReservation, OwnerReference, PlaceholderManager, TaskGroup, TaskGroupCounts,
};
use prometheus_gang_shim::infra::{placeholder_name, InMemoryPodClient, PodPlaceholderManager};

fn reservation(existing: TaskGroupCounts) -> GangReservation {
    GangReservation {
        app_id: "app-1".to_string(),
        namespace: "team-a".to_string(),
        queue: "root.a".to_string(),
        user: "alice".to_string(),
        task_groups: vec![
            TaskGroup::new("driver", 1)
                .with_min_resource("cpu", "1")
                .expect("valid quantity"),
            TaskGroup::new("worker", 3)
                .with_min_resource("memory", "1Gi")
                .expect("valid quantity"),
        ],
        owner_references: vec![OwnerReference {
            api_version: "v1".to_string(),
            kind: "Pod".to_string(),
            name: "driver-pod".to_string(),
            uid: "uid-1".to_string(),
            controller: false,
        }],
        existing_placeholders: existing,
        placeholder_timeout_secs: 60,
    }
}

#[test]
fn test_placeholder_name_shape() {
    let name = placeholder_name("worker", "app-1");
    let suffix = name.strip_prefix("tg-worker-app-1-").expect("prefix");
    assert_eq!(suffix.len(), 10);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(name, placeholder_name("worker", "app-1"));
}

#[tokio::test]
async fn test_creates_one_pod_per_member() {
    let client = Arc::new(InMemoryPodClient::new());
    let manager = PodPlaceholderManager::new(Arc::clone(&client));

    manager
        .create_app_placeholders(&reservation(TaskGroupCounts::new()))
        .await
        .expect("creation succeeds");

    let created = client.created();
    assert_eq!(created.len(), 4);
    assert_eq!(created.iter().filter(|p| p.task_group == "worker").count(), 3);
    let pod = &created[0];
    assert_eq!(pod.namespace, "team-a");
    assert_eq!(pod.queue, "root.a");
    assert_eq!(pod.timeout_secs, 60);
    assert_eq!(pod.owner_references.len(), 1);
    assert_eq!(manager.tracked("app-1").len(), 4);
}

#[tokio::test]
async fn test_existing_placeholders_are_not_recreated() {
    let client = Arc::new(InMemoryPodClient::new());
    let manager = PodPlaceholderManager::new(Arc::clone(&client));
    let mut existing = TaskGroupCounts::new();
    existing.add("worker", 2);
    existing.add("driver", 5);

    manager
        .create_app_placeholders(&reservation(existing))
        .await
        .expect("creation succeeds");

    let created = client.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].task_group, "worker");
}

#[tokio::test]
async fn test_failure_keeps_created_pods_for_clean_up() {
    let client = Arc::new(InMemoryPodClient::new());
    client.fail_after(2);
    let manager = PodPlaceholderManager::new(Arc::clone(&client));

    let err = manager
        .create_app_placeholders(&reservation(TaskGroupCounts::new()))
        .await
        .expect_err("third pod fails");
    assert!(err.to_string().contains("app-1"));
    assert_eq!(manager.tracked("app-1").len(), 2);

    manager.clean_up("app-1").await;
    assert_eq!(client.deleted().len(), 2);
    assert!(manager.tracked("app-1").is_empty());
}

#[tokio::test]
async fn test_clean_up_is_idempotent() {
    let client = Arc::new(InMemoryPodClient::new());
    let manager = PodPlaceholderManager::new(Arc::clone(&client));
    manager
        .create_app_placeholders(&reservation(TaskGroupCounts::new()))
        .await
        .expect("creation succeeds");

    manager.clean_up("app-1").await;
    manager.clean_up("app-1").await;
    manager.clean_up("app-unknown").await;

    assert_eq!(client.deleted().len(), 4);
}
