//! Tests for builder modules

use std::sync::Arc;

use prometheus_gang_shim::builders::ShimBuilder;
use prometheus_gang_shim::config::ShimConfig;
use prometheus_gang_shim::infra::{InMemoryPodClient, InMemorySchedulerApi, PodPlaceholderManager};

fn placeholders() -> Arc<PodPlaceholderManager<InMemoryPodClient>> {
    Arc::new(PodPlaceholderManager::new(Arc::new(InMemoryPodClient::new())))
}

#[tokio::test]
async fn test_build_requires_scheduler_api() {
    let err = ShimBuilder::new(ShimConfig::default())
        .with_placeholder_manager(placeholders())
        .build()
        .expect_err("scheduler api missing");
    assert!(err.to_string().contains("scheduler api"));
}

#[tokio::test]
async fn test_build_requires_placeholder_manager() {
    let err = ShimBuilder::new(ShimConfig::default())
        .with_scheduler_api(Arc::new(InMemorySchedulerApi::new()))
        .build()
        .expect_err("placeholder manager missing");
    assert!(err.to_string().contains("placeholder manager"));
}

#[tokio::test]
async fn test_build_rejects_invalid_config() {
    let config = ShimConfig {
        scheduling_interval_ms: 0,
        ..ShimConfig::default()
    };
    let err = ShimBuilder::new(config)
        .with_scheduler_api(Arc::new(InMemorySchedulerApi::new()))
        .with_placeholder_manager(placeholders())
        .build()
        .expect_err("invalid config");
    assert!(err.to_string().contains("invalid shim configuration"));
}

#[tokio::test]
async fn test_build_does_not_start() {
    let scheduler = Arc::new(InMemorySchedulerApi::new());
    let shim = ShimBuilder::new(ShimConfig::default())
        .with_scheduler_api(scheduler.clone())
        .with_placeholder_manager(placeholders())
        .build()
        .expect("shim builds");

    assert!(!shim.dispatcher().is_running());
    assert!(scheduler.registrations().is_empty());
    assert_eq!(shim.registry().services().rm_id, "mycluster");
}

#[tokio::test]
async fn test_start_registers_and_stop_halts_dispatcher() {
    let scheduler = Arc::new(InMemorySchedulerApi::new());
    let config = ShimConfig {
        cluster_id: "edge-1".to_string(),
        ..ShimConfig::default()
    };
    let shim = ShimBuilder::new(config)
        .with_scheduler_api(scheduler.clone())
        .with_placeholder_manager(placeholders())
        .build()
        .expect("shim builds");

    shim.start().expect("shim starts");
    assert!(shim.dispatcher().is_running());
    let registrations = scheduler.registrations();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].rm_id, "edge-1");

    shim.stop();
    assert!(!shim.dispatcher().is_running());
}

#[tokio::test]
async fn test_failed_registration_stops_dispatcher() {
    let scheduler = Arc::new(InMemorySchedulerApi::new());
    scheduler.set_failure(Some("scheduler unavailable".to_string()));
    let shim = ShimBuilder::new(ShimConfig::default())
        .with_scheduler_api(scheduler.clone())
        .with_placeholder_manager(placeholders())
        .build()
        .expect("shim builds");

    let err = shim.start().expect_err("registration fails");
    assert!(format!("{err:#}").contains("scheduler unavailable"));
    assert!(!shim.dispatcher().is_running());
}

#[test]
fn test_build_outside_runtime_owns_one() {
    let shim = ShimBuilder::new(ShimConfig {
        worker_threads: 1,
        ..ShimConfig::default()
    })
    .with_scheduler_api(Arc::new(InMemorySchedulerApi::new()))
    .with_placeholder_manager(placeholders())
    .build()
    .expect("shim builds with its own runtime");
    assert!(!shim.dispatcher().is_running());
}
