//! Tests for tokio spawner and scheduling loop utilities

use std::sync::Arc;

use prometheus_gang_shim::core::Spawn;
use prometheus_gang_shim::runtime::TokioSpawner;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner: Arc<dyn Spawn> = Arc::new(TokioSpawner::new(tokio::runtime::Handle::current()));

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[tokio::test]
async fn test_current_spawner_inside_runtime() {
    assert!(TokioSpawner::current().is_some());
}

#[test]
fn test_current_spawner_outside_runtime() {
    assert!(TokioSpawner::current().is_none());
}

#[test]
fn test_owned_runtime_runs_work() {
    let owned = TokioSpawner::with_worker_threads(1).expect("runtime builds");
    assert!(format!("{owned:?}").contains("owns_runtime: true"));
    let spawner: Arc<dyn Spawn> = Arc::new(owned);

    let (tx, rx) = std::sync::mpsc::channel();
    spawner.spawn(async move {
        tx.send(std::thread::current().name().map(str::to_string)).unwrap();
    });

    let name = rx
        .recv_timeout(std::time::Duration::from_secs(5))
        .expect("spawned work ran");
    assert_eq!(name.as_deref(), Some("shim-worker"));
}
