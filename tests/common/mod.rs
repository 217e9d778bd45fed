//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use prometheus_gang_shim::builders::{Shim, ShimBuilder};
use prometheus_gang_shim::config::ShimConfig;
use prometheus_gang_shim::core::{
    Application, ApplicationMetadata, ApplicationRegistry, ApplicationState, PodRef,
    SchedulingEvent, ShimServices, TaskEvent, TaskGroup, TaskState,
};
use prometheus_gang_shim::infra::{
    InMemoryPodClient, InMemoryRecorder, InMemorySchedulerApi, InMemoryTask, PodPlaceholderManager,
};

// ============================================================================
// FIXTURE
// ============================================================================

/// A shim wired to in-memory collaborators, plus handles to inspect them.
pub struct Fixture {
    pub scheduler: Arc<InMemorySchedulerApi>,
    pub pods: Arc<InMemoryPodClient>,
    pub placeholders: Arc<PodPlaceholderManager<InMemoryPodClient>>,
    pub recorder: Arc<InMemoryRecorder>,
    pub task_events: Arc<Mutex<Vec<TaskEvent>>>,
    pub shim: Shim,
}

impl Fixture {
    /// Must be called inside a tokio runtime.
    pub fn new() -> Self {
        Self::with_scheduler(InMemorySchedulerApi::new())
    }

    /// Scheduler that accepts every submitted application.
    pub fn auto_accept() -> Self {
        Self::with_scheduler(InMemorySchedulerApi::new().with_auto_accept())
    }

    pub fn with_scheduler(scheduler: InMemorySchedulerApi) -> Self {
        let scheduler = Arc::new(scheduler);
        let pods = Arc::new(InMemoryPodClient::new());
        let placeholders = Arc::new(PodPlaceholderManager::new(Arc::clone(&pods)));
        let recorder = Arc::new(InMemoryRecorder::default());
        let task_events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&task_events);

        let shim = ShimBuilder::new(ShimConfig::default())
            .with_scheduler_api(scheduler.clone())
            .with_placeholder_manager(placeholders.clone())
            .with_recorder(recorder.clone())
            .with_task_event_handler(Arc::new(move |event| {
                if let SchedulingEvent::Task(task_event) = event {
                    sink.lock().push(task_event);
                }
            }))
            .build()
            .expect("shim should build");

        Self {
            scheduler,
            pods,
            placeholders,
            recorder,
            task_events,
            shim,
        }
    }

    /// Fixture whose shim is already started.
    pub fn started(scheduler: InMemorySchedulerApi) -> Self {
        let fixture = Self::with_scheduler(scheduler);
        fixture.shim.start().expect("shim should start");
        fixture
    }

    pub fn registry(&self) -> &Arc<ApplicationRegistry> {
        self.shim.registry()
    }

    pub fn services(&self) -> Arc<ShimServices> {
        Arc::clone(self.registry().services())
    }

    /// Application outside the registry, for direct `handle` tests.
    pub fn standalone_app(&self, app_id: &str) -> Application {
        Application::new(app_id, "root.abc", "testuser", test_tags(), self.services())
    }

    /// Register an application with the given task groups.
    pub fn add_app(&self, app_id: &str, task_groups: Vec<TaskGroup>) -> Arc<Application> {
        self.registry().add_application(ApplicationMetadata {
            app_id: app_id.to_string(),
            queue: "root.abc".to_string(),
            user: "testuser".to_string(),
            tags: test_tags(),
            task_groups,
            ..Default::default()
        })
    }

    pub fn task_event_ids(&self) -> Vec<String> {
        self.task_events
            .lock()
            .iter()
            .map(|e| e.task_id.clone())
            .collect()
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.shim.stop();
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

pub fn test_tags() -> BTreeMap<String, String> {
    BTreeMap::from([("namespace".to_string(), "test-ns".to_string())])
}

/// `{tg-1: 10 × 500m/500Mi}`, `{tg-2: 20 × 1000m/1000Mi}`.
pub fn gang_groups() -> Vec<TaskGroup> {
    vec![
        TaskGroup::new("tg-1", 10)
            .with_min_resource("cpu", "500m")
            .and_then(|tg| tg.with_min_resource("memory", "500Mi"))
            .expect("valid quantities"),
        TaskGroup::new("tg-2", 20)
            .with_min_resource("cpu", "1000m")
            .and_then(|tg| tg.with_min_resource("memory", "1000Mi"))
            .expect("valid quantities"),
    ]
}

pub fn task(task_id: &str, state: TaskState) -> Arc<InMemoryTask> {
    Arc::new(
        InMemoryTask::new(
            task_id,
            PodRef::new("test-ns", task_id, format!("uid-{task_id}")),
        )
        .with_state(state),
    )
}

pub fn placeholder(task_id: &str, group: &str, state: TaskState) -> Arc<InMemoryTask> {
    Arc::new(
        InMemoryTask::new(
            task_id,
            PodRef::new("test-ns", task_id, format!("uid-{task_id}")),
        )
        .placeholder(true)
        .with_task_group(group)
        .with_state(state),
    )
}

/// Poll `cond` until it holds or `timeout` elapses.
pub async fn wait_for<F>(what: &str, timeout: Duration, cond: F)
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while !cond() {
        assert!(start.elapsed() < timeout, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub async fn wait_for_state(app: &Application, state: ApplicationState) {
    wait_for(
        &format!("{} to reach {state}", app.id()),
        Duration::from_secs(5),
        || app.state() == state,
    )
    .await;
}
