//! End-to-end gang scheduling tests.
//!
//! A started shim with in-memory collaborators, driven through
//! [`Application::schedule`] and the event dispatcher:
//! - Submission, acceptance and rejection round trips
//! - Reservation through placeholder pods, and its fallbacks
//! - Which tasks are advanced in `Reserving` and `Running`

mod common;

use std::time::Duration;

use common::{gang_groups, placeholder, task, wait_for, wait_for_state, Fixture};
use prometheus_gang_shim::core::{
    AcceptedApplication, ApplicationEvent, ApplicationEventType, ApplicationState,
    RejectedApplication, TaskEventType, TaskState, UpdateResponse,
};
use prometheus_gang_shim::infra::InMemorySchedulerApi;

const TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// SUBMISSION
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_registers_resource_manager() {
    let fixture = Fixture::started(InMemorySchedulerApi::new());

    let registrations = fixture.scheduler.registrations();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].rm_id, "mycluster");
    assert_eq!(registrations[0].policy_group, "queues");
    assert!(fixture.shim.dispatcher().is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_accepted_response_moves_to_accepted() {
    let fixture = Fixture::started(InMemorySchedulerApi::new());
    let app = fixture.add_app("app-0001", Vec::new());

    app.schedule();
    assert_eq!(app.state(), ApplicationState::Submitted);

    fixture
        .scheduler
        .respond(UpdateResponse {
            accepted: vec![AcceptedApplication {
                application_id: "app-0001".to_string(),
            }],
            rejected: Vec::new(),
        })
        .expect("callback registered");
    wait_for_state(&app, ApplicationState::Accepted).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rejected_response_ends_in_failed() {
    let fixture = Fixture::started(InMemorySchedulerApi::new());
    let app = fixture.add_app("app-0001", Vec::new());
    app.add_task(task("task-1", TaskState::New));

    app.schedule();
    fixture
        .scheduler
        .respond(UpdateResponse {
            accepted: Vec::new(),
            rejected: vec![RejectedApplication {
                application_id: "app-0001".to_string(),
                reason: "queue does not exist".to_string(),
            }],
        })
        .expect("callback registered");

    wait_for_state(&app, ApplicationState::Failed).await;
    let events = fixture.recorder.events_with_reason("ApplicationFailed");
    assert_eq!(events.len(), 1);
    assert!(events[0]
        .message
        .contains("application app-0001 is rejected by scheduler"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_submission_failure_fails_application() {
    let fixture = Fixture::started(InMemorySchedulerApi::new());
    let app = fixture.add_app("app-0001", Vec::new());
    app.add_task(task("task-1", TaskState::New));
    fixture
        .scheduler
        .set_failure(Some("scheduler unavailable".to_string()));

    app.schedule();

    wait_for_state(&app, ApplicationState::Failed).await;
    let events = fixture.recorder.events_with_reason("ApplicationFailed");
    assert_eq!(events.len(), 1);
    assert!(events[0].message.contains("scheduler unavailable"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_response_for_unknown_app_is_ignored() {
    let fixture = Fixture::started(InMemorySchedulerApi::new());
    let app = fixture.add_app("app-0001", Vec::new());
    app.schedule();

    fixture
        .scheduler
        .respond(UpdateResponse {
            accepted: vec![AcceptedApplication {
                application_id: "app-unknown".to_string(),
            }],
            rejected: Vec::new(),
        })
        .expect("unknown apps are skipped");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(app.state(), ApplicationState::Submitted);
}

// ============================================================================
// RESERVATION
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_gang_app_reserves_all_members() {
    let fixture = Fixture::started(InMemorySchedulerApi::new().with_auto_accept());
    let app = fixture.add_app("app-0001", gang_groups());

    app.schedule();
    wait_for_state(&app, ApplicationState::Accepted).await;
    app.schedule();
    wait_for_state(&app, ApplicationState::Reserving).await;

    let placeholders = &fixture.placeholders;
    wait_for("30 placeholders", TIMEOUT, || {
        placeholders.tracked("app-0001").len() == 30
    })
    .await;
    let created = fixture.pods.created();
    assert_eq!(created.len(), 30);
    assert_eq!(created.iter().filter(|p| p.task_group == "tg-1").count(), 10);
    assert_eq!(created.iter().filter(|p| p.task_group == "tg-2").count(), 20);
    assert!(created.iter().all(|p| p.namespace == "test-ns"));
    assert!(created.iter().all(|p| p.app_id == "app-0001"));

    let ask = fixture.scheduler.updates()[0].new_applications[0]
        .placeholder_ask
        .clone()
        .expect("gang app carries an ask");
    assert_eq!(ask.get("vcore"), Some(25_000));
    assert_eq!(ask.get("memory"), Some(26_230));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(app.state(), ApplicationState::Reserving);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_allocated_task_skips_reservation() {
    let fixture = Fixture::started(InMemorySchedulerApi::new().with_auto_accept());
    let app = fixture.add_app("app-0001", gang_groups());
    app.add_task(task("task-allocated", TaskState::Allocated));

    app.schedule();
    wait_for_state(&app, ApplicationState::Accepted).await;
    app.schedule();

    wait_for_state(&app, ApplicationState::Running).await;
    assert!(fixture.pods.created().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_app_without_task_groups_runs() {
    let fixture = Fixture::started(InMemorySchedulerApi::new().with_auto_accept());
    let app = fixture.add_app("app-0001", Vec::new());

    app.schedule();
    wait_for_state(&app, ApplicationState::Accepted).await;
    app.schedule();

    wait_for_state(&app, ApplicationState::Running).await;
    assert!(fixture.pods.created().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reservation_completes_on_exact_bound_counts() {
    let fixture = Fixture::started(InMemorySchedulerApi::new());
    let app = fixture.add_app("app-0001", gang_groups());
    app.force_state(ApplicationState::Reserving);
    for i in 0..10 {
        app.add_task(placeholder(&format!("ph-1-{i}"), "tg-1", TaskState::Bound));
    }
    for i in 0..19 {
        app.add_task(placeholder(&format!("ph-2-{i}"), "tg-2", TaskState::Bound));
    }
    let dispatcher = fixture.shim.dispatcher();

    dispatcher.dispatch(ApplicationEvent::simple(
        "app-0001",
        ApplicationEventType::UpdateReservation,
    ));
    wait_for("update delivered", TIMEOUT, || {
        dispatcher.stats().pending == 0
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(app.state(), ApplicationState::Reserving);

    app.add_task(placeholder("ph-2-19", "tg-2", TaskState::Bound));
    dispatcher.dispatch(ApplicationEvent::simple(
        "app-0001",
        ApplicationEventType::UpdateReservation,
    ));
    wait_for_state(&app, ApplicationState::Running).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_placeholder_failure_falls_back_to_running() {
    let fixture = Fixture::started(InMemorySchedulerApi::new().with_auto_accept());
    fixture.pods.fail_after(5);
    let app = fixture.add_app("app-0001", gang_groups());

    app.schedule();
    wait_for_state(&app, ApplicationState::Accepted).await;
    app.schedule();

    wait_for_state(&app, ApplicationState::Running).await;
    assert_eq!(fixture.pods.created().len(), 5);
    assert_eq!(fixture.pods.deleted().len(), 5);
    assert!(fixture.placeholders.tracked("app-0001").is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_complete_cleans_up_placeholders() {
    let fixture = Fixture::started(InMemorySchedulerApi::new().with_auto_accept());
    let app = fixture.add_app("app-0001", gang_groups());
    app.schedule();
    wait_for_state(&app, ApplicationState::Accepted).await;
    app.schedule();
    let placeholders = &fixture.placeholders;
    wait_for("30 placeholders", TIMEOUT, || {
        placeholders.tracked("app-0001").len() == 30
    })
    .await;

    fixture
        .shim
        .dispatcher()
        .dispatch(ApplicationEvent::run("app-0001"));
    wait_for_state(&app, ApplicationState::Running).await;
    fixture.shim.dispatcher().dispatch(ApplicationEvent::simple(
        "app-0001",
        ApplicationEventType::Complete,
    ));

    wait_for_state(&app, ApplicationState::Completed).await;
    let pods = &fixture.pods;
    wait_for("placeholders deleted", TIMEOUT, || {
        pods.deleted().len() == 30
    })
    .await;
    assert!(fixture.placeholders.tracked("app-0001").is_empty());
}

// ============================================================================
// TASK SCHEDULING
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reserving_advances_placeholders_only() {
    let fixture = Fixture::started(InMemorySchedulerApi::new());
    let app = fixture.add_app("app-0001", gang_groups());
    app.add_task(task("task-regular", TaskState::New));
    app.add_task(placeholder("ph-1", "tg-1", TaskState::New));
    app.add_task(placeholder("ph-bound", "tg-1", TaskState::Bound));
    app.force_state(ApplicationState::Reserving);

    app.schedule();

    wait_for("placeholder init", TIMEOUT, || {
        !fixture.task_event_ids().is_empty()
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fixture.task_event_ids(), ["ph-1"]);
    let events = fixture.task_events.lock().clone();
    assert_eq!(events[0].app_id, "app-0001");
    assert_eq!(events[0].event, TaskEventType::InitTask);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_running_advances_regular_tasks_only() {
    let fixture = Fixture::started(InMemorySchedulerApi::new());
    let app = fixture.add_app("app-0001", Vec::new());
    app.add_task(task("task-regular", TaskState::New));
    app.add_task(placeholder("ph-1", "tg-1", TaskState::New));
    app.add_task(task("task-pending", TaskState::Pending));
    app.force_state(ApplicationState::Running);

    app.schedule();

    wait_for("task init", TIMEOUT, || {
        !fixture.task_event_ids().is_empty()
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fixture.task_event_ids(), ["task-regular"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_sanity_check_records_event() {
    let fixture = Fixture::started(InMemorySchedulerApi::new());
    let app = fixture.add_app("app-0001", Vec::new());
    let blocked = task("task-blocked", TaskState::New);
    blocked.set_sanity_error(Some("volume not bound".to_string()));
    app.add_task(blocked);
    app.add_task(task("task-ready", TaskState::New));
    app.force_state(ApplicationState::Running);

    app.schedule();

    wait_for("task init", TIMEOUT, || {
        !fixture.task_event_ids().is_empty()
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fixture.task_event_ids(), ["task-ready"]);
    let events = fixture.recorder.events_with_reason("FailedScheduling");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].pod.name, "task-blocked");
    assert!(events[0].message.contains("volume not bound"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_terminal_app_is_not_scheduled() {
    let fixture = Fixture::started(InMemorySchedulerApi::new());
    let app = fixture.add_app("app-0001", Vec::new());
    app.add_task(task("task-1", TaskState::New));
    app.force_state(ApplicationState::Completed);

    fixture.registry().schedule_applications();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(fixture.task_event_ids().is_empty());
    assert!(fixture.scheduler.updates().is_empty());
    assert_eq!(app.state(), ApplicationState::Completed);
}
