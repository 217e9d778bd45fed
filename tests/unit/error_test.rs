//! Tests for error types

use prometheus_gang_shim::core::{ApplicationEventType, ApplicationState, ShimError};

#[test]
fn test_invalid_transition_error() {
    let err = ShimError::InvalidTransition {
        event: ApplicationEventType::Recover,
        state: ApplicationState::Submitted,
    };
    assert_eq!(
        format!("{}", err),
        "event RecoverApplication inappropriate in current state Submitted"
    );
}

#[test]
fn test_task_not_found_error() {
    let err = ShimError::TaskNotFound {
        app_id: "app-1".to_string(),
        task_id: "task-9".to_string(),
    };
    assert_eq!(format!("{}", err), "task task-9 doesn't exist in application app-1");
}

#[test]
fn test_application_not_found_error() {
    let err = ShimError::ApplicationNotFound("app-1".to_string());
    assert_eq!(format!("{}", err), "application app-1 doesn't exist");
}

#[test]
fn test_scheduler_api_error() {
    let err = ShimError::SchedulerApi("connection refused".to_string());
    assert_eq!(format!("{}", err), "scheduler api error: connection refused");
}

#[test]
fn test_config_error() {
    let err = ShimError::Config("cluster_id must not be empty".to_string());
    assert_eq!(format!("{}", err), "config invalid: cluster_id must not be empty");
}

#[test]
fn test_error_converts_into_anyhow() {
    let err: anyhow::Error = ShimError::InvalidQuantity("12xyz".to_string()).into();
    assert!(err.downcast_ref::<ShimError>().is_some());
    assert_eq!(err.to_string(), "invalid quantity `12xyz`");
}
