//! Tests for pod event recorders

use prometheus_gang_shim::core::{EventRecorder, EventSeverity, PodRef};
use prometheus_gang_shim::infra::{InMemoryRecorder, LoggingRecorder};

fn pod(name: &str) -> PodRef {
    PodRef::new("default", name, format!("uid-{name}"))
}

#[test]
fn test_in_memory_recorder_formats_message() {
    let recorder = InMemoryRecorder::default();
    recorder.eventf(
        &pod("pod-1"),
        EventSeverity::Warning,
        "FailedScheduling",
        format_args!("{} is not ready: {}", "pod-1", "pvc pending"),
    );

    let events = recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].pod.alias(), "default/pod-1");
    assert_eq!(events[0].severity, EventSeverity::Warning);
    assert_eq!(events[0].message, "pod-1 is not ready: pvc pending");
}

#[test]
fn test_in_memory_recorder_is_bounded() {
    let recorder = InMemoryRecorder::new(3);
    for i in 0..5 {
        recorder.eventf(
            &pod(&format!("pod-{i}")),
            EventSeverity::Normal,
            "Scheduled",
            format_args!("event {i}"),
        );
    }

    let names: Vec<String> = recorder.events().into_iter().map(|e| e.pod.name).collect();
    assert_eq!(names, ["pod-2", "pod-3", "pod-4"]);
}

#[test]
fn test_events_with_reason_filters() {
    let recorder = InMemoryRecorder::default();
    recorder.eventf(
        &pod("a"),
        EventSeverity::Normal,
        "Scheduled",
        format_args!("ok"),
    );
    recorder.eventf(
        &pod("b"),
        EventSeverity::Warning,
        "ApplicationFailed",
        format_args!("no"),
    );

    let failed = recorder.events_with_reason("ApplicationFailed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].pod.name, "b");
}

#[test]
fn test_logging_recorder_accepts_events() {
    LoggingRecorder.eventf(
        &pod("a"),
        EventSeverity::Warning,
        "ApplicationFailed",
        format_args!("x"),
    );
}
