//! Pod event recorders.
//!
//! [`InMemoryRecorder`] keeps a bounded ring of events for development and
//! tests. [`LoggingRecorder`] forwards events to `tracing`.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::core::{EventRecorder, EventSeverity, PodRef};
use crate::util::clock::now_ms;

/// One recorded pod event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Pod the event was recorded on.
    pub pod: PodRef,
    /// Severity.
    pub severity: EventSeverity,
    /// Short machine-readable reason.
    pub reason: String,
    /// Formatted message.
    pub message: String,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
}

/// In-memory recorder with a bounded buffer.
#[derive(Debug)]
pub struct InMemoryRecorder {
    events: Mutex<VecDeque<RecordedEvent>>,
    max_events: usize,
}

impl InMemoryRecorder {
    /// Create a recorder that keeps at most `max_events`.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events.min(1024))),
            max_events,
        }
    }

    /// Snapshot of stored events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Stored events with the given reason.
    #[must_use]
    pub fn events_with_reason(&self, reason: &str) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.reason == reason)
            .cloned()
            .collect()
    }
}

impl Default for InMemoryRecorder {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl EventRecorder for InMemoryRecorder {
    fn eventf(
        &self,
        pod: &PodRef,
        severity: EventSeverity,
        reason: &str,
        message: fmt::Arguments<'_>,
    ) {
        if self.max_events == 0 {
            return;
        }
        let event = RecordedEvent {
            pod: pod.clone(),
            severity,
            reason: reason.to_string(),
            message: message.to_string(),
            created_at_ms: now_ms(),
        };
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Recorder that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRecorder;

impl EventRecorder for LoggingRecorder {
    fn eventf(
        &self,
        pod: &PodRef,
        severity: EventSeverity,
        reason: &str,
        message: fmt::Arguments<'_>,
    ) {
        match severity {
            EventSeverity::Normal => info!(pod = %pod.alias(), reason, %message, "pod event"),
            EventSeverity::Warning => warn!(pod = %pod.alias(), reason, %message, "pod event"),
        }
    }
}
