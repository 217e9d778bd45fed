//! In-memory task backend for development and testing.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::core::{ManagedTask, PodRef, ShimError, TaskState, TerminationType};
use crate::util::clock::now_ms;

/// Task whose state is set directly by the caller.
#[derive(Debug)]
pub struct InMemoryTask {
    task_id: String,
    pod: PodRef,
    placeholder: bool,
    task_group: String,
    create_time_ms: u128,
    state: Mutex<TaskState>,
    allocation_id: Mutex<Option<String>>,
    termination: Mutex<Option<TerminationType>>,
    sanity_error: Mutex<Option<String>>,
    pod_deletions: AtomicUsize,
}

impl InMemoryTask {
    /// New regular task in `New`, created now.
    #[must_use]
    pub fn new(task_id: impl Into<String>, pod: PodRef) -> Self {
        Self {
            task_id: task_id.into(),
            pod,
            placeholder: false,
            task_group: String::new(),
            create_time_ms: now_ms(),
            state: Mutex::new(TaskState::New),
            allocation_id: Mutex::new(None),
            termination: Mutex::new(None),
            sanity_error: Mutex::new(None),
            pod_deletions: AtomicUsize::new(0),
        }
    }

    /// Builder-style: mark as placeholder.
    #[must_use]
    pub const fn placeholder(mut self, placeholder: bool) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// Builder-style: set the task group.
    #[must_use]
    pub fn with_task_group(mut self, group: impl Into<String>) -> Self {
        self.task_group = group.into();
        self
    }

    /// Builder-style: set the initial state.
    #[must_use]
    pub fn with_state(self, state: TaskState) -> Self {
        *self.state.lock() = state;
        self
    }

    /// Builder-style: set the creation time.
    #[must_use]
    pub const fn with_create_time_ms(mut self, create_time_ms: u128) -> Self {
        self.create_time_ms = create_time_ms;
        self
    }

    /// Builder-style: set the allocation id.
    #[must_use]
    pub fn with_allocation_id(self, allocation_id: impl Into<String>) -> Self {
        *self.allocation_id.lock() = Some(allocation_id.into());
        self
    }

    /// Move the task to `state`.
    pub fn set_state(&self, state: TaskState) {
        *self.state.lock() = state;
    }

    /// Make the sanity check fail with `reason`, or pass with `None`.
    pub fn set_sanity_error(&self, reason: Option<String>) {
        *self.sanity_error.lock() = reason;
    }

    /// Number of pod deletion requests received.
    #[must_use]
    pub fn pod_deletions(&self) -> usize {
        self.pod_deletions.load(Ordering::SeqCst)
    }

    /// Last termination type recorded.
    #[must_use]
    pub fn termination_type(&self) -> Option<TerminationType> {
        *self.termination.lock()
    }
}

impl ManagedTask for InMemoryTask {
    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn state(&self) -> TaskState {
        *self.state.lock()
    }

    fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    fn task_group_name(&self) -> &str {
        &self.task_group
    }

    fn allocation_id(&self) -> Option<String> {
        self.allocation_id.lock().clone()
    }

    fn set_allocation_id(&self, allocation_id: String) {
        *self.allocation_id.lock() = Some(allocation_id);
    }

    fn create_time_ms(&self) -> u128 {
        self.create_time_ms
    }

    fn pod(&self) -> &PodRef {
        &self.pod
    }

    fn set_termination_type(&self, termination: TerminationType) {
        *self.termination.lock() = Some(termination);
    }

    fn delete_task_pod(&self) -> Result<(), ShimError> {
        self.pod_deletions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn sanity_check_before_scheduling(&self) -> Result<(), ShimError> {
        match self.sanity_error.lock().as_ref() {
            Some(reason) => Err(ShimError::Task(reason.clone())),
            None => Ok(()),
        }
    }
}
