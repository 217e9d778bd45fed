//! Capability surface an application needs from its tasks.
//!
//! The task lifecycle itself is owned elsewhere; the application only reads
//! task state and asks for a few side effects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::ShimError;

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Known to the shim, not yet handed to the scheduler.
    New,
    /// Waiting to be submitted.
    Pending,
    /// Ask submitted to the scheduler.
    Scheduling,
    /// Scheduler assigned a node.
    Allocated,
    /// Scheduler refused the ask.
    Rejected,
    /// Pod bound to its node.
    Bound,
    /// Pod deletion in progress.
    Killing,
    /// Pod deleted.
    Killed,
    /// Pod failed.
    Failed,
    /// Pod finished.
    Completed,
}

impl TaskState {
    /// Every task state, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::New,
        Self::Pending,
        Self::Scheduling,
        Self::Allocated,
        Self::Rejected,
        Self::Bound,
        Self::Killing,
        Self::Killed,
        Self::Failed,
        Self::Completed,
    ];

    /// Whether the task will never change state again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Rejected | Self::Completed | Self::Failed | Self::Killed
        )
    }

    /// States where no allocation has been made yet.
    #[must_use]
    pub const fn is_unallocated(self) -> bool {
        matches!(self, Self::New | Self::Pending | Self::Scheduling)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a task's pod is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationType {
    /// Released by the resource manager.
    StopByRm,
    /// Placeholder timed out.
    Timeout,
    /// Preempted by the scheduler.
    PreemptedByScheduler,
    /// Placeholder swapped for a real task.
    PlaceholderReplaced,
    /// Reason not known.
    Unknown,
}

impl TerminationType {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StopByRm => "STOP_BY_RM",
            Self::Timeout => "TIMEOUT",
            Self::PreemptedByScheduler => "PREEMPTED_BY_SCHEDULER",
            Self::PlaceholderReplaced => "PLACEHOLDER_REPLACED",
            Self::Unknown => "UNKNOWN_TERMINATION_TYPE",
        }
    }

    /// Parse a wire name, mapping names this build does not know to
    /// [`Self::Unknown`].
    #[must_use]
    pub fn from_wire(s: &str) -> Self {
        s.parse().unwrap_or(Self::Unknown)
    }
}

impl FromStr for TerminationType {
    type Err = ShimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STOP_BY_RM" => Ok(Self::StopByRm),
            "TIMEOUT" => Ok(Self::Timeout),
            "PREEMPTED_BY_SCHEDULER" => Ok(Self::PreemptedByScheduler),
            "PLACEHOLDER_REPLACED" => Ok(Self::PlaceholderReplaced),
            "UNKNOWN_TERMINATION_TYPE" => Ok(Self::Unknown),
            other => Err(ShimError::MalformedEventArgs(format!(
                "unknown termination type {other}"
            ))),
        }
    }
}

impl fmt::Display for TerminationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to the pod backing a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PodRef {
    /// Pod namespace.
    pub namespace: String,
    /// Pod name.
    pub name: String,
    /// Pod uid.
    pub uid: String,
}

impl PodRef {
    /// Build a pod handle.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        uid: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: uid.into(),
        }
    }

    /// `namespace/name`.
    #[must_use]
    pub fn alias(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Task operations used by the application state machine.
///
/// Implementations are shared behind `Arc` and called while the owning
/// application's write lock is held, so every method must return promptly.
/// Mutating methods take `&self`; implementations provide their own
/// interior mutability.
pub trait ManagedTask: Send + Sync {
    /// Unique task identifier within the application.
    fn task_id(&self) -> &str;

    /// Current lifecycle state.
    fn state(&self) -> TaskState;

    /// Whether this task is a gang placeholder.
    fn is_placeholder(&self) -> bool;

    /// Task group this task belongs to, empty when none.
    fn task_group_name(&self) -> &str;

    /// Allocation identifier, once allocated.
    fn allocation_id(&self) -> Option<String>;

    /// Record the allocation identifier.
    fn set_allocation_id(&self, allocation_id: String);

    /// Creation time in unix milliseconds.
    fn create_time_ms(&self) -> u128;

    /// Underlying pod.
    fn pod(&self) -> &PodRef;

    /// Human readable pod reference.
    fn alias(&self) -> String {
        self.pod().alias()
    }

    /// Whether the task reached a terminal state.
    fn is_terminated(&self) -> bool {
        self.state().is_terminal()
    }

    /// Record why the task is being torn down.
    fn set_termination_type(&self, termination: TerminationType);

    /// Request deletion of the task's pod. Must not wait for the deletion.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::Task`] when the request cannot be issued.
    fn delete_task_pod(&self) -> Result<(), ShimError>;

    /// Check the task is ready to be scheduled.
    ///
    /// # Errors
    ///
    /// Returns an error describing why the task cannot be scheduled yet.
    fn sanity_check_before_scheduling(&self) -> Result<(), ShimError>;
}
