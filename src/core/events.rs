//! Event values carried by the dispatcher.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::state::ApplicationEventType;
use crate::core::task::TerminationType;
use crate::core::ShimError;

/// Handler category an event is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Application lifecycle events.
    App,
    /// Task lifecycle events.
    Task,
}

/// Application lifecycle event: `(application id, kind, args)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationEvent {
    app_id: String,
    event_type: ApplicationEventType,
    args: Vec<String>,
}

impl ApplicationEvent {
    /// Event with no arguments.
    #[must_use]
    pub fn simple(app_id: impl Into<String>, event_type: ApplicationEventType) -> Self {
        Self::with_args(app_id, event_type, Vec::new())
    }

    /// Event with explicit arguments.
    #[must_use]
    pub fn with_args(
        app_id: impl Into<String>,
        event_type: ApplicationEventType,
        args: Vec<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            event_type,
            args,
        }
    }

    /// `SubmitApplication`.
    #[must_use]
    pub fn submit(app_id: impl Into<String>) -> Self {
        Self::simple(app_id, ApplicationEventType::Submit)
    }

    /// `RunApplication`.
    #[must_use]
    pub fn run(app_id: impl Into<String>) -> Self {
        Self::simple(app_id, ApplicationEventType::Run)
    }

    /// `FailApplication` carrying a failure message.
    #[must_use]
    pub fn fail(app_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_args(app_id, ApplicationEventType::Fail, vec![message.into()])
    }

    /// `ReleaseAppAllocation` for every task holding `allocation_id`.
    #[must_use]
    pub fn release_allocation(
        app_id: impl Into<String>,
        termination: TerminationType,
        allocation_id: impl Into<String>,
    ) -> Self {
        Self::with_args(
            app_id,
            ApplicationEventType::ReleaseAllocation,
            vec![allocation_id.into(), termination.as_str().to_string()],
        )
    }

    /// `ReleaseAppAllocationAsk` for a single pending task.
    #[must_use]
    pub fn release_allocation_ask(
        app_id: impl Into<String>,
        task_id: impl Into<String>,
        termination: TerminationType,
    ) -> Self {
        Self::with_args(
            app_id,
            ApplicationEventType::ReleaseAllocationAsk,
            vec![task_id.into(), termination.as_str().to_string()],
        )
    }

    /// Application identifier.
    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Event kind.
    #[must_use]
    pub const fn event_type(&self) -> ApplicationEventType {
        self.event_type
    }

    /// Ordered arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Arguments as a fixed-size array.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::MalformedEventArgs`] unless exactly `N` arguments
    /// are present.
    pub fn args_exact<const N: usize>(&self) -> Result<[&str; N], ShimError> {
        if self.args.len() != N {
            return Err(ShimError::MalformedEventArgs(format!(
                "{} expects {N} argument(s), got {}",
                self.event_type,
                self.args.len()
            )));
        }
        Ok(std::array::from_fn(|i| self.args[i].as_str()))
    }
}

impl fmt::Display for ApplicationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.event_type, self.app_id)
    }
}

/// Task lifecycle event kinds raised by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskEventType {
    /// Move a `New` task towards `Pending`.
    InitTask,
}

/// Task lifecycle event: `(application id, task id, kind)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Owning application.
    pub app_id: String,
    /// Target task.
    pub task_id: String,
    /// Event kind.
    pub event: TaskEventType,
}

impl TaskEvent {
    /// `InitTask` for the given task.
    #[must_use]
    pub fn init(app_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            task_id: task_id.into(),
            event: TaskEventType::InitTask,
        }
    }
}

/// Anything the dispatcher can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulingEvent {
    /// Application lifecycle event.
    App(ApplicationEvent),
    /// Task lifecycle event.
    Task(TaskEvent),
}

impl SchedulingEvent {
    /// Routing category.
    #[must_use]
    pub const fn category(&self) -> EventCategory {
        match self {
            Self::App(_) => EventCategory::App,
            Self::Task(_) => EventCategory::Task,
        }
    }

    /// Application the event belongs to.
    #[must_use]
    pub fn app_id(&self) -> &str {
        match self {
            Self::App(ev) => ev.app_id(),
            Self::Task(ev) => &ev.app_id,
        }
    }
}

impl From<ApplicationEvent> for SchedulingEvent {
    fn from(ev: ApplicationEvent) -> Self {
        Self::App(ev)
    }
}

impl From<TaskEvent> for SchedulingEvent {
    fn from(ev: TaskEvent) -> Self {
        Self::Task(ev)
    }
}
