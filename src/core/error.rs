//! Error types for the application lifecycle core.

use thiserror::Error;

use crate::core::state::{ApplicationEventType, ApplicationState};

/// Errors produced by shim components.
#[derive(Debug, Error)]
pub enum ShimError {
    /// The event is not legal from the application's current state.
    #[error("event {event} inappropriate in current state {state}")]
    InvalidTransition {
        /// Event that was rejected.
        event: ApplicationEventType,
        /// State the application was in when the event arrived.
        state: ApplicationState,
    },
    /// Lookup of a task inside an application failed.
    #[error("task {task_id} doesn't exist in application {app_id}")]
    TaskNotFound {
        /// Application that was searched.
        app_id: String,
        /// Task identifier that was not found.
        task_id: String,
    },
    /// Lookup of an application in the registry failed.
    #[error("application {0} doesn't exist")]
    ApplicationNotFound(String),
    /// Event arguments did not match what the handler expects.
    #[error("malformed event arguments: {0}")]
    MalformedEventArgs(String),
    /// A transition table failed validation.
    #[error("invalid state machine definition: {0}")]
    InvalidStateMachine(String),
    /// A resource quantity string could not be parsed.
    #[error("invalid quantity `{0}`")]
    InvalidQuantity(String),
    /// The remote scheduler rejected or failed a request.
    #[error("scheduler api error: {0}")]
    SchedulerApi(String),
    /// Placeholder creation or cleanup failed.
    #[error("placeholder error: {0}")]
    Placeholder(String),
    /// A task-level collaborator call failed.
    #[error("task error: {0}")]
    Task(String),
    /// Configuration was rejected by validation.
    #[error("config invalid: {0}")]
    Config(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
