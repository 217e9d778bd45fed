//! Application lifecycle, gang reservation and event dispatch.

pub mod application;
pub mod collaborators;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod fsm;
pub mod gang;
pub mod registry;
pub mod resources;
pub mod state;
pub mod task;
pub mod task_group;

pub use application::{Application, APP_TAG_NAMESPACE, DEFAULT_NAMESPACE, DEFAULT_PARTITION};
pub use collaborators::{
    AcceptedApplication, AddApplicationRequest, BoxFuture, EventRecorder, EventSeverity,
    GangReservation, PlaceholderManager, RegisterResourceManagerRequest,
    RegisterResourceManagerResponse, RejectedApplication, ResourceManagerCallback, SchedulerApi,
    ShimServices, Spawn, UpdateRequest, UpdateResponse,
};
pub use dispatcher::{Dispatcher, DispatcherStats, EventHandler};
pub use error::{AppResult, ShimError};
pub use events::{ApplicationEvent, EventCategory, SchedulingEvent, TaskEvent, TaskEventType};
pub use registry::{ApplicationMetadata, ApplicationRegistry};
pub use resources::{task_group_resource, Quantity, Resource};
pub use state::{ApplicationEventType, ApplicationState};
pub use task::{ManagedTask, PodRef, TaskState, TerminationType};
pub use task_group::{
    task_groups_from_json, OwnerReference, SchedulingPolicy, SchedulingPolicyType, TaskGroup,
    TaskGroupCounts, Toleration,
};
