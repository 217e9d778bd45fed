//! In-memory and logging backends for the collaborator contracts.

pub mod placeholder;
pub mod recorder;
pub mod scheduler;
pub mod task;

pub use placeholder::{
    placeholder_name, InMemoryPodClient, PlaceholderPod, PlaceholderPodClient,
    PodPlaceholderManager,
};
pub use recorder::{InMemoryRecorder, LoggingRecorder, RecordedEvent};
pub use scheduler::InMemorySchedulerApi;
pub use task::InMemoryTask;
