//! Tokio runtime adapters: background spawner and the scheduling loop.

pub mod schedule_loop;
pub mod tokio_spawner;

pub use schedule_loop::{ScheduleLoop, ScheduleLoopHandle};
pub use tokio_spawner::TokioSpawner;
