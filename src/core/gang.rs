//! Gang reservation decisions.
//!
//! An application with task groups first reserves `min_member` placeholders
//! per group. Regular tasks are only scheduled once every group has exactly
//! its desired number of bound placeholders, or once reservation has been
//! abandoned after a placeholder failure.

use crate::core::state::ApplicationState;
use crate::core::task::{ManagedTask, TaskState};
use crate::core::task_group::{TaskGroup, TaskGroupCounts};

/// Whether an accepted application must reserve before running.
///
/// Applications recovered with allocations already in place skip
/// reservation.
#[must_use]
pub fn should_reserve(task_groups: &[TaskGroup], allocated_tasks: usize) -> bool {
    !task_groups.is_empty() && allocated_tasks == 0
}

/// `min_member` per task group.
#[must_use]
pub fn desired_member_counts(task_groups: &[TaskGroup]) -> TaskGroupCounts {
    let mut counts = TaskGroupCounts::new();
    for tg in task_groups {
        counts.add(&tg.name, tg.min_member);
    }
    counts
}

/// Bound placeholders per task group.
pub fn bound_placeholder_counts<'a, I>(tasks: I) -> TaskGroupCounts
where
    I: IntoIterator<Item = &'a dyn ManagedTask>,
{
    let mut counts = TaskGroupCounts::new();
    for task in tasks {
        if task.is_placeholder() && task.state() == TaskState::Bound {
            counts.add_one(task.task_group_name());
        }
    }
    counts
}

/// All placeholders per task group, whatever their state.
pub fn placeholder_counts<'a, I>(tasks: I) -> TaskGroupCounts
where
    I: IntoIterator<Item = &'a dyn ManagedTask>,
{
    let mut counts = TaskGroupCounts::new();
    for task in tasks {
        if task.is_placeholder() {
            counts.add_one(task.task_group_name());
        }
    }
    counts
}

/// True when bound placeholders match `min_member` exactly for every group.
pub fn reservation_complete<'a, I>(task_groups: &[TaskGroup], tasks: I) -> bool
where
    I: IntoIterator<Item = &'a dyn ManagedTask>,
{
    desired_member_counts(task_groups) == bound_placeholder_counts(tasks)
}

/// Scheduling gate: placeholders only while reserving, regular tasks only
/// while running, nothing otherwise.
#[must_use]
pub const fn may_schedule(state: ApplicationState, is_placeholder: bool) -> bool {
    match state {
        ApplicationState::Reserving => is_placeholder,
        ApplicationState::Running => !is_placeholder,
        _ => false,
    }
}
