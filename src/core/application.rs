//! Per-application lifecycle state machine.
//!
//! Every [`Application`] owns one `parking_lot::RwLock`. [`Application::handle`]
//! takes the write lock, fires the transition table and runs callbacks while
//! still holding it. Callbacks only see a `LockedApp`, which has no path
//! back to `handle` or to the public locking accessors. Slow work is spawned
//! and reports back by dispatching new events.
//!
//! Callback order on a state change: the destination state's enter callback,
//! the generic enter hook, then the event callback. A legal event whose
//! destination is the current state only runs the event callback.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::core::collaborators::{
    AddApplicationRequest, EventSeverity, GangReservation, ShimServices, UpdateRequest,
};
use crate::core::events::{ApplicationEvent, TaskEvent};
use crate::core::fsm::{StateMachine, Transition};
use crate::core::gang::{may_schedule, placeholder_counts, reservation_complete, should_reserve};
use crate::core::resources::{task_group_resource, Resource};
use crate::core::state::{application_transitions, ApplicationEventType, ApplicationState};
use crate::core::task::{ManagedTask, TaskState, TerminationType};
use crate::core::task_group::{OwnerReference, SchedulingPolicy, TaskGroup};
use crate::core::ShimError;

/// Partition every application is placed in.
pub const DEFAULT_PARTITION: &str = "default";

/// Tag holding the namespace placeholders are created in.
pub const APP_TAG_NAMESPACE: &str = "namespace";

/// Namespace used when the namespace tag is absent.
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone)]
struct AppMeta {
    id: String,
    queue: String,
    partition: String,
    user: String,
    tags: BTreeMap<String, String>,
}

struct AppInner {
    sm: StateMachine<ApplicationState, ApplicationEventType>,
    tasks: HashMap<String, Arc<dyn ManagedTask>>,
    policy: SchedulingPolicy,
    task_groups: Vec<TaskGroup>,
    owner_refs: Vec<OwnerReference>,
    placeholder_ask: Option<Resource>,
    placeholder_timeout_secs: i64,
}

impl AppInner {
    fn task_refs(&self) -> impl Iterator<Item = &dyn ManagedTask> + '_ {
        self.tasks.values().map(|t| &**t as &dyn ManagedTask)
    }

    /// Tasks in `state`, oldest first.
    fn tasks_in_state(&self, state: TaskState) -> Vec<Arc<dyn ManagedTask>> {
        let mut tasks: Vec<_> = self
            .tasks
            .values()
            .filter(|t| t.state() == state)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.create_time_ms());
        tasks
    }
}

/// Write-locked view handed to callbacks.
struct LockedApp<'a> {
    meta: &'a AppMeta,
    services: &'a ShimServices,
    inner: &'a mut AppInner,
}

impl LockedApp<'_> {
    fn update_request(&self, placeholder_ask: Option<Resource>) -> UpdateRequest {
        UpdateRequest {
            new_applications: vec![AddApplicationRequest {
                application_id: self.meta.id.clone(),
                queue_name: self.meta.queue.clone(),
                partition_name: self.meta.partition.clone(),
                user: self.meta.user.clone(),
                tags: self.meta.tags.clone(),
                placeholder_ask,
                execution_timeout_ms: self.inner.placeholder_timeout_secs.saturating_mul(1000),
            }],
            rm_id: self.services.rm_id.clone(),
        }
    }

    fn send_update(&self, request: UpdateRequest) {
        if let Err(e) = self.services.scheduler_api.update(request) {
            warn!(app_id = %self.meta.id, error = %e, "failed to submit app");
            self.services
                .dispatcher
                .dispatch(ApplicationEvent::fail(self.meta.id.clone(), e.to_string()));
        }
    }

    fn spawn_clean_up(&self) {
        let placeholders = Arc::clone(&self.services.placeholders);
        let app_id = self.meta.id.clone();
        self.services.spawner.spawn(async move {
            placeholders.clean_up(&app_id).await;
        });
    }
}

type Callback = fn(&LockedApp<'_>, &ApplicationEvent);

fn event_callback(kind: ApplicationEventType) -> Option<Callback> {
    match kind {
        ApplicationEventType::Submit => Some(on_submit),
        ApplicationEventType::Recover => Some(on_recover),
        ApplicationEventType::Reject => Some(on_reject),
        ApplicationEventType::Complete => Some(on_complete),
        ApplicationEventType::Fail => Some(on_fail),
        ApplicationEventType::UpdateReservation => Some(on_reservation_state_change),
        ApplicationEventType::ReleaseAllocation => Some(on_release_allocation),
        ApplicationEventType::ReleaseAllocationAsk => Some(on_release_allocation_ask),
        _ => None,
    }
}

fn state_callback(state: ApplicationState) -> Option<Callback> {
    match state {
        ApplicationState::Reserving => Some(on_reserving),
        _ => None,
    }
}

fn enter_state(
    app: &LockedApp<'_>,
    from: ApplicationState,
    to: ApplicationState,
    kind: ApplicationEventType,
) {
    debug!(app_id = %app.meta.id, %from, %to, event = %kind, "application state transition");
}

fn on_submit(app: &LockedApp<'_>, _event: &ApplicationEvent) {
    info!(
        app_id = %app.meta.id,
        queue = %app.meta.queue,
        rm_id = %app.services.rm_id,
        "handle app submission"
    );
    let request = app.update_request(app.inner.placeholder_ask.clone());
    app.send_update(request);
}

fn on_recover(app: &LockedApp<'_>, _event: &ApplicationEvent) {
    info!(
        app_id = %app.meta.id,
        queue = %app.meta.queue,
        rm_id = %app.services.rm_id,
        "handle app recovering"
    );
    let request = app.update_request(None);
    app.send_update(request);
}

fn on_reject(app: &LockedApp<'_>, _event: &ApplicationEvent) {
    info!(app_id = %app.meta.id, "app is rejected by scheduler");
    app.services.dispatcher.dispatch(ApplicationEvent::fail(
        app.meta.id.clone(),
        format!("application {} is rejected by scheduler", app.meta.id),
    ));
}

fn on_complete(app: &LockedApp<'_>, _event: &ApplicationEvent) {
    app.spawn_clean_up();
}

fn on_fail(app: &LockedApp<'_>, event: &ApplicationEvent) {
    app.spawn_clean_up();
    let [message] = match event.args_exact::<1>() {
        Ok(args) => args,
        Err(e) => {
            error!(app_id = %app.meta.id, error = %e, "fail to parse event arg");
            return;
        }
    };
    let unallocated = app
        .inner
        .tasks
        .values()
        .filter(|task| task.state().is_unallocated());
    for task in unallocated {
        app.services.recorder.eventf(
            task.pod(),
            EventSeverity::Warning,
            "ApplicationFailed",
            format_args!(
                "Application {} scheduling failed, reason: {}",
                app.meta.id, message
            ),
        );
    }
}

fn on_reserving(app: &LockedApp<'_>, _event: &ApplicationEvent) {
    let reservation = GangReservation {
        app_id: app.meta.id.clone(),
        namespace: app
            .meta
            .tags
            .get(APP_TAG_NAMESPACE)
            .map_or_else(|| DEFAULT_NAMESPACE.to_string(), Clone::clone),
        queue: app.meta.queue.clone(),
        user: app.meta.user.clone(),
        task_groups: app.inner.task_groups.clone(),
        owner_references: app.inner.owner_refs.clone(),
        existing_placeholders: placeholder_counts(app.inner.task_refs()),
        placeholder_timeout_secs: app.inner.placeholder_timeout_secs,
    };
    let placeholders = Arc::clone(&app.services.placeholders);
    let dispatcher = app.services.dispatcher.clone();
    app.services.spawner.spawn(async move {
        if let Err(e) = placeholders.create_app_placeholders(&reservation).await {
            warn!(
                app_id = %reservation.app_id,
                error = %e,
                "failed to create placeholders, moving app to running"
            );
            placeholders.clean_up(&reservation.app_id).await;
            dispatcher.dispatch(ApplicationEvent::run(reservation.app_id.clone()));
        }
    });
}

fn on_reservation_state_change(app: &LockedApp<'_>, _event: &ApplicationEvent) {
    if reservation_complete(&app.inner.task_groups, app.inner.task_refs()) {
        info!(app_id = %app.meta.id, "all gang members reserved");
        app.services
            .dispatcher
            .dispatch(ApplicationEvent::run(app.meta.id.clone()));
    }
}

fn release_args(event: &ApplicationEvent) -> Option<(&str, TerminationType)> {
    match event.args_exact::<2>() {
        Ok([id, termination]) => {
            let parsed = TerminationType::from_wire(termination);
            if parsed == TerminationType::Unknown && termination != parsed.as_str() {
                warn!(
                    app_id = %event.app_id(),
                    termination,
                    "unrecognised termination type, releasing as unknown"
                );
            }
            Some((id, parsed))
        }
        Err(e) => {
            error!(
                app_id = %event.app_id(),
                event = %event.event_type(),
                error = %e,
                "fail to parse event arg"
            );
            None
        }
    }
}

fn on_release_allocation(app: &LockedApp<'_>, event: &ApplicationEvent) {
    let Some((allocation_id, termination)) = release_args(event) else {
        return;
    };
    info!(
        app_id = %app.meta.id,
        allocation_id,
        %termination,
        "try to release pod from application"
    );
    for task in app.inner.tasks.values() {
        if task.allocation_id().as_deref() == Some(allocation_id) {
            task.set_termination_type(termination);
            if let Err(e) = task.delete_task_pod() {
                error!(
                    app_id = %app.meta.id,
                    task_id = task.task_id(),
                    error = %e,
                    "failed to release allocation from application"
                );
            }
        }
    }
}

fn on_release_allocation_ask(app: &LockedApp<'_>, event: &ApplicationEvent) {
    let Some((task_id, termination)) = release_args(event) else {
        return;
    };
    info!(
        app_id = %app.meta.id,
        task_id,
        %termination,
        "try to release pod from application"
    );
    let Some(task) = app.inner.tasks.get(task_id) else {
        warn!(app_id = %app.meta.id, task_id, "task not found");
        return;
    };
    task.set_termination_type(termination);
    if task.is_placeholder() {
        if let Err(e) = task.delete_task_pod() {
            error!(
                app_id = %app.meta.id,
                task_id,
                error = %e,
                "failed to release allocation ask from application"
            );
        }
    } else {
        warn!(
            app_id = %app.meta.id,
            task_id,
            "skip to release allocation ask, ask is not a placeholder"
        );
    }
}

/// An application and its tasks.
pub struct Application {
    meta: AppMeta,
    services: Arc<ShimServices>,
    inner: RwLock<AppInner>,
}

impl Application {
    /// Create an application in `New` with no tasks.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        queue: impl Into<String>,
        user: impl Into<String>,
        tags: BTreeMap<String, String>,
        services: Arc<ShimServices>,
    ) -> Self {
        Self {
            meta: AppMeta {
                id: id.into(),
                queue: queue.into(),
                partition: DEFAULT_PARTITION.to_string(),
                user: user.into(),
                tags,
            },
            services,
            inner: RwLock::new(AppInner {
                sm: StateMachine::new(ApplicationState::New, application_transitions()),
                tasks: HashMap::new(),
                policy: SchedulingPolicy::default(),
                task_groups: Vec::new(),
                owner_refs: Vec::new(),
                placeholder_ask: None,
                placeholder_timeout_secs: 0,
            }),
        }
    }

    /// Application identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    /// Queue name.
    #[must_use]
    pub fn queue(&self) -> &str {
        &self.meta.queue
    }

    /// Partition name.
    #[must_use]
    pub fn partition(&self) -> &str {
        &self.meta.partition
    }

    /// Submitting user.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.meta.user
    }

    /// Tags.
    #[must_use]
    pub const fn tags(&self) -> &BTreeMap<String, String> {
        &self.meta.tags
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ApplicationState {
        self.inner.read().sm.current()
    }

    /// Apply `event` to the state machine and run its callbacks.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::InvalidTransition`] if the event is not legal from
    /// the current state; the state is left unchanged.
    pub fn handle(&self, event: &ApplicationEvent) -> Result<(), ShimError> {
        let mut guard = self.inner.write();
        let kind = event.event_type();
        let Some(transition) = guard.sm.fire(kind) else {
            return Err(ShimError::InvalidTransition {
                event: kind,
                state: guard.sm.current(),
            });
        };
        let locked = LockedApp {
            meta: &self.meta,
            services: &self.services,
            inner: &mut *guard,
        };
        if let Transition::Moved { from, to } = transition {
            if let Some(callback) = state_callback(to) {
                callback(&locked, event);
            }
            enter_state(&locked, from, to, kind);
        }
        if let Some(callback) = event_callback(kind) {
            callback(&locked, event);
        }
        Ok(())
    }

    /// Whether `event` is legal from the current state.
    #[must_use]
    pub fn can_handle(&self, event: &ApplicationEvent) -> bool {
        self.inner.read().sm.can(event.event_type())
    }

    /// Add a task. A task id already present is left untouched.
    pub fn add_task(&self, task: Arc<dyn ManagedTask>) {
        let mut inner = self.inner.write();
        let task_id = task.task_id().to_string();
        inner.tasks.entry(task_id).or_insert(task);
    }

    /// Remove a task.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::TaskNotFound`] if no such task exists.
    pub fn remove_task(&self, task_id: &str) -> Result<(), ShimError> {
        let mut inner = self.inner.write();
        if inner.tasks.remove(task_id).is_some() {
            info!(app_id = %self.meta.id, task_id, "task removed");
            Ok(())
        } else {
            Err(self.task_not_found(task_id))
        }
    }

    /// Look up a task.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::TaskNotFound`] if no such task exists.
    pub fn get_task(&self, task_id: &str) -> Result<Arc<dyn ManagedTask>, ShimError> {
        self.inner
            .read()
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| self.task_not_found(task_id))
    }

    fn task_not_found(&self, task_id: &str) -> ShimError {
        ShimError::TaskNotFound {
            app_id: self.meta.id.clone(),
            task_id: task_id.to_string(),
        }
    }

    /// Tasks in `state`, oldest first.
    #[must_use]
    pub fn tasks_in_state(&self, state: TaskState) -> Vec<Arc<dyn ManagedTask>> {
        self.inner.read().tasks_in_state(state)
    }

    /// Tasks in `New`, oldest first.
    #[must_use]
    pub fn new_tasks(&self) -> Vec<Arc<dyn ManagedTask>> {
        self.tasks_in_state(TaskState::New)
    }

    /// Tasks in `Pending`, oldest first.
    #[must_use]
    pub fn pending_tasks(&self) -> Vec<Arc<dyn ManagedTask>> {
        self.tasks_in_state(TaskState::Pending)
    }

    /// Tasks in `Allocated`, oldest first.
    #[must_use]
    pub fn allocated_tasks(&self) -> Vec<Arc<dyn ManagedTask>> {
        self.tasks_in_state(TaskState::Allocated)
    }

    /// Number of tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.inner.read().tasks.len()
    }

    /// Aliases of every task not in a terminal state, sorted.
    #[must_use]
    pub fn non_terminated_task_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self
            .inner
            .read()
            .tasks
            .values()
            .filter(|t| !t.is_terminated())
            .map(|t| t.alias())
            .collect();
        aliases.sort();
        aliases
    }

    /// Scheduling policy.
    #[must_use]
    pub fn scheduling_policy(&self) -> SchedulingPolicy {
        self.inner.read().policy.clone()
    }

    /// Replace the scheduling policy.
    pub fn set_scheduling_policy(&self, policy: SchedulingPolicy) {
        self.inner.write().policy = policy;
    }

    /// Task groups.
    #[must_use]
    pub fn task_groups(&self) -> Vec<TaskGroup> {
        self.inner.read().task_groups.clone()
    }

    /// Replace the task groups and add their resources to the placeholder
    /// ask. The ask only ever grows.
    pub fn set_task_groups(&self, task_groups: Vec<TaskGroup>) {
        let mut inner = self.inner.write();
        let mut ask = inner.placeholder_ask.take().unwrap_or_default();
        for tg in &task_groups {
            ask = ask.add(&task_group_resource(&tg.min_resource, tg.min_member));
        }
        inner.placeholder_ask = Some(ask);
        inner.task_groups = task_groups;
    }

    /// Aggregated placeholder ask, `None` until task groups are set.
    #[must_use]
    pub fn placeholder_ask(&self) -> Option<Resource> {
        self.inner.read().placeholder_ask.clone()
    }

    /// Placeholder timeout in seconds.
    #[must_use]
    pub fn placeholder_timeout(&self) -> i64 {
        self.inner.read().placeholder_timeout_secs
    }

    /// Set the placeholder timeout in seconds.
    pub fn set_placeholder_timeout(&self, seconds: i64) {
        self.inner.write().placeholder_timeout_secs = seconds;
    }

    /// Owner references stamped on placeholders.
    #[must_use]
    pub fn owner_references(&self) -> Vec<OwnerReference> {
        self.inner.read().owner_refs.clone()
    }

    /// Set the owner references stamped on placeholders.
    pub fn set_owner_references(&self, refs: Vec<OwnerReference>) {
        self.inner.write().owner_refs = refs;
    }

    /// Re-register this application with the scheduler after a restart.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::InvalidTransition`] unless the application is `New`.
    pub fn trigger_app_recovery(&self) -> Result<(), ShimError> {
        self.handle(&ApplicationEvent::simple(
            self.meta.id.clone(),
            ApplicationEventType::Recover,
        ))
    }

    /// Advance the application by at most one step. Called periodically.
    pub fn schedule(&self) {
        match self.state() {
            ApplicationState::New => {
                if let Err(e) = self.handle(&ApplicationEvent::submit(self.meta.id.clone())) {
                    warn!(app_id = %self.meta.id, error = %e, "failed to handle SUBMIT app event");
                }
            }
            ApplicationState::Accepted => self.post_app_accepted(),
            state @ (ApplicationState::Reserving | ApplicationState::Running) => {
                self.schedule_tasks(state);
            }
            state => {
                debug!(app_id = %self.meta.id, %state, "skipping scheduling application");
            }
        }
    }

    fn post_app_accepted(&self) {
        let (reserve, task_groups, allocated) = {
            let inner = self.inner.read();
            let allocated = inner
                .task_refs()
                .filter(|t| t.state() == TaskState::Allocated)
                .count();
            (
                should_reserve(&inner.task_groups, allocated),
                inner.task_groups.len(),
                allocated,
            )
        };
        debug!(app_id = %self.meta.id, task_groups, allocated, "post app accepted");
        let event = if reserve {
            info!(
                app_id = %self.meta.id,
                "app has task groups defined, trying to reserve resources for gang members"
            );
            ApplicationEvent::simple(self.meta.id.clone(), ApplicationEventType::TryReserve)
        } else {
            ApplicationEvent::run(self.meta.id.clone())
        };
        self.services.dispatcher.dispatch(event);
    }

    fn schedule_tasks(&self, state: ApplicationState) {
        for task in self.new_tasks() {
            if !may_schedule(state, task.is_placeholder()) {
                continue;
            }
            match task.sanity_check_before_scheduling() {
                Ok(()) => self
                    .services
                    .dispatcher
                    .dispatch(TaskEvent::init(self.meta.id.clone(), task.task_id())),
                Err(e) => {
                    self.services.recorder.eventf(
                        task.pod(),
                        EventSeverity::Warning,
                        "FailedScheduling",
                        format_args!("{e}"),
                    );
                    debug!(
                        app_id = %self.meta.id,
                        task_id = task.task_id(),
                        error = %e,
                        "task is not ready for scheduling"
                    );
                }
            }
        }
    }

    /// Overwrite the lifecycle state without running callbacks.
    #[doc(hidden)]
    pub fn force_state(&self, state: ApplicationState) {
        self.inner.write().sm.set_state(state);
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        write!(
            f,
            "application {} (queue {}, partition {}, tasks {}, state {})",
            self.meta.id,
            self.meta.queue,
            self.meta.partition,
            inner.tasks.len(),
            inner.sm.current()
        )
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("id", &self.meta.id)
            .field("queue", &self.meta.queue)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
