//! Contracts for the components an application talks to.
//!
//! Nothing here performs I/O by itself. Implementations live in
//! [`crate::infra`] (in-memory backends) or in the embedding binary.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::dispatcher::Dispatcher;
use crate::core::resources::Resource;
use crate::core::task::PodRef;
use crate::core::task_group::{OwnerReference, TaskGroup, TaskGroupCounts};
use crate::core::ShimError;

/// Descriptor of one application submitted to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddApplicationRequest {
    /// Application identifier.
    pub application_id: String,
    /// Target queue.
    pub queue_name: String,
    /// Target partition.
    pub partition_name: String,
    /// Submitting user.
    pub user: String,
    /// Application tags.
    pub tags: BTreeMap<String, String>,
    /// Total placeholder ask, absent when the application has no gangs
    /// or is being recovered.
    pub placeholder_ask: Option<Resource>,
    /// Placeholder timeout forwarded to the scheduler.
    pub execution_timeout_ms: i64,
}

/// Batch update sent to the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// Applications to add.
    pub new_applications: Vec<AddApplicationRequest>,
    /// Resource manager identifier.
    pub rm_id: String,
}

/// Registration of this shim with the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResourceManagerRequest {
    /// Resource manager identifier.
    pub rm_id: String,
    /// Queue configuration group to load.
    pub policy_group: String,
    /// Shim version string.
    pub version: String,
}

/// Scheduler answer to a registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResourceManagerResponse {}

/// Application accepted by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedApplication {
    /// Application identifier.
    pub application_id: String,
}

/// Application rejected by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedApplication {
    /// Application identifier.
    pub application_id: String,
    /// Scheduler-provided reason.
    pub reason: String,
}

/// Asynchronous response to an [`UpdateRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResponse {
    /// Newly accepted applications.
    pub accepted: Vec<AcceptedApplication>,
    /// Rejected applications.
    pub rejected: Vec<RejectedApplication>,
}

/// Receives scheduler responses for a registered resource manager.
pub trait ResourceManagerCallback: Send + Sync {
    /// Handle an update response.
    ///
    /// # Errors
    ///
    /// Implementations report failures routing the response.
    fn recv_update_response(&self, response: UpdateResponse) -> Result<(), ShimError>;
}

/// Remote scheduler API.
pub trait SchedulerApi: Send + Sync {
    /// Hand an update to the scheduler. Must not wait on the scheduler's
    /// decision; results arrive through [`ResourceManagerCallback`].
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::SchedulerApi`] if the request was not accepted
    /// for delivery.
    fn update(&self, request: UpdateRequest) -> Result<(), ShimError>;

    /// Register this shim as a resource manager.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::SchedulerApi`] on registration failure.
    fn register_resource_manager(
        &self,
        request: RegisterResourceManagerRequest,
        callback: Arc<dyn ResourceManagerCallback>,
    ) -> Result<RegisterResourceManagerResponse, ShimError>;

    /// Ask the scheduler to reload its queue configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::SchedulerApi`] on failure.
    fn reload_configuration(&self, rm_id: &str) -> Result<(), ShimError>;
}

/// Snapshot of an application taken when it starts reserving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GangReservation {
    /// Application identifier.
    pub app_id: String,
    /// Namespace placeholders are created in.
    pub namespace: String,
    /// Queue name.
    pub queue: String,
    /// Submitting user.
    pub user: String,
    /// Gangs to reserve.
    pub task_groups: Vec<TaskGroup>,
    /// Owner references for placeholder pods.
    pub owner_references: Vec<OwnerReference>,
    /// Placeholders already known to the application, per group.
    pub existing_placeholders: TaskGroupCounts,
    /// Placeholder timeout in seconds.
    pub placeholder_timeout_secs: i64,
}

impl GangReservation {
    /// Placeholders still needed for `group`.
    #[must_use]
    pub fn missing_members(&self, group: &TaskGroup) -> u32 {
        group
            .min_member
            .saturating_sub(self.existing_placeholders.get(&group.name))
    }
}

/// Creates and tears down placeholder pods.
#[async_trait]
pub trait PlaceholderManager: Send + Sync {
    /// Create one placeholder per missing gang member.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::Placeholder`] when any creation fails. Pods
    /// created before the failure are left for [`Self::clean_up`].
    async fn create_app_placeholders(&self, reservation: &GangReservation) -> Result<(), ShimError>;

    /// Delete every placeholder of `app_id`. Best effort and idempotent.
    async fn clean_up(&self, app_id: &str);
}

/// Severity of a user-visible pod event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Informational.
    Normal,
    /// Something went wrong.
    Warning,
}

impl fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "Normal",
            Self::Warning => "Warning",
        })
    }
}

/// Publishes user-visible events against pods. Must not block.
pub trait EventRecorder: Send + Sync {
    /// Record a formatted event on `pod`.
    fn eventf(
        &self,
        pod: &PodRef,
        severity: EventSeverity,
        reason: &str,
        message: fmt::Arguments<'_>,
    );
}

/// Boxed unit of background work.
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Abstraction for spawning background work on a runtime.
pub trait Spawn: Send + Sync {
    /// Spawn a boxed future.
    fn spawn_boxed(&self, fut: BoxFuture);
}

impl dyn Spawn {
    /// Spawn a future.
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn_boxed(Box::pin(fut));
    }
}

/// Everything an application needs besides its own state.
#[derive(Clone)]
pub struct ShimServices {
    /// Remote scheduler.
    pub scheduler_api: Arc<dyn SchedulerApi>,
    /// Placeholder pod manager.
    pub placeholders: Arc<dyn PlaceholderManager>,
    /// Pod event recorder.
    pub recorder: Arc<dyn EventRecorder>,
    /// Event channel back into the state machines.
    pub dispatcher: Dispatcher,
    /// Runtime for background work.
    pub spawner: Arc<dyn Spawn>,
    /// Resource manager identifier sent with every update.
    pub rm_id: String,
}

impl fmt::Debug for ShimServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShimServices")
            .field("rm_id", &self.rm_id)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
