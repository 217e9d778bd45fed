//! Placeholder pod management.
//!
//! [`PodPlaceholderManager`] turns a [`GangReservation`] into placeholder
//! pods through a [`PlaceholderPodClient`] and remembers what it created so
//! that [`PlaceholderManager::clean_up`] can delete them later.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::{
    GangReservation, OwnerReference, PlaceholderManager, PodRef, Quantity, ShimError, TaskGroup,
    Toleration,
};

/// Placeholder pod to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderPod {
    /// Pod name.
    pub name: String,
    /// Pod namespace.
    pub namespace: String,
    /// Owning application.
    pub app_id: String,
    /// Task group the pod reserves for.
    pub task_group: String,
    /// Queue of the owning application.
    pub queue: String,
    /// Resources to request.
    pub resources: BTreeMap<String, Quantity>,
    /// Node selector.
    pub node_selector: BTreeMap<String, String>,
    /// Tolerations.
    pub tolerations: Vec<Toleration>,
    /// Owner references.
    pub owner_references: Vec<OwnerReference>,
    /// Seconds before the scheduler may time the placeholder out.
    pub timeout_secs: i64,
}

impl PlaceholderPod {
    fn for_member(reservation: &GangReservation, group: &TaskGroup) -> Self {
        Self {
            name: placeholder_name(&group.name, &reservation.app_id),
            namespace: reservation.namespace.clone(),
            app_id: reservation.app_id.clone(),
            task_group: group.name.clone(),
            queue: reservation.queue.clone(),
            resources: group.min_resource.clone(),
            node_selector: group.node_selector.clone(),
            tolerations: group.tolerations.clone(),
            owner_references: reservation.owner_references.clone(),
            timeout_secs: reservation.placeholder_timeout_secs,
        }
    }
}

/// `tg-<group>-<app>-<10 random hex chars>`.
#[must_use]
pub fn placeholder_name(group: &str, app_id: &str) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(10)
        .collect();
    format!("tg-{group}-{app_id}-{suffix}")
}

/// Pod operations needed to manage placeholders.
#[async_trait]
pub trait PlaceholderPodClient: Send + Sync {
    /// Create a pod and return its handle.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::Placeholder`] when the pod cannot be created.
    async fn create_pod(&self, pod: PlaceholderPod) -> Result<PodRef, ShimError>;

    /// Delete a pod.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::Placeholder`] when the pod cannot be deleted.
    async fn delete_pod(&self, pod: &PodRef) -> Result<(), ShimError>;
}

/// Pod client that keeps pods in memory.
#[derive(Debug, Default)]
pub struct InMemoryPodClient {
    created: Mutex<Vec<PlaceholderPod>>,
    deleted: Mutex<Vec<PodRef>>,
    fail_after: Mutex<Option<usize>>,
}

impl InMemoryPodClient {
    /// Client that never fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every creation once `n` pods have been created.
    pub fn fail_after(&self, n: usize) {
        *self.fail_after.lock() = Some(n);
    }

    /// Pods created so far.
    #[must_use]
    pub fn created(&self) -> Vec<PlaceholderPod> {
        self.created.lock().clone()
    }

    /// Pods deleted so far.
    #[must_use]
    pub fn deleted(&self) -> Vec<PodRef> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl PlaceholderPodClient for InMemoryPodClient {
    async fn create_pod(&self, pod: PlaceholderPod) -> Result<PodRef, ShimError> {
        let limit = *self.fail_after.lock();
        let mut created = self.created.lock();
        if limit.is_some_and(|n| created.len() >= n) {
            return Err(ShimError::Placeholder(format!("failed to create pod {}", pod.name)));
        }
        let handle = PodRef::new(
            pod.namespace.clone(),
            pod.name.clone(),
            Uuid::new_v4().to_string(),
        );
        created.push(pod);
        Ok(handle)
    }

    async fn delete_pod(&self, pod: &PodRef) -> Result<(), ShimError> {
        self.deleted.lock().push(pod.clone());
        Ok(())
    }
}

/// [`PlaceholderManager`] backed by a pod client.
pub struct PodPlaceholderManager<C> {
    client: Arc<C>,
    placeholders: Mutex<HashMap<String, Vec<PodRef>>>,
}

impl<C: PlaceholderPodClient> PodPlaceholderManager<C> {
    /// Manager creating pods through `client`.
    #[must_use]
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            placeholders: Mutex::new(HashMap::new()),
        }
    }

    /// Pod client.
    #[must_use]
    pub const fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Placeholders currently tracked for `app_id`.
    #[must_use]
    pub fn tracked(&self, app_id: &str) -> Vec<PodRef> {
        self.placeholders
            .lock()
            .get(app_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl<C: PlaceholderPodClient> PlaceholderManager for PodPlaceholderManager<C> {
    async fn create_app_placeholders(
        &self,
        reservation: &GangReservation,
    ) -> Result<(), ShimError> {
        for group in &reservation.task_groups {
            let missing = reservation.missing_members(group);
            debug!(
                app_id = %reservation.app_id,
                task_group = %group.name,
                missing,
                "creating placeholders"
            );
            for _ in 0..missing {
                let pod = PlaceholderPod::for_member(reservation, group);
                let handle = self.client.create_pod(pod).await.map_err(|e| {
                    ShimError::Placeholder(format!(
                        "app {} task group {}: {e}",
                        reservation.app_id, group.name
                    ))
                })?;
                self.placeholders
                    .lock()
                    .entry(reservation.app_id.clone())
                    .or_default()
                    .push(handle);
            }
        }
        info!(app_id = %reservation.app_id, "placeholders created");
        Ok(())
    }

    async fn clean_up(&self, app_id: &str) {
        let pods = self.placeholders.lock().remove(app_id).unwrap_or_default();
        if pods.is_empty() {
            return;
        }
        info!(app_id, count = pods.len(), "cleaning up placeholders");
        for pod in pods {
            if let Err(e) = self.client.delete_pod(&pod).await {
                warn!(app_id, pod = %pod.alias(), error = %e, "failed to delete placeholder");
            }
        }
    }
}
