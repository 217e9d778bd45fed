//! Registry of live applications.
//!
//! Routes dispatched application events to their application and turns
//! scheduler responses into `Accept` / `Reject` events.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::core::application::Application;
use crate::core::collaborators::{ResourceManagerCallback, ShimServices, UpdateResponse};
use crate::core::dispatcher::EventHandler;
use crate::core::events::{ApplicationEvent, SchedulingEvent};
use crate::core::state::ApplicationEventType;
use crate::core::task_group::{OwnerReference, SchedulingPolicy, TaskGroup};
use crate::core::ShimError;

/// Everything needed to register an application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationMetadata {
    /// Application identifier.
    pub app_id: String,
    /// Queue name.
    pub queue: String,
    /// Submitting user.
    pub user: String,
    /// Application tags.
    pub tags: BTreeMap<String, String>,
    /// Gang definitions.
    pub task_groups: Vec<TaskGroup>,
    /// Scheduling policy.
    pub scheduling_policy: SchedulingPolicy,
    /// Owner references for placeholder pods.
    pub owner_references: Vec<OwnerReference>,
    /// Placeholder timeout in seconds.
    pub placeholder_timeout_secs: i64,
}

/// Applications keyed by id.
#[derive(Debug)]
pub struct ApplicationRegistry {
    services: Arc<ShimServices>,
    apps: RwLock<HashMap<String, Arc<Application>>>,
}

impl ApplicationRegistry {
    /// Empty registry whose applications share `services`.
    #[must_use]
    pub fn new(services: Arc<ShimServices>) -> Self {
        Self {
            services,
            apps: RwLock::new(HashMap::new()),
        }
    }

    /// Services handed to every application.
    #[must_use]
    pub fn services(&self) -> &Arc<ShimServices> {
        &self.services
    }

    /// Register an application. Returns the existing one if the id is known.
    pub fn add_application(&self, meta: ApplicationMetadata) -> Arc<Application> {
        let mut apps = self.apps.write();
        if let Some(existing) = apps.get(&meta.app_id) {
            debug!(app_id = %meta.app_id, "application already registered");
            return Arc::clone(existing);
        }
        let app = Arc::new(Application::new(
            meta.app_id.clone(),
            meta.queue,
            meta.user,
            meta.tags,
            Arc::clone(&self.services),
        ));
        app.set_scheduling_policy(meta.scheduling_policy);
        if !meta.task_groups.is_empty() {
            app.set_task_groups(meta.task_groups);
        }
        app.set_owner_references(meta.owner_references);
        app.set_placeholder_timeout(meta.placeholder_timeout_secs);
        info!(app_id = %meta.app_id, queue = %app.queue(), "application added");
        apps.insert(meta.app_id, Arc::clone(&app));
        app
    }

    /// Look up an application.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::ApplicationNotFound`] if the id is unknown.
    pub fn get_application(&self, app_id: &str) -> Result<Arc<Application>, ShimError> {
        self.apps
            .read()
            .get(app_id)
            .cloned()
            .ok_or_else(|| ShimError::ApplicationNotFound(app_id.to_string()))
    }

    /// Forget an application.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::ApplicationNotFound`] if the id is unknown.
    pub fn remove_application(&self, app_id: &str) -> Result<(), ShimError> {
        if self.apps.write().remove(app_id).is_some() {
            info!(app_id, "application removed");
            Ok(())
        } else {
            Err(ShimError::ApplicationNotFound(app_id.to_string()))
        }
    }

    /// Snapshot of every registered application.
    #[must_use]
    pub fn applications(&self) -> Vec<Arc<Application>> {
        self.apps.read().values().cloned().collect()
    }

    /// Route one application event.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::ApplicationNotFound`] for unknown applications or
    /// the application's own transition error.
    pub fn handle_application_event(&self, event: &ApplicationEvent) -> Result<(), ShimError> {
        self.get_application(event.app_id())?.handle(event)
    }

    /// Dispatcher handler for the application category. Holds only a weak
    /// reference to the registry.
    #[must_use]
    pub fn application_event_handler(self: &Arc<Self>) -> EventHandler {
        let registry: Weak<Self> = Arc::downgrade(self);
        Arc::new(move |event: SchedulingEvent| {
            let SchedulingEvent::App(event) = event else {
                return;
            };
            let Some(registry) = registry.upgrade() else {
                debug!(app_id = event.app_id(), "registry dropped, event ignored");
                return;
            };
            if let Err(e) = registry.handle_application_event(&event) {
                warn!(
                    app_id = event.app_id(),
                    event = %event.event_type(),
                    error = %e,
                    "failed to handle application event"
                );
            }
        })
    }

    /// Run one scheduling step on every application.
    pub fn schedule_applications(&self) {
        for app in self.applications() {
            app.schedule();
        }
    }

    fn dispatch_if_known(&self, app_id: &str, kind: ApplicationEventType) {
        if self.apps.read().contains_key(app_id) {
            self.services
                .dispatcher
                .dispatch(ApplicationEvent::simple(app_id, kind));
        } else {
            warn!(app_id, event = %kind, "scheduler response for unknown application");
        }
    }
}

impl ResourceManagerCallback for ApplicationRegistry {
    fn recv_update_response(&self, response: UpdateResponse) -> Result<(), ShimError> {
        for accepted in &response.accepted {
            info!(app_id = %accepted.application_id, "application accepted by scheduler");
            self.dispatch_if_known(&accepted.application_id, ApplicationEventType::Accept);
        }
        for rejected in &response.rejected {
            info!(
                app_id = %rejected.application_id,
                reason = %rejected.reason,
                "application rejected by scheduler"
            );
            self.dispatch_if_known(&rejected.application_id, ApplicationEventType::Reject);
        }
        Ok(())
    }
}
