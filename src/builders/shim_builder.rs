//! Builder wiring configuration and collaborators into a running shim.

use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use tracing::info;

use crate::config::ShimConfig;
use crate::core::{
    AppResult, ApplicationRegistry, Dispatcher, EventCategory, EventHandler, EventRecorder,
    PlaceholderManager, RegisterResourceManagerRequest, ResourceManagerCallback, SchedulerApi,
    ShimServices, Spawn,
};
use crate::infra::LoggingRecorder;
#[cfg(feature = "tokio-runtime")]
use crate::runtime::{ScheduleLoop, TokioSpawner};

/// Collects collaborators and builds a [`Shim`].
pub struct ShimBuilder {
    config: ShimConfig,
    scheduler_api: Option<Arc<dyn SchedulerApi>>,
    placeholders: Option<Arc<dyn PlaceholderManager>>,
    recorder: Option<Arc<dyn EventRecorder>>,
    spawner: Option<Arc<dyn Spawn>>,
    task_event_handler: Option<EventHandler>,
}

impl ShimBuilder {
    /// Start from a configuration.
    #[must_use]
    pub fn new(config: ShimConfig) -> Self {
        Self {
            config,
            scheduler_api: None,
            placeholders: None,
            recorder: None,
            spawner: None,
            task_event_handler: None,
        }
    }

    /// Remote scheduler (required).
    #[must_use]
    pub fn with_scheduler_api(mut self, api: Arc<dyn SchedulerApi>) -> Self {
        self.scheduler_api = Some(api);
        self
    }

    /// Placeholder manager (required).
    #[must_use]
    pub fn with_placeholder_manager(mut self, manager: Arc<dyn PlaceholderManager>) -> Self {
        self.placeholders = Some(manager);
        self
    }

    /// Pod event recorder. Defaults to [`LoggingRecorder`].
    #[must_use]
    pub fn with_recorder(mut self, recorder: Arc<dyn EventRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Background spawner. Defaults to the current tokio runtime, or a
    /// dedicated one with `worker_threads` threads.
    #[must_use]
    pub fn with_spawner(mut self, spawner: Arc<dyn Spawn>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Handler for task events raised while scheduling.
    #[must_use]
    pub fn with_task_event_handler(mut self, handler: EventHandler) -> Self {
        self.task_event_handler = Some(handler);
        self
    }

    #[cfg(feature = "tokio-runtime")]
    fn default_spawner(config: &ShimConfig) -> AppResult<Arc<dyn Spawn>> {
        if let Some(spawner) = TokioSpawner::current() {
            return Ok(Arc::new(spawner));
        }
        let spawner = TokioSpawner::with_worker_threads(config.worker_threads)
            .context("failed to build tokio runtime")?;
        Ok(Arc::new(spawner))
    }

    #[cfg(not(feature = "tokio-runtime"))]
    fn default_spawner(_config: &ShimConfig) -> AppResult<Arc<dyn Spawn>> {
        Err(anyhow!("a spawner is required without the tokio-runtime feature"))
    }

    /// Validate the configuration and assemble the shim. Nothing is started.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, a missing required collaborator, or
    /// when the default runtime cannot be built.
    pub fn build(self) -> AppResult<Shim> {
        self.config.validate().context("invalid shim configuration")?;
        let scheduler_api = self
            .scheduler_api
            .ok_or_else(|| anyhow!("scheduler api is required"))?;
        let placeholders = self
            .placeholders
            .ok_or_else(|| anyhow!("placeholder manager is required"))?;
        let recorder = self
            .recorder
            .unwrap_or_else(|| Arc::new(LoggingRecorder));
        let spawner = match self.spawner {
            Some(spawner) => spawner,
            None => Self::default_spawner(&self.config)?,
        };

        let services = Arc::new(ShimServices {
            scheduler_api,
            placeholders,
            recorder,
            dispatcher: Dispatcher::new(self.config.dispatch_backlog_warn),
            spawner,
            rm_id: self.config.cluster_id.clone(),
        });
        Ok(Shim {
            config: self.config,
            registry: Arc::new(ApplicationRegistry::new(services)),
            task_event_handler: self.task_event_handler,
        })
    }
}

/// Assembled shim: configuration, registry and dispatcher.
pub struct Shim {
    config: ShimConfig,
    registry: Arc<ApplicationRegistry>,
    task_event_handler: Option<EventHandler>,
}

impl Shim {
    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ShimConfig {
        &self.config
    }

    /// Application registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ApplicationRegistry> {
        &self.registry
    }

    /// Event dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.registry.services().dispatcher
    }

    /// Register handlers, start the dispatcher and register with the
    /// scheduler.
    ///
    /// # Errors
    ///
    /// Fails when the dispatcher cannot start or registration is refused;
    /// the dispatcher is stopped again in the latter case.
    pub fn start(&self) -> AppResult<()> {
        let dispatcher = self.dispatcher();
        dispatcher.register_event_handler(
            EventCategory::App,
            self.registry.application_event_handler(),
        );
        if let Some(handler) = &self.task_event_handler {
            dispatcher.register_event_handler(EventCategory::Task, Arc::clone(handler));
        }
        dispatcher.start()?;

        let request = RegisterResourceManagerRequest {
            rm_id: self.config.cluster_id.clone(),
            policy_group: self.config.policy_group.clone(),
            version: self.config.cluster_version.clone(),
        };
        let callback: Arc<dyn ResourceManagerCallback> = self.registry.clone();
        if let Err(e) = self
            .registry
            .services()
            .scheduler_api
            .register_resource_manager(request, callback)
        {
            dispatcher.stop();
            return Err(e).context("failed to register resource manager");
        }
        info!(rm_id = %self.config.cluster_id, "shim started");
        Ok(())
    }

    /// Stop the dispatcher after draining queued events.
    pub fn stop(&self) {
        self.dispatcher().stop();
        info!(rm_id = %self.config.cluster_id, "shim stopped");
    }

    /// Scheduling loop over this shim's registry at the configured interval.
    #[cfg(feature = "tokio-runtime")]
    #[must_use]
    pub fn schedule_loop(&self) -> ScheduleLoop {
        ScheduleLoop::new(Arc::clone(&self.registry), self.config.scheduling_interval())
    }
}

impl fmt::Debug for Shim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shim")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("task_event_handler", &self.task_event_handler.is_some())
            .finish()
    }
}
