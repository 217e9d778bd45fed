//! Periodic scheduling driver.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::core::ApplicationRegistry;

/// Calls [`ApplicationRegistry::schedule_applications`] at a fixed interval.
#[derive(Debug)]
pub struct ScheduleLoop {
    registry: Arc<ApplicationRegistry>,
    interval: Duration,
}

impl ScheduleLoop {
    /// Loop over `registry` ticking every `interval`.
    #[must_use]
    pub const fn new(registry: Arc<ApplicationRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Start on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn spawn(self) -> ScheduleLoopHandle {
        self.spawn_on(&Handle::current())
    }

    /// Start on the given runtime.
    #[must_use]
    pub fn spawn_on(self, handle: &Handle) -> ScheduleLoopHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let join = handle.spawn(self.run(stop_rx));
        ScheduleLoopHandle { stop_tx, join }
    }

    async fn run(self, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval = ?self.interval, "schedule loop started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!("scheduling pass");
                    self.registry.schedule_applications();
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
        info!("schedule loop stopped");
    }
}

/// Handle to a running [`ScheduleLoop`]. Dropping it stops the loop.
#[derive(Debug)]
pub struct ScheduleLoopHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ScheduleLoopHandle {
    /// Ask the loop to stop after the current pass.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.join.await {
            warn!(error = %e, "schedule loop task failed");
        }
    }

    /// Whether the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
