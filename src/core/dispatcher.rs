//! Ordered, single-consumer event dispatcher.
//!
//! Producers call [`Dispatcher::dispatch`] from any thread without blocking.
//! One consumer thread delivers events to the handler registered for their
//! category, strictly in dispatch order and one at a time. Handlers may
//! dispatch further events; those are queued behind everything already
//! pending.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use anyhow::Context;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::core::events::{EventCategory, SchedulingEvent};
use crate::core::AppResult;

/// Default backlog size above which a warning is logged.
pub const DEFAULT_BACKLOG_WARN: usize = 10_000;

/// Callback invoked on the consumer thread for each event of a category.
pub type EventHandler = Arc<dyn Fn(SchedulingEvent) + Send + Sync>;

enum Envelope {
    Event(SchedulingEvent),
    Stop,
}

/// Counters exposed by [`Dispatcher::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Events accepted into the queue.
    pub dispatched: u64,
    /// Events handed to a handler.
    pub delivered: u64,
    /// Events discarded (not running, or no handler).
    pub dropped: u64,
    /// Events waiting in the queue.
    pub pending: usize,
}

/// Running flag and live consumer. `dispatch` sends while holding this
/// lock, so no accepted event can land behind a stop marker.
#[derive(Default)]
struct Lifecycle {
    running: bool,
    /// Thread id of the consumer until it has exited.
    consumer: Option<ThreadId>,
}

struct Inner {
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
    handlers: RwLock<HashMap<EventCategory, EventHandler>>,
    lifecycle: Mutex<Lifecycle>,
    consumer_exited: Condvar,
    consumer: Mutex<Option<JoinHandle<()>>>,
    backlog_warn: usize,
    backlog_warned: AtomicBool,
    dispatched: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl Inner {
    fn deliver(&self, event: SchedulingEvent) {
        let category = event.category();
        let handler = self.handlers.read().get(&category).cloned();
        if let Some(handler) = handler {
            self.delivered.fetch_add(1, Ordering::Relaxed);
            handler(event);
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                ?category,
                app_id = event.app_id(),
                "no handler registered, event dropped"
            );
        }
    }

    fn run(&self) {
        let _exit = ConsumerExit(self);
        debug!("dispatcher consumer started");
        while let Ok(envelope) = self.rx.recv() {
            match envelope {
                Envelope::Event(event) => self.deliver(event),
                // A marker left behind by a stop that was followed by a
                // restart on this same consumer.
                Envelope::Stop if self.lifecycle.lock().running => {}
                Envelope::Stop => break,
            }
        }
    }
}

/// Clears the consumer marker when the consumer thread exits, including by
/// a handler panic.
struct ConsumerExit<'a>(&'a Inner);

impl Drop for ConsumerExit<'_> {
    fn drop(&mut self) {
        let mut lifecycle = self.0.lifecycle.lock();
        if lifecycle.consumer == Some(thread::current().id()) {
            lifecycle.consumer = None;
        }
        drop(lifecycle);
        self.0.consumer_exited.notify_all();
        debug!("dispatcher consumer exited");
    }
}

/// Cloneable handle to a shared dispatcher.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Create a stopped dispatcher that warns once the backlog exceeds
    /// `backlog_warn` events.
    #[must_use]
    pub fn new(backlog_warn: usize) -> Self {
        let (tx, rx) = unbounded();
        Self {
            inner: Arc::new(Inner {
                tx,
                rx,
                handlers: RwLock::new(HashMap::new()),
                lifecycle: Mutex::new(Lifecycle::default()),
                consumer_exited: Condvar::new(),
                consumer: Mutex::new(None),
                backlog_warn,
                backlog_warned: AtomicBool::new(false),
                dispatched: AtomicU64::new(0),
                delivered: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Register (or replace) the handler for `category`.
    pub fn register_event_handler(&self, category: EventCategory, handler: EventHandler) {
        self.inner.handlers.write().insert(category, handler);
    }

    /// Queue an event. Never blocks on the consumer; dropped with a warning
    /// when stopped. An event accepted here is always delivered before a
    /// concurrent `stop` returns.
    pub fn dispatch(&self, event: impl Into<SchedulingEvent>) {
        let event = event.into();
        let lifecycle = self.inner.lifecycle.lock();
        if !lifecycle.running {
            drop(lifecycle);
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                app_id = event.app_id(),
                ?event,
                "dispatcher not running, event dropped"
            );
            return;
        }
        if self.inner.tx.send(Envelope::Event(event)).is_err() {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.inner.dispatched.fetch_add(1, Ordering::Relaxed);
        drop(lifecycle);

        let pending = self.inner.rx.len();
        if pending > self.inner.backlog_warn {
            if !self.inner.backlog_warned.swap(true, Ordering::Relaxed) {
                warn!(
                    pending,
                    threshold = self.inner.backlog_warn,
                    "dispatcher backlog is high"
                );
            }
        } else {
            self.inner.backlog_warned.store(false, Ordering::Relaxed);
        }
    }

    /// Start the consumer thread. No-op if already running.
    ///
    /// After a `stop` issued from a handler, a start from another thread
    /// waits for the previous consumer to finish draining, so there is never
    /// more than one consumer. A start from inside a handler keeps the
    /// current consumer.
    ///
    /// # Errors
    ///
    /// Returns an error if the consumer thread cannot be spawned.
    pub fn start(&self) -> AppResult<()> {
        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.running {
            return Ok(());
        }
        if lifecycle.consumer == Some(thread::current().id()) {
            lifecycle.running = true;
            info!("dispatcher restarted on the current consumer");
            return Ok(());
        }
        while lifecycle.consumer.is_some() {
            self.inner.consumer_exited.wait(&mut lifecycle);
        }
        if lifecycle.running {
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name("shim-dispatcher".to_string())
            .spawn(move || inner.run())
            .context("failed to spawn dispatcher thread")?;
        lifecycle.running = true;
        lifecycle.consumer = Some(handle.thread().id());
        let previous = self.inner.consumer.lock().replace(handle);
        drop(lifecycle);

        if let Some(previous) = previous {
            if previous.join().is_err() {
                warn!("previous dispatcher consumer panicked");
            }
        }
        info!("dispatcher started");
        Ok(())
    }

    /// Stop accepting events, deliver everything already queued, then join
    /// the consumer. Idempotent. When called from a handler the consumer is
    /// not joined and exits after draining.
    pub fn stop(&self) {
        let handle = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if !lifecycle.running {
                return;
            }
            lifecycle.running = false;
            let _ = self.inner.tx.send(Envelope::Stop);
            if lifecycle.consumer == Some(thread::current().id()) {
                None
            } else {
                self.inner.consumer.lock().take()
            }
        };
        match handle {
            Some(handle) => {
                if handle.join().is_err() {
                    warn!("dispatcher consumer panicked");
                }
            }
            None => debug!("dispatcher stop requested from consumer thread"),
        }
        info!("dispatcher stopped");
    }

    /// Whether the dispatcher accepts events.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.lifecycle.lock().running
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            dispatched: self.inner.dispatched.load(Ordering::Relaxed),
            delivered: self.inner.delivered.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
            pending: self.inner.rx.len(),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_BACKLOG_WARN)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("running", &self.is_running())
            .field("stats", &self.stats())
            .finish()
    }
}
