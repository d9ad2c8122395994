// ============================================================================
// gymnast-core/src/bus/mod.rs
// ============================================================================
//
// MESSAGE BUS: In-process command/event bus
//
// This module decouples the pipeline stages (discovery, probing, transcoding,
// console rendering) from one another. Producers hand a message to
// `MessageBus::publish`; the bus classifies it by concrete type and routes it.
//
// KEY COMPONENTS:
// - Message / Command / Event: the message taxonomy
// - DependencyRegistry: named resources handlers declare with `Requires`
// - Command channel: one handler per type, synchronous, returns a value
// - Event channel: many handlers per type, delivered in publish order by a
//   single background worker
//
// LIFECYCLE:
// `MessageBus::new` starts the delivery worker. `shutdown` closes the queue,
// waits for already-published events to be delivered and clears every
// registry. Handlers usually hold a clone of the bus, so teardown has to be
// explicit.

mod command;
mod dependencies;
mod error;
mod event;
mod handler;
mod message;
mod queue;

pub use dependencies::{Dependencies, Dependency, DependencyRegistry, is_valid_identifier};
pub use error::{BusError, BusResult};
pub use event::BusStats;
pub use handler::Requires;
pub use message::{Command, Event, Message, MessageKind};
pub use queue::SaturationPolicy;

use std::any::Any;
use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use command::CommandChannel;
use event::{Counters, DeliveryWorker, Envelope, EventRegistry};
use message::{KindTable, MessageType};
use queue::{Closed, DeliveryQueue, Pushed};

/// Output of a command as returned by the type-erased entry points.
pub type Reply = Box<dyn Any + Send>;

/// Default name of the delivery worker thread.
pub const DEFAULT_WORKER_NAME: &str = "gymnast-events";

/// Tuning for the event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Maximum number of pending events, `None` for unbounded.
    pub queue_capacity: Option<usize>,
    /// What to do when a bounded queue is full.
    pub saturation: SaturationPolicy,
    /// Name given to the delivery worker thread.
    pub worker_name: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: None,
            saturation: SaturationPolicy::Block,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
        }
    }
}

impl BusConfig {
    pub fn bounded(capacity: usize, saturation: SaturationPolicy) -> Self {
        Self {
            queue_capacity: Some(capacity),
            saturation,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> BusResult<()> {
        if self.queue_capacity == Some(0) {
            return Err(BusError::InvalidConfig(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        if self.worker_name.trim().is_empty() {
            return Err(BusError::InvalidConfig(
                "worker name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Registries owned by one bus. The delivery worker clears them after the
/// last queued event has been delivered.
#[derive(Clone)]
pub(crate) struct Registries {
    pub dependencies: Arc<DependencyRegistry>,
    pub commands: Arc<CommandChannel>,
    pub events: Arc<EventRegistry>,
}

impl Registries {
    fn new() -> Self {
        Self {
            dependencies: Arc::new(DependencyRegistry::new()),
            commands: Arc::new(CommandChannel::default()),
            events: Arc::new(EventRegistry::default()),
        }
    }

    pub(crate) fn clear(&self) {
        self.commands.clear();
        self.events.clear();
        self.dependencies.clear();
    }
}

struct BusInner {
    config: BusConfig,
    kinds: KindTable,
    dependencies: Arc<DependencyRegistry>,
    commands: Arc<CommandChannel>,
    events: Arc<EventRegistry>,
    queue: Arc<DeliveryQueue<Envelope>>,
    counters: Arc<Counters>,
    worker: DeliveryWorker,
}

impl Drop for BusInner {
    fn drop(&mut self) {
        self.queue.close();
        self.worker.join();
    }
}

/// Handle to an in-process message bus. Clones share the same bus.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl MessageBus {
    /// Creates a bus with an unbounded queue and starts its delivery worker.
    pub fn new() -> BusResult<Self> {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> BusResult<Self> {
        config.validate()?;
        let queue = Arc::new(DeliveryQueue::new(config.queue_capacity, config.saturation));
        let registries = Registries::new();
        let counters = Arc::new(Counters::default());
        let worker = DeliveryWorker::spawn(
            &config.worker_name,
            Arc::clone(&queue),
            registries.clone(),
            Arc::clone(&counters),
        )?;

        Ok(Self {
            inner: Arc::new(BusInner {
                config,
                kinds: KindTable::default(),
                dependencies: registries.dependencies,
                commands: registries.commands,
                events: registries.events,
                queue,
                counters,
                worker,
            }),
        })
    }

    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    // ---- Dependencies ----

    /// Registers or overwrites a named dependency.
    pub fn set_dependency<T: Any + Send + Sync>(&self, name: &str, value: T) -> BusResult<()> {
        self.inner.dependencies.set(name, Arc::new(value))
    }

    /// Registers several dependencies, one overwrite at a time, in order.
    pub fn set_dependencies<I, K>(&self, values: I) -> BusResult<()>
    where
        I: IntoIterator<Item = (K, Dependency)>,
        K: AsRef<str>,
    {
        self.inner.dependencies.set_many(values)
    }

    pub fn dependencies(&self) -> &DependencyRegistry {
        &self.inner.dependencies
    }

    // ---- Subscription ----

    /// Makes a message type known to the bus without subscribing to it, so
    /// `publish_any` can classify it.
    pub fn register_message<M: Message>(&self) {
        self.inner.kinds.record::<M>();
    }

    /// Registers the single handler for command type `C`.
    pub fn subscribe_command<C, F>(&self, requires: Requires, handler: F) -> BusResult<()>
    where
        C: Command,
        F: Fn(C, &Dependencies) -> anyhow::Result<C::Output> + Send + Sync + 'static,
    {
        let ty = MessageType::of::<C>().ensure_kind(MessageKind::Command)?;
        self.inner.commands.ensure_vacant(ty)?;
        let adapted = handler::adapt_command::<C, F>(&self.inner.dependencies, requires, handler)?;
        self.inner.commands.subscribe(ty, adapted)?;
        self.inner.kinds.record::<C>();
        Ok(())
    }

    /// Appends a handler for event type `E`.
    pub fn subscribe_event<E, F>(&self, requires: Requires, handler: F) -> BusResult<()>
    where
        E: Event,
        F: Fn(&E, &Dependencies) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let ty = MessageType::of::<E>().ensure_kind(MessageKind::Event)?;
        let adapted = handler::adapt_event::<E, F>(&self.inner.dependencies, requires, handler)?;
        self.inner.events.subscribe(ty, adapted);
        self.inner.kinds.record::<E>();
        Ok(())
    }

    pub fn has_command_handler<C: Command>(&self) -> bool {
        self.inner.commands.contains(MessageType::of::<C>())
    }

    pub fn event_handler_count<E: Event>(&self) -> usize {
        self.inner.events.count(MessageType::of::<E>().id)
    }

    // ---- Publishing ----

    /// Routes a message by its kind. Commands return `Some(reply)` once their
    /// handler has finished; events are queued and return `None` right away.
    pub fn publish<M: Message>(&self, message: M) -> BusResult<Option<Reply>> {
        let ty = self.inner.kinds.record::<M>();
        self.route(ty, Box::new(message))
    }

    /// Same as [`publish`](Self::publish) for a message whose type has been
    /// erased. The type must have been seen by the bus before.
    pub fn publish_any(&self, message: Box<dyn Any + Send>) -> BusResult<Option<Reply>> {
        let ty = self.inner.kinds.classify(message.as_ref())?;
        self.route(ty, message)
    }

    /// Runs a command and returns its typed output.
    pub fn execute<C: Command>(&self, command: C) -> BusResult<C::Output> {
        let ty = self.inner.kinds.record::<C>().ensure_kind(MessageKind::Command)?;
        let reply = self.dispatch_command(ty, Box::new(command))?;
        reply
            .downcast::<C::Output>()
            .map(|output| *output)
            .map_err(|_| BusError::UnexpectedType(ty.name))
    }

    /// Queues an event for delivery.
    pub fn emit<E: Event>(&self, event: E) -> BusResult<()> {
        let ty = self.inner.kinds.record::<E>().ensure_kind(MessageKind::Event)?;
        self.dispatch_event(ty, Box::new(event))
    }

    fn route(&self, ty: MessageType, message: Box<dyn Any + Send>) -> BusResult<Option<Reply>> {
        match ty.kind {
            MessageKind::Command => self.dispatch_command(ty, message).map(Some),
            MessageKind::Event => self.dispatch_event(ty, message).map(|()| None),
        }
    }

    fn dispatch_command(&self, ty: MessageType, command: Box<dyn Any + Send>) -> BusResult<Reply> {
        if !self.is_running() {
            return Err(BusError::Stopped);
        }
        self.inner.commands.dispatch(ty, command)
    }

    fn dispatch_event(&self, ty: MessageType, message: Box<dyn Any + Send>) -> BusResult<()> {
        let inner = &self.inner;
        let may_block = !inner.worker.is_current_thread();
        match inner.queue.push(Envelope { ty, message }, may_block) {
            Ok(Pushed::Queued) => {
                inner.counters.published.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Ok(Pushed::Dropped(dropped)) => {
                inner.counters.published.fetch_add(1, Ordering::Relaxed);
                inner.counters.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "Event queue full ({} policy), dropped {}",
                    inner.config.saturation,
                    dropped.ty.name
                );
                Ok(())
            }
            Err(Closed(_)) => Err(BusError::Stopped),
        }
    }

    // ---- Lifecycle ----

    pub fn is_running(&self) -> bool {
        !self.inner.queue.is_closed()
    }

    pub fn stats(&self) -> BusStats {
        self.inner.counters.snapshot(self.inner.queue.len())
    }

    /// Stops the bus: no new messages are accepted, pending events are
    /// delivered, then the worker clears all registries and exits.
    ///
    /// Safe to call more than once and from several threads; every caller
    /// returns after the worker has finished. When called from inside an event
    /// handler the worker is not joined; it delivers what is still queued and
    /// then stops on its own.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        if inner.queue.close() {
            log::debug!("Shutting down message bus");
        }
        inner.worker.join();
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("config", &self.inner.config)
            .field("running", &self.is_running())
            .field("stats", &self.stats())
            .finish()
    }
}

// ---- Lock helpers ----
//
// A panicking handler never runs while a registry lock is held, so a
// poisoned lock still guards consistent data.

pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
