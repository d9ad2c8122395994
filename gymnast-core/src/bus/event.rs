//! Event channel: ordered fan-out on a single delivery worker.
//!
//! Events are queued by the publisher and delivered by one background thread,
//! so delivery order across all event types equals publish order. For each
//! event the handlers run one after another in subscription order. A handler
//! that returns an error or panics is logged and skipped; the worker keeps
//! going. Once the queue is closed and drained the worker clears the bus
//! registries, so a shutdown requested from inside a handler still delivers
//! everything that was queued before it.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle, ThreadId};

use super::error::{BusError, BusResult};
use super::handler::EventHandler;
use super::message::MessageType;
use super::queue::DeliveryQueue;
use super::{Registries, read_lock, write_lock};

/// An event waiting in the delivery queue.
pub(crate) struct Envelope {
    pub ty: MessageType,
    pub message: Box<dyn Any + Send>,
}

#[derive(Default)]
pub(crate) struct EventRegistry {
    handlers: RwLock<HashMap<TypeId, Vec<Arc<EventHandler>>>>,
}

impl EventRegistry {
    /// Appends a handler and returns how many the type now has.
    pub fn subscribe(&self, ty: MessageType, handler: EventHandler) -> usize {
        let mut handlers = write_lock(&self.handlers);
        let list = handlers.entry(ty.id).or_insert_with(|| {
            log::debug!("event={} has no handlers yet, adding it", ty.name);
            Vec::new()
        });
        log::trace!("event={} += {} ({} total)", ty.name, handler.label, list.len() + 1);
        list.push(Arc::new(handler));
        list.len()
    }

    /// Snapshot of the handlers for `id`, in subscription order.
    pub fn handlers_for(&self, id: TypeId) -> Vec<Arc<EventHandler>> {
        read_lock(&self.handlers).get(&id).cloned().unwrap_or_default()
    }

    pub fn count(&self, id: TypeId) -> usize {
        read_lock(&self.handlers).get(&id).map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        write_lock(&self.handlers).clear();
    }
}

/// Counters shared between the bus handle and the worker.
#[derive(Default)]
pub(crate) struct Counters {
    pub published: AtomicU64,
    pub delivered: AtomicU64,
    pub dropped: AtomicU64,
    pub handler_failures: AtomicU64,
}

/// Point-in-time view of the event channel counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusStats {
    /// Events accepted by `publish`.
    pub published: u64,
    /// Events the worker has finished fanning out.
    pub delivered: u64,
    /// Events discarded by a saturation policy.
    pub dropped: u64,
    /// Event handler invocations that failed or panicked.
    pub handler_failures: u64,
    /// Events currently waiting in the queue.
    pub pending: usize,
}

impl Counters {
    pub fn snapshot(&self, pending: usize) -> BusStats {
        BusStats {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            pending,
        }
    }
}

/// The background thread that drains the delivery queue.
pub(crate) struct DeliveryWorker {
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DeliveryWorker {
    pub fn spawn(
        name: &str,
        queue: Arc<DeliveryQueue<Envelope>>,
        registries: Registries,
        counters: Arc<Counters>,
    ) -> BusResult<Self> {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(&queue, &registries, &counters))
            .map_err(BusError::WorkerSpawn)?;
        log::debug!("Started event delivery worker '{name}'");
        Ok(Self {
            thread_id: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn is_current_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Waits for the worker to exit. The queue must already be closed.
    ///
    /// Concurrent callers all return only after the worker is gone: the
    /// handle lock is held for the whole join. Does nothing when called from
    /// the worker itself.
    pub fn join(&self) {
        if self.is_current_thread() {
            log::debug!("Shutdown requested from the delivery worker; not joining itself");
            return;
        }
        let mut slot = self
            .handle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            if handle.join().is_err() {
                log::error!("Event delivery worker terminated abnormally");
            }
        }
    }
}

fn run(queue: &DeliveryQueue<Envelope>, registries: &Registries, counters: &Counters) {
    while let Some(envelope) = queue.pop() {
        deliver(&registries.events, &envelope, counters);
        counters.delivered.fetch_add(1, Ordering::Relaxed);
    }
    registries.clear();
    log::debug!("Event delivery worker stopped");
}

fn deliver(registry: &EventRegistry, envelope: &Envelope, counters: &Counters) {
    let handlers = registry.handlers_for(envelope.ty.id);
    log::trace!("Delivering {} to {} handler(s)", envelope.ty.name, handlers.len());

    for handler in handlers {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.call(envelope.message.as_ref())));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                counters.handler_failures.fetch_add(1, Ordering::Relaxed);
                log::error!("event={} handler={} failed: {:#}", envelope.ty.name, handler.label, e);
            }
            Err(payload) => {
                counters.handler_failures.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "event={} handler={} panicked: {}",
                    envelope.ty.name,
                    handler.label,
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}
