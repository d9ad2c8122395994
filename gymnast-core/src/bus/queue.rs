//! FIFO delivery queue between publishers and the event worker.
//!
//! Unbounded by default. With a capacity, a full queue applies the configured
//! [`SaturationPolicy`]. Closing the queue wakes everybody: blocked producers
//! get their item back and the consumer drains what is left, then sees `None`.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// What a bounded queue does when a producer finds it full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaturationPolicy {
    /// Wait until the worker makes room.
    #[default]
    Block,
    /// Discard the oldest pending item to make room.
    DropOldest,
    /// Discard the item being published.
    DropNewest,
}

impl fmt::Display for SaturationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaturationPolicy::Block => f.write_str("block"),
            SaturationPolicy::DropOldest => f.write_str("drop-oldest"),
            SaturationPolicy::DropNewest => f.write_str("drop-newest"),
        }
    }
}

impl FromStr for SaturationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "block" => Ok(SaturationPolicy::Block),
            "drop-oldest" => Ok(SaturationPolicy::DropOldest),
            "drop-newest" => Ok(SaturationPolicy::DropNewest),
            other => Err(format!(
                "unknown saturation policy '{other}' (expected block, drop-oldest or drop-newest)"
            )),
        }
    }
}

/// Result of a successful push.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Pushed<T> {
    Queued,
    /// The queue was full; this item (oldest or newest) was discarded.
    Dropped(T),
}

/// The queue was closed; the item is handed back.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Closed<T>(pub T);

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub(crate) struct DeliveryQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<usize>,
    policy: SaturationPolicy,
}

impl<T> DeliveryQueue<T> {
    pub fn new(capacity: Option<usize>, policy: SaturationPolicy) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_full(&self, state: &QueueState<T>) -> bool {
        self.capacity.is_some_and(|cap| state.items.len() >= cap)
    }

    /// Appends an item. `may_block` is false when the caller is the consumer
    /// itself; a blocking push from there could never be satisfied, so the
    /// item is queued past the bound instead.
    pub fn push(&self, item: T, may_block: bool) -> Result<Pushed<T>, Closed<T>> {
        let mut state = self.lock();
        if state.closed {
            return Err(Closed(item));
        }

        let mut outcome = Pushed::Queued;
        if self.is_full(&state) {
            match self.policy {
                SaturationPolicy::Block if may_block => {
                    while self.is_full(&state) && !state.closed {
                        state = self
                            .not_full
                            .wait(state)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                    if state.closed {
                        return Err(Closed(item));
                    }
                }
                SaturationPolicy::Block => {}
                SaturationPolicy::DropNewest => return Ok(Pushed::Dropped(item)),
                SaturationPolicy::DropOldest => {
                    if let Some(oldest) = state.items.pop_front() {
                        outcome = Pushed::Dropped(oldest);
                    }
                }
            }
        }

        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(outcome)
    }

    /// Blocks until an item is available. Returns `None` once the queue is
    /// closed and empty.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Closes the queue. Returns false if it was already closed.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        let was_open = !state.closed;
        state.closed = true;
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
        was_open
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }
}
