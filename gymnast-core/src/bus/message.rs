//! Message taxonomy.
//!
//! Every message is either a [`Command`] (exactly one handler, synchronous,
//! may answer) or an [`Event`] (any number of handlers, delivered on the
//! worker thread). The kind belongs to the concrete type: two structs with
//! identical fields are still routed independently.
//!
//! Types opt in through the [`command!`](crate::command) and
//! [`event!`](crate::event) macros, which keep `Message::KIND` and the
//! marker trait in agreement.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use super::error::{BusError, BusResult};
use super::{read_lock, write_lock};

/// The two kinds of message the bus routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Command,
    Event,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Command => f.write_str("command"),
            MessageKind::Event => f.write_str("event"),
        }
    }
}

/// Root trait for anything that can travel over the bus.
pub trait Message: Any + Send + 'static {
    const KIND: MessageKind;
}

/// A request handled by exactly one handler.
pub trait Command: Message {
    type Output: Send + 'static;
}

/// A notification delivered to every subscriber, in subscription order.
pub trait Event: Message {}

/// Declares one or more command types together with their output type.
///
/// ```
/// use gymnast_core::command;
///
/// struct Resize { width: u32 }
/// command!(Resize => bool);
/// ```
#[macro_export]
macro_rules! command {
    ($($ty:ty => $out:ty),+ $(,)?) => {
        $(
            impl $crate::bus::Message for $ty {
                const KIND: $crate::bus::MessageKind = $crate::bus::MessageKind::Command;
            }
            impl $crate::bus::Command for $ty {
                type Output = $out;
            }
        )+
    };
}

/// Declares one or more event types.
///
/// ```
/// use gymnast_core::event;
///
/// struct Started;
/// struct Finished { ok: bool }
/// event!(Started, Finished);
/// ```
#[macro_export]
macro_rules! event {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::bus::Message for $ty {
                const KIND: $crate::bus::MessageKind = $crate::bus::MessageKind::Event;
            }
            impl $crate::bus::Event for $ty {}
        )+
    };
}

/// Identity of a concrete message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MessageType {
    pub id: TypeId,
    pub name: &'static str,
    pub kind: MessageKind,
}

impl MessageType {
    pub fn of<M: Message>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
            kind: M::KIND,
        }
    }

    /// Fails unless this type is declared with the `expected` kind.
    pub fn ensure_kind(self, expected: MessageKind) -> BusResult<Self> {
        if self.kind == expected {
            Ok(self)
        } else {
            Err(BusError::KindMismatch {
                name: self.name,
                declared: self.kind,
                expected,
            })
        }
    }
}

/// Lookup table used to classify type-erased messages.
///
/// Filled whenever a type passes through a typed entry point, so a message
/// published through `publish_any` is classified with one hash lookup.
#[derive(Default)]
pub(crate) struct KindTable {
    kinds: RwLock<HashMap<TypeId, MessageType>>,
}

impl KindTable {
    pub fn record<M: Message>(&self) -> MessageType {
        let ty = MessageType::of::<M>();
        if !read_lock(&self.kinds).contains_key(&ty.id) {
            write_lock(&self.kinds).insert(ty.id, ty);
            log::trace!("Registered {} {}", ty.kind, ty.name);
        }
        ty
    }

    pub fn classify(&self, message: &(dyn Any + Send)) -> BusResult<MessageType> {
        let id = message.type_id();
        read_lock(&self.kinds)
            .get(&id)
            .copied()
            .ok_or_else(|| BusError::Unclassified(format!("{id:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;
    struct Pong;
    struct Noise;
    crate::command!(Ping => u32);
    crate::event!(Pong);

    #[test]
    fn test_kind_follows_declaration() {
        assert_eq!(MessageType::of::<Ping>().kind, MessageKind::Command);
        assert_eq!(MessageType::of::<Pong>().kind, MessageKind::Event);
        assert!(MessageType::of::<Pong>().ensure_kind(MessageKind::Command).is_err());
    }

    #[test]
    fn test_classify_known_and_unknown() {
        let table = KindTable::default();
        table.record::<Ping>();
        table.record::<Pong>();

        let ping: Box<dyn Any + Send> = Box::new(Ping);
        assert_eq!(table.classify(ping.as_ref()).unwrap().kind, MessageKind::Command);

        let noise: Box<dyn Any + Send> = Box::new(Noise);
        assert!(matches!(table.classify(noise.as_ref()), Err(BusError::Unclassified(_))));
    }
}
