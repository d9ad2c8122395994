//! Command channel: one handler per command type, run on the caller's thread.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, RwLock};

use super::error::{BusError, BusResult};
use super::handler::CommandHandler;
use super::message::MessageType;
use super::{read_lock, write_lock};

#[derive(Default)]
pub(crate) struct CommandChannel {
    handlers: RwLock<HashMap<TypeId, Arc<CommandHandler>>>,
}

impl CommandChannel {
    /// Fails if `ty` already has a handler. The existing handler is left untouched.
    pub fn ensure_vacant(&self, ty: MessageType) -> BusResult<()> {
        match read_lock(&self.handlers).get(&ty.id) {
            Some(existing) => Err(BusError::DuplicateCommandHandler {
                command: ty.name,
                existing: existing.label,
            }),
            None => Ok(()),
        }
    }

    pub fn subscribe(&self, ty: MessageType, handler: CommandHandler) -> BusResult<()> {
        match write_lock(&self.handlers).entry(ty.id) {
            Entry::Occupied(existing) => Err(BusError::DuplicateCommandHandler {
                command: ty.name,
                existing: existing.get().label,
            }),
            Entry::Vacant(slot) => {
                log::trace!("command={} += {}", ty.name, handler.label);
                slot.insert(Arc::new(handler));
                Ok(())
            }
        }
    }

    pub fn contains(&self, ty: MessageType) -> bool {
        read_lock(&self.handlers).contains_key(&ty.id)
    }

    /// Runs the handler for `ty` synchronously and returns its output.
    pub fn dispatch(&self, ty: MessageType, command: Box<dyn Any + Send>) -> BusResult<Box<dyn Any + Send>> {
        let handler = read_lock(&self.handlers)
            .get(&ty.id)
            .cloned()
            .ok_or(BusError::NoCommandHandler(ty.name))?;

        log::debug!("Dispatching command {}", ty.name);
        handler.call(command).inspect_err(|e| {
            log::error!("command={} handler={} failed: {:#}", ty.name, handler.label, e);
        })
    }

    pub fn clear(&self) {
        write_lock(&self.handlers).clear();
    }
}
