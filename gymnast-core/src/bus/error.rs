//! Error type for the message bus.
//!
//! Configuration mistakes (bad dependency names, catch-all handlers, missing
//! dependencies, duplicate command handlers, unknown message types) are
//! reported as soon as they happen. Failures raised inside a command handler
//! travel back to the publisher as [`BusError::Handler`] with the original
//! error intact.

use super::message::MessageKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Invalid dependency name '{0}': expected an identifier")]
    InvalidDependencyName(String),

    #[error("Handler {handler} declares catch-all parameter '{parameter}'; dependencies must be listed explicitly")]
    VariadicHandler { handler: String, parameter: String },

    #[error("Handler {handler} declares dependency '{name}' more than once")]
    DuplicateDependency { handler: String, name: String },

    #[error("Missing dependencies for handler {handler}: {}", missing.join(", "))]
    MissingDependencies { handler: String, missing: Vec<String> },

    #[error("Dependency '{0}' was not declared by this handler")]
    UndeclaredDependency(String),

    #[error("Dependency '{name}' does not hold a value of type {expected}")]
    DependencyType { name: String, expected: &'static str },

    #[error("Command {command} already has a handler ({existing})")]
    DuplicateCommandHandler {
        command: &'static str,
        existing: &'static str,
    },

    #[error("No handler registered for command {0}")]
    NoCommandHandler(&'static str),

    #[error("Message {0} is neither a command nor an event known to this bus")]
    Unclassified(String),

    #[error("Message {name} is declared as {declared} but was used as {expected}")]
    KindMismatch {
        name: &'static str,
        declared: MessageKind,
        expected: MessageKind,
    },

    #[error("Handler for {0} received or produced a value of the wrong type")]
    UnexpectedType(&'static str),

    #[error("Message bus has been shut down")]
    Stopped,

    #[error("Invalid bus configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to start the event delivery worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error(transparent)]
    Handler(anyhow::Error),
}

impl BusError {
    /// True for errors caused by wiring mistakes rather than runtime failures.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BusError::InvalidDependencyName(_)
                | BusError::VariadicHandler { .. }
                | BusError::DuplicateDependency { .. }
                | BusError::MissingDependencies { .. }
                | BusError::DuplicateCommandHandler { .. }
                | BusError::NoCommandHandler(_)
                | BusError::Unclassified(_)
                | BusError::KindMismatch { .. }
                | BusError::InvalidConfig(_)
        )
    }

    /// The error a command handler failed with, if this is a handler failure.
    #[must_use]
    pub fn handler_error(&self) -> Option<&anyhow::Error> {
        match self {
            BusError::Handler(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for bus operations
pub type BusResult<T> = std::result::Result<T, BusError>;
