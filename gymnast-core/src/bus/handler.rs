//! Handler adaptation.
//!
//! A raw handler is a closure taking the message plus the [`Dependencies`]
//! it declared through [`Requires`]. Adapting it validates the declaration
//! (no catch-all names, no repeats, every name already registered) and
//! produces a type-erased callable that re-resolves the declared names from
//! the live registry on every call.

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;

use super::dependencies::{Dependencies, DependencyRegistry, is_valid_identifier};
use super::error::{BusError, BusResult};
use super::message::{Command, Event};

/// Dependency names a handler needs, declared at subscription time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requires {
    names: Vec<String>,
}

impl Requires {
    /// A handler that needs nothing but the message.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Checks the shape of the declaration, independent of registry state.
    fn validate(&self, handler: &str) -> BusResult<()> {
        let mut seen = HashSet::new();
        for name in &self.names {
            if is_catch_all(name) {
                return Err(BusError::VariadicHandler {
                    handler: handler.to_string(),
                    parameter: name.clone(),
                });
            }
            if !is_valid_identifier(name) {
                return Err(BusError::InvalidDependencyName(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(BusError::DuplicateDependency {
                    handler: handler.to_string(),
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }
}

impl<const N: usize> From<[&str; N]> for Requires {
    fn from(names: [&str; N]) -> Self {
        Self::new(names)
    }
}

impl From<Vec<String>> for Requires {
    fn from(names: Vec<String>) -> Self {
        Self { names }
    }
}

/// `*args`, `**kwargs`, `..rest` and `rest...` style entries.
fn is_catch_all(name: &str) -> bool {
    name.starts_with('*') || name.starts_with("..") || name.ends_with("...")
}

type CommandFn = dyn Fn(Box<dyn Any + Send>) -> BusResult<Box<dyn Any + Send>> + Send + Sync;
type EventFn = dyn Fn(&dyn Any) -> anyhow::Result<()> + Send + Sync;

/// Type-erased command handler.
pub(crate) struct CommandHandler {
    pub label: &'static str,
    call: Box<CommandFn>,
}

impl CommandHandler {
    pub fn call(&self, command: Box<dyn Any + Send>) -> BusResult<Box<dyn Any + Send>> {
        (self.call)(command)
    }
}

/// Type-erased event handler.
pub(crate) struct EventHandler {
    pub label: &'static str,
    call: Box<EventFn>,
}

impl EventHandler {
    pub fn call(&self, event: &dyn Any) -> anyhow::Result<()> {
        (self.call)(event)
    }
}

/// Validates `requires` against the registry and returns the names to resolve.
fn bind(registry: &DependencyRegistry, requires: Requires, label: &str) -> BusResult<Vec<String>> {
    requires.validate(label)?;
    let missing = registry.missing(requires.names());
    if !missing.is_empty() {
        return Err(BusError::MissingDependencies {
            handler: label.to_string(),
            missing,
        });
    }
    Ok(requires.names)
}

pub(crate) fn adapt_command<C, F>(
    registry: &Arc<DependencyRegistry>,
    requires: Requires,
    handler: F,
) -> BusResult<CommandHandler>
where
    C: Command,
    F: Fn(C, &Dependencies) -> anyhow::Result<C::Output> + Send + Sync + 'static,
{
    let label = std::any::type_name::<F>();
    let names = bind(registry, requires, label)?;
    let registry = Arc::clone(registry);
    let call = move |message: Box<dyn Any + Send>| -> BusResult<Box<dyn Any + Send>> {
        let command = message
            .downcast::<C>()
            .map_err(|_| BusError::UnexpectedType(std::any::type_name::<C>()))?;
        let deps = registry.resolve(&names)?;
        let output = handler(*command, &deps).map_err(BusError::Handler)?;
        Ok(Box::new(output))
    };
    Ok(CommandHandler {
        label,
        call: Box::new(call),
    })
}

pub(crate) fn adapt_event<E, F>(
    registry: &Arc<DependencyRegistry>,
    requires: Requires,
    handler: F,
) -> BusResult<EventHandler>
where
    E: Event,
    F: Fn(&E, &Dependencies) -> anyhow::Result<()> + Send + Sync + 'static,
{
    let label = std::any::type_name::<F>();
    let names = bind(registry, requires, label)?;
    let registry = Arc::clone(registry);
    let call = move |message: &dyn Any| -> anyhow::Result<()> {
        let event = message
            .downcast_ref::<E>()
            .ok_or(BusError::UnexpectedType(std::any::type_name::<E>()))?;
        let deps = registry.resolve(&names)?;
        handler(event, &deps)
    };
    Ok(EventHandler {
        label,
        call: Box::new(call),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tick(u32);
    crate::event!(Tick);

    #[test]
    fn test_catch_all_names_are_rejected() {
        for name in ["*args", "**kwargs", "..rest", "rest..."] {
            let err = Requires::from([name]).validate("h").unwrap_err();
            assert!(matches!(err, BusError::VariadicHandler { .. }), "{name}");
        }
    }

    #[test]
    fn test_repeated_name_is_rejected() {
        let err = Requires::from(["a", "a"]).validate("h").unwrap_err();
        assert!(matches!(err, BusError::DuplicateDependency { .. }));
    }

    #[test]
    fn test_adapted_handler_reads_live_value() {
        let registry = Arc::new(DependencyRegistry::new());
        registry.set("offset", Arc::new(1_u32)).unwrap();

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler = adapt_event::<Tick, _>(&registry, Requires::from(["offset"]), move |tick, deps| {
            let offset = deps.get::<u32>("offset")?;
            sink.lock().unwrap().push(tick.0 + *offset);
            Ok(())
        })
        .unwrap();

        handler.call(&Tick(10)).unwrap();
        registry.set("offset", Arc::new(100_u32)).unwrap();
        handler.call(&Tick(10)).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![11, 110]);
    }

    #[test]
    fn test_missing_dependency_fails_at_adaptation() {
        let registry = Arc::new(DependencyRegistry::new());
        let result = adapt_event::<Tick, _>(&registry, Requires::from(["db", "cache"]), |_, _| Ok(()));
        match result {
            Err(BusError::MissingDependencies { missing, .. }) => {
                assert_eq!(missing, vec!["db".to_string(), "cache".to_string()]);
            }
            _ => panic!("expected MissingDependencies"),
        }
    }
}
