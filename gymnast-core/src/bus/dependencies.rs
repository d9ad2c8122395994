//! Named dependency registry.
//!
//! Handlers declare the names they need when they subscribe; the values are
//! looked up again every time the handler runs, so overwriting a dependency
//! is visible to every handler on its next invocation.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::error::{BusError, BusResult};
use super::{read_lock, write_lock};

/// Opaque shared resource stored in the registry.
pub type Dependency = Arc<dyn Any + Send + Sync>;

/// Returns true for names of the form `[A-Za-z_][A-Za-z0-9_]*`.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Last-write-wins store of named dependencies.
#[derive(Default)]
pub struct DependencyRegistry {
    entries: RwLock<HashMap<String, Dependency>>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or overwrites a single dependency.
    pub fn set(&self, name: &str, value: Dependency) -> BusResult<()> {
        if !is_valid_identifier(name) {
            return Err(BusError::InvalidDependencyName(name.to_string()));
        }
        let replaced = write_lock(&self.entries)
            .insert(name.to_string(), value)
            .is_some();
        log::trace!(
            "{} dependency '{}'",
            if replaced { "Updated" } else { "Added" },
            name
        );
        Ok(())
    }

    /// Applies each entry in order. Entries before a rejected name stay applied.
    pub fn set_many<I, K>(&self, values: I) -> BusResult<()>
    where
        I: IntoIterator<Item = (K, Dependency)>,
        K: AsRef<str>,
    {
        for (name, value) in values {
            self.set(name.as_ref(), value)?;
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        read_lock(&self.entries).contains_key(name)
    }

    /// Names from `names` that are not registered, in the order given.
    pub fn missing(&self, names: &[String]) -> Vec<String> {
        let entries = read_lock(&self.entries);
        names
            .iter()
            .filter(|name| !entries.contains_key(name.as_str()))
            .cloned()
            .collect()
    }

    /// Resolves the current value of every name in `names`.
    pub fn resolve(&self, names: &[String]) -> BusResult<Dependencies> {
        let entries = read_lock(&self.entries);
        let mut values = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match entries.get(name) {
                Some(value) => values.push((name.clone(), Arc::clone(value))),
                None => missing.push(name.clone()),
            }
        }
        if missing.is_empty() {
            Ok(Dependencies { values })
        } else {
            Err(BusError::MissingDependencies {
                handler: "<dispatch>".to_string(),
                missing,
            })
        }
    }

    pub(crate) fn clear(&self) {
        write_lock(&self.entries).clear();
    }
}

/// Dependencies resolved for a single handler invocation.
#[derive(Clone, Default)]
pub struct Dependencies {
    values: Vec<(String, Dependency)>,
}

impl Dependencies {
    /// Fetches a declared dependency as a concrete type.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> BusResult<Arc<T>> {
        let value = self
            .values
            .iter()
            .find(|(declared, _)| declared == name)
            .map(|(_, value)| Arc::clone(value))
            .ok_or_else(|| BusError::UndeclaredDependency(name.to_string()))?;
        value.downcast::<T>().map_err(|_| BusError::DependencyType {
            name: name.to_string(),
            expected: std::any::type_name::<T>(),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
