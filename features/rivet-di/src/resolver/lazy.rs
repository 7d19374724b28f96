use std::{
    fmt::Debug,
    sync::{Arc, OnceLock},
};

use crate::{
    errors::DiError,
    handle::DiHandle,
    registry::Registry,
    resolver::Resolver,
    types::{DependencyInfo, Injectable, TypeInfo},
};

/// Lazily resolved dependency
///
/// Resolution is deferred to the first [Lazy::get], so two services may refer
/// to each other as long as one side holds the other through `Lazy`.
/// A lazy dependency is not an ordering edge: it does not influence startup order.
///
/// Note:
///
/// Calling `get` from inside the constructor of the service it points back to
/// reintroduces the cycle and fails with `Cycle`: resolution started by `get`
/// continues the chain of whatever is being constructed on the same thread.
pub struct Lazy<T: Injectable>(Arc<LazyInner<T>>);
struct LazyInner<T: Injectable> {
    registry: Registry,
    name: String,
    once: OnceLock<Arc<T>>,
}

impl<T: Injectable> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Lazy(self.0.clone())
    }
}
impl<T: Injectable + Debug> Debug for Lazy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.once.get() {
            Some(instance) => f.debug_tuple("Lazy").field(instance).finish(),
            None => f.debug_tuple("Lazy").field(&self.0.name).finish(),
        }
    }
}

impl<T: Injectable> Resolver for Lazy<T> {
    fn resolve(handle: &mut DiHandle) -> Result<Self, DiError> {
        let name = TypeInfo::of::<T>().canonical_name();

        // Check if we got an immediate error
        if !handle.registry().contains(name) {
            return Err(DiError::NotFound {
                name: name.to_string(),
            });
        }

        Ok(Lazy(Arc::new(LazyInner {
            registry: handle.registry().clone(),
            name: name.to_string(),
            once: OnceLock::new(),
        })))
    }

    fn dependency_info() -> Vec<DependencyInfo> {
        vec![DependencyInfo {
            lazy: true,
            ..DependencyInfo::of::<T>()
        }]
    }
}

impl<T: Injectable> Lazy<T> {
    /// Accesses the Lazy Dependency, resolving it on first use
    ///
    /// Failures are not cached, a later call retries.
    pub fn get(&self) -> Result<Arc<T>, DiError> {
        if let Some(instance) = self.0.once.get() {
            return Ok(instance.clone());
        }

        let instance = self.0.registry.resolve_named::<T>(&self.0.name)?;
        // Another caller may have won the race, both hold the same singleton anyway
        Ok(self.0.once.get_or_init(|| instance).clone())
    }

    /// Returns the instance if it has already been resolved
    pub fn try_get(&self) -> Option<Arc<T>> {
        self.0.once.get().cloned()
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }
}
