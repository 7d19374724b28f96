use std::{any::type_name, cell::RefCell, sync::Arc};

use crate::{
    errors::DiError,
    registry::Registry,
    resolver::Resolver,
    types::{Injectable, Instance, TypeInfo},
};

thread_local! {
    /// Services being constructed on this thread, keyed by registry
    ///
    /// A fresh handle (e.g. from `Lazy::get` inside a constructor) starts from these,
    /// so re-entering a service under construction is a `Cycle`, not a deadlock on its cache.
    static IN_PROGRESS: RefCell<Vec<(usize, String)>> = const { RefCell::new(Vec::new()) };
}

/// Marks a service as under construction on this thread until dropped
struct InProgress;

impl InProgress {
    fn enter(registry: usize, name: &str) -> Self {
        IN_PROGRESS.with(|entries| entries.borrow_mut().push((registry, name.to_string())));
        InProgress
    }
}

impl Drop for InProgress {
    fn drop(&mut self) {
        IN_PROGRESS.with(|entries| {
            entries.borrow_mut().pop();
        });
    }
}

/// DI Handle for resolving dependencies from inside a provider.
///
/// Carries the resolution chain of the current top-level resolve call,
/// so cycles across providers are detected no matter how deep they are.
pub struct DiHandle {
    registry: Registry,
    chain: Vec<String>,
}
impl DiHandle {
    pub(crate) fn new(registry: Registry) -> Self {
        let id = registry.id();
        let chain = IN_PROGRESS.with(|entries| {
            entries
                .borrow()
                .iter()
                .filter(|(registry, _)| *registry == id)
                .map(|(_, name)| name.clone())
                .collect()
        });

        DiHandle { registry, chain }
    }

    /// Resolve anything implementing [Resolver], e.g. `Arc<T>`, `Option<Arc<T>>` or a tuple of them
    pub fn resolve<T: Resolver>(&mut self) -> Result<T, DiError> {
        T::resolve(self)
    }

    /// Resolve the service registered under `name`
    pub fn resolve_named<T: Injectable>(&mut self, name: &str) -> Result<Arc<T>, DiError> {
        let instance = self.resolve_instance(name, TypeInfo::of::<T>())?;
        instance.downcast::<T>().map_err(|actual| DiError::Resolve {
            service: name.to_string(),
            chain: self.chain.clone(),
            source: Box::new(DiError::TypeMismatch {
                name: name.to_string(),
                requested: type_name::<T>(),
                actual,
            }),
        })
    }

    /// The registry this handle resolves from
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Names currently mid-resolution, outermost first
    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    pub(crate) fn resolve_instance(
        &mut self,
        name: &str,
        requested: TypeInfo,
    ) -> Result<Instance, DiError> {
        self.resolve_record(name, requested)
            .map_err(|error| DiError::Resolve {
                service: name.to_string(),
                chain: self.chain.clone(),
                source: Box::new(error),
            })
    }

    fn resolve_record(&mut self, name: &str, requested: TypeInfo) -> Result<Instance, DiError> {
        let record = self
            .registry
            .record(name)
            .ok_or_else(|| DiError::NotFound {
                name: name.to_string(),
            })?;

        let provided = record.type_info();
        if provided.type_id != requested.type_id {
            return Err(DiError::TypeMismatch {
                name: name.to_string(),
                requested: requested.type_name,
                actual: provided.type_name,
            });
        }

        if self.chain.iter().any(|entry| entry == name) {
            let mut chain = self.chain.clone();
            chain.push(name.to_string());
            return Err(DiError::Cycle { chain });
        }

        if let Some(parent) = self.chain.last() {
            self.registry.record_edge(parent, name);
        }

        tracing::trace!(service = name, depth = self.chain.len(), "Resolving");
        let _in_progress = InProgress::enter(self.registry.id(), name);
        self.chain.push(name.to_string());
        let result = record.instantiate(self);
        self.chain.pop();

        result
    }
}
