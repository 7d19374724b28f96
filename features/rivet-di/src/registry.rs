use std::{
    collections::BTreeMap,
    fmt::Debug,
    sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    dependency_graph::{self, DependencyGraph},
    errors::{BuildErrors, DiError},
    handle::DiHandle,
    lifecycle::Lifecycle,
    record::{Laziness, ServiceRecord},
    resolver::Resolver,
    types::{DependencyInfo, Injectable, TypeInfo},
};

/// Registry holding every service registration
///
/// Cheap to clone, all clones share the same registrations.
#[derive(Clone, Default)]
pub struct Registry(Arc<RegistryInner>);

#[derive(Default)]
struct RegistryInner {
    services: RwLock<Services>,
    state: RwLock<BuildState>,
    /// Serializes `build` so concurrent callers observe one outcome
    build_lock: Mutex<()>,
    /// Edges observed while resolving
    recorded: Mutex<DependencyGraph>,
}

#[derive(Default)]
struct Services {
    by_name: BTreeMap<String, Arc<ServiceRecord>>,
    /// Registration order, eager services are built in this order
    order: Vec<String>,
}

/// Where the registry is in its build process
#[derive(Debug, Clone, Default)]
pub enum BuildState {
    /// Accepting registrations
    #[default]
    Unbuilt,
    /// `build` is instantiating eager services, registrations are closed
    Building,
    /// `build` completed, holds its recorded outcome
    Built(Result<(), BuildErrors>),
}

impl Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_struct("Registry");
        for record in self.read_services().by_name.values() {
            let val = if record.is_built() { "built" } else { "unbuilt" };
            map.field(record.name(), &val);
        }
        map.finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record
    ///
    /// Fails with `Duplicate` if the name is taken and `allow_replace` is false.
    ///
    /// # Panics
    /// If called once `build` has started. Registrations are fixed from then on.
    pub fn register(&self, record: ServiceRecord, allow_replace: bool) -> Result<(), DiError> {
        match self.try_register(record, allow_replace) {
            Err(DiError::AlreadyBuilt { name }) => {
                panic!("service '{name}' registered after the registry was built")
            }
            result => result,
        }
    }

    /// Same as [Registry::register] but returns `AlreadyBuilt` instead of panicking
    pub fn try_register(&self, record: ServiceRecord, allow_replace: bool) -> Result<(), DiError> {
        let mut services = self.write_services();

        if !matches!(*self.read_state(), BuildState::Unbuilt) {
            return Err(DiError::AlreadyBuilt {
                name: record.name().to_string(),
            });
        }

        let name = record.name().to_string();
        if services.by_name.contains_key(&name) {
            if !allow_replace {
                return Err(DiError::Duplicate { name });
            }
            tracing::debug!(service = %name, "Replacing registration");
        } else {
            services.order.push(name.clone());
        }

        tracing::debug!(
            service = %name,
            scope = ?record.scope(),
            laziness = ?record.laziness(),
            "Registered service"
        );
        services.by_name.insert(name, Arc::new(record));
        Ok(())
    }

    /// Closes registration and instantiates every eager service
    ///
    /// Declared dependencies are validated first. Failures of individual eager
    /// services do not stop the others, all of them are returned together.
    /// The outcome is recorded: repeated or concurrent calls return it unchanged.
    pub fn build(&self) -> Result<(), BuildErrors> {
        let _build = self.0.build_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let BuildState::Built(outcome) = &*self.read_state() {
            return outcome.clone();
        }

        *self.write_state() = BuildState::Building;
        let outcome = self.build_eager();
        match &outcome {
            Ok(()) => tracing::debug!(services = self.len(), "Registry built"),
            Err(errors) => tracing::warn!(
                failures = errors.errors.len(),
                "Registry build failed"
            ),
        }
        *self.write_state() = BuildState::Built(outcome.clone());

        outcome
    }

    fn build_eager(&self) -> Result<(), BuildErrors> {
        if let Err(graph_errors) = dependency_graph::check_declared(&self.declared_dependencies())
        {
            return Err(BuildErrors {
                errors: vec![graph_errors.into()],
            });
        }

        let records: Vec<Arc<ServiceRecord>> = {
            let services = self.read_services();
            services
                .order
                .iter()
                .filter_map(|name| services.by_name.get(name).cloned())
                .collect()
        };

        let mut errors = Vec::new();
        for record in records {
            if record.laziness() != Laziness::Eager || record.is_built() {
                continue;
            }

            tracing::debug!(service = record.name(), "Building eager service");
            let mut handle = DiHandle::new(self.clone());
            if let Err(error) = handle.resolve_instance(record.name(), record.type_info()) {
                errors.push(error);
            }
        }

        if !errors.is_empty() {
            return Err(BuildErrors { errors });
        }
        Ok(())
    }

    pub fn state(&self) -> BuildState {
        self.read_state().clone()
    }

    pub fn is_built(&self) -> bool {
        matches!(*self.read_state(), BuildState::Built(_))
    }

    /// Resolve `T` registered under its canonical type name
    pub fn resolve<T: Injectable>(&self) -> Result<Arc<T>, DiError> {
        self.resolve_named(TypeInfo::of::<T>().canonical_name())
    }

    /// Resolve `T` registered under an explicit name
    pub fn resolve_named<T: Injectable>(&self, name: &str) -> Result<Arc<T>, DiError> {
        DiHandle::new(self.clone()).resolve_named(name)
    }

    /// Resolve anything implementing [Resolver], starting a fresh chain
    pub fn resolve_with<T: Resolver>(&self) -> Result<T, DiError> {
        DiHandle::new(self.clone()).resolve()
    }

    /// Resolves the named service and returns its hooks, if it declared any
    pub fn lifecycle_of(&self, name: &str) -> Result<Option<Arc<dyn Lifecycle>>, DiError> {
        let record = self.record(name).ok_or_else(|| DiError::NotFound {
            name: name.to_string(),
        })?;
        if !record.has_lifecycle() {
            return Ok(None);
        }

        let instance = DiHandle::new(self.clone()).resolve_instance(name, record.type_info())?;
        Ok(record.lifecycle_of(&instance))
    }

    pub fn record(&self, name: &str) -> Option<Arc<ServiceRecord>> {
        self.read_services().by_name.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read_services().by_name.contains_key(name)
    }

    /// All registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.read_services().by_name.keys().cloned().collect()
    }

    /// Visits every record in name order
    pub fn for_each(&self, mut visit: impl FnMut(&ServiceRecord)) {
        let records: Vec<Arc<ServiceRecord>> =
            self.read_services().by_name.values().cloned().collect();
        for record in records {
            visit(&record);
        }
    }

    pub fn len(&self) -> usize {
        self.read_services().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the dependency graph
    ///
    /// Every registered service is a node. Edges come from resolutions seen so far
    /// plus the non-lazy dependencies declared by constructor registrations.
    pub fn dependency_graph(&self) -> DependencyGraph {
        let mut graph = self
            .0
            .recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let services = self.read_services();
        for (name, record) in &services.by_name {
            graph.add_node(name);
            for dependency in record.dependencies() {
                if !dependency.lazy && services.by_name.contains_key(&dependency.name) {
                    graph.add_edge(name, &dependency.name);
                }
            }
        }
        graph
    }

    /// Identity of the shared registrations, equal for all clones
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub(crate) fn record_edge(&self, from: &str, to: &str) {
        self.0
            .recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_edge(from, to);
    }

    fn declared_dependencies(&self) -> BTreeMap<String, Vec<DependencyInfo>> {
        self.read_services()
            .by_name
            .iter()
            .map(|(name, record)| (name.clone(), record.dependencies().to_vec()))
            .collect()
    }

    fn read_services(&self) -> RwLockReadGuard<'_, Services> {
        self.0.services.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_services(&self) -> RwLockWriteGuard<'_, Services> {
        self.0.services.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, BuildState> {
        self.0.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, BuildState> {
        self.0.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
