use std::marker::PhantomData;

use crate::{
    errors::DiError,
    handle::DiHandle,
    lifecycle::{self, Lifecycle, LifecycleAdapter},
    record::{Laziness, ProviderFn, Scope, ServiceRecord},
    registry::Registry,
    resolver::Resolver,
    types::{DependencyInfo, DynError, Injectable, Instance, TypeInfo},
};

/// Registrations are described through a [ServiceBuilder]:
///
/// ```ignore
/// registry.instance(config).register()?;
/// registry.constructor(|(config,): (Arc<Config>,)| Database::connect(&config))
///     .eager()
///     .with_lifecycle()
///     .register()?;
/// registry.transient(|di| Ok::<_, DiError>(Request::new(di.resolve()?)))
///     .named("request")
///     .register()?;
/// ```
impl Registry {
    /// One shared instance, produced by `provider` on first resolution
    pub fn singleton<T, Provider, E>(&self, provider: Provider) -> ServiceBuilder<'_, T>
    where
        T: Injectable,
        Provider: Fn(&mut DiHandle) -> Result<T, E> + Send + Sync + 'static,
        E: Into<DynError> + 'static,
    {
        ServiceBuilder::new(self, Source::Provider(erase(provider)), Scope::Singleton)
    }

    /// A fresh instance produced by `provider` on every resolution
    pub fn transient<T, Provider, E>(&self, provider: Provider) -> ServiceBuilder<'_, T>
    where
        T: Injectable,
        Provider: Fn(&mut DiHandle) -> Result<T, E> + Send + Sync + 'static,
        E: Into<DynError> + 'static,
    {
        ServiceBuilder::new(self, Source::Provider(erase(provider)), Scope::Transient)
    }

    /// A value constructed by the caller
    pub fn instance<T: Injectable>(&self, instance: T) -> ServiceBuilder<'_, T> {
        ServiceBuilder::new(self, Source::Value(Instance::new(instance)), Scope::Instance)
    }

    /// Singleton built from constructor parameters
    ///
    /// The parameter type declares the dependencies up front, they are validated
    /// during `build` and take part in ordering before anything is instantiated.
    pub fn constructor<T, Deps, Constructor, E>(
        &self,
        constructor: Constructor,
    ) -> ServiceBuilder<'_, T>
    where
        T: Injectable,
        Deps: Resolver + 'static,
        Constructor: Fn(Deps) -> Result<T, E> + Send + Sync + 'static,
        E: Into<DynError> + 'static,
    {
        let provider: ProviderFn = Box::new(move |handle: &mut DiHandle| {
            let dependencies = Deps::resolve(handle)?;
            constructor(dependencies)
                .map(Instance::new)
                .map_err(Into::into)
        });

        let mut builder = ServiceBuilder::new(self, Source::Provider(provider), Scope::Singleton);
        builder.dependencies = Deps::dependency_info();
        builder
    }
}

fn erase<T, Provider, E>(provider: Provider) -> ProviderFn
where
    T: Injectable,
    Provider: Fn(&mut DiHandle) -> Result<T, E> + Send + Sync + 'static,
    E: Into<DynError> + 'static,
{
    Box::new(move |handle: &mut DiHandle| {
        provider(handle).map(Instance::new).map_err(Into::into)
    })
}

enum Source {
    Provider(ProviderFn),
    Value(Instance),
}

/// Pending registration of a `T`, finished with [ServiceBuilder::register]
#[must_use = "the service is only registered once `register` is called"]
pub struct ServiceBuilder<'r, T> {
    registry: &'r Registry,
    name: Option<String>,
    source: Source,
    scope: Scope,
    laziness: Laziness,
    allow_replace: bool,
    dependencies: Vec<DependencyInfo>,
    lifecycle: Option<LifecycleAdapter>,
    _provides: PhantomData<fn() -> T>,
}

impl<'r, T: Injectable> ServiceBuilder<'r, T> {
    fn new(registry: &'r Registry, source: Source, scope: Scope) -> Self {
        ServiceBuilder {
            registry,
            name: None,
            source,
            scope,
            laziness: Laziness::Lazy,
            allow_replace: false,
            dependencies: Vec::new(),
            lifecycle: None,
            _provides: PhantomData,
        }
    }

    /// Register under an explicit name instead of the type name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Build during `Registry::build` instead of on first resolution
    pub fn eager(mut self) -> Self {
        self.laziness = Laziness::Eager;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.laziness = Laziness::Lazy;
        self
    }

    /// Switch a provider registration to produce a new instance per resolution
    pub fn transient(mut self) -> Self {
        if self.scope == Scope::Singleton {
            self.scope = Scope::Transient;
        }
        self
    }

    /// Allow this registration to replace an existing one with the same name
    pub fn replace(mut self) -> Self {
        self.allow_replace = true;
        self
    }

    /// Declare dependencies the provider resolves, in addition to any inferred ones
    pub fn depends_on(mut self, dependency: DependencyInfo) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// The name this registration will be stored under
    pub fn name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| TypeInfo::of::<T>().canonical_name())
    }

    pub fn register(self) -> Result<(), DiError> {
        let registry = self.registry;
        let allow_replace = self.allow_replace;
        let record = self.into_record()?;
        registry.register(record, allow_replace)
    }

    /// Builds the record without registering it
    pub fn into_record(self) -> Result<ServiceRecord, DiError> {
        let name = self.name().to_string();
        let record = match self.source {
            // Already built, laziness does not apply
            Source::Value(instance) => ServiceRecord::from_instance(name, instance)?,
            Source::Provider(provider) => ServiceRecord::from_provider(
                name,
                TypeInfo::of::<T>(),
                self.scope,
                self.laziness,
                provider,
            )?,
        }
        .with_dependencies(self.dependencies);

        match self.lifecycle {
            Some(adapter) => record.with_lifecycle_adapter(adapter, TypeInfo::of::<T>()),
            None => Ok(record),
        }
    }
}

impl<'r, T: Lifecycle> ServiceBuilder<'r, T> {
    /// Wire the service's [Lifecycle] hooks into startup and shutdown
    pub fn with_lifecycle(mut self) -> Self {
        self.lifecycle = Some(lifecycle::adapter_for::<T>());
        self
    }
}
