use std::{
    fmt::Debug,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{
    errors::DiError,
    handle::DiHandle,
    lifecycle::{Lifecycle, LifecycleAdapter},
    types::{DependencyInfo, DynError, Instance, TypeInfo},
};

/// How many instances a registration produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One shared instance, created once and cached
    Singleton,
    /// A fresh instance for every resolution
    Transient,
    /// A value built by the caller before registration
    Instance,
}

/// When a singleton is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Laziness {
    /// On first resolution
    #[default]
    Lazy,
    /// During `Registry::build`
    Eager,
}

/// Type-erased provider, given a handle to resolve its own dependencies
pub type ProviderFn = Box<dyn Fn(&mut DiHandle) -> Result<Instance, DynError> + Send + Sync>;

/// Metadata and cached state of one registration
pub struct ServiceRecord {
    name: String,
    info: TypeInfo,
    scope: Scope,
    laziness: Laziness,
    provider: Option<ProviderFn>,
    dependencies: Vec<DependencyInfo>,
    lifecycle: Option<LifecycleAdapter>,
    /// `Some` once built, guarded per record so a slow provider only blocks its own resolvers
    cache: Mutex<Option<Instance>>,
}

impl Debug for ServiceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRecord")
            .field("name", &self.name)
            .field("type", &self.info.type_name)
            .field("scope", &self.scope)
            .field("laziness", &self.laziness)
            .field("built", &self.is_built())
            .field("lifecycle", &self.lifecycle.is_some())
            .finish()
    }
}

impl ServiceRecord {
    /// Record backed by a provider
    ///
    /// Fails with `InvalidProvider` if the combination of scope and laziness makes no sense.
    pub fn from_provider(
        name: impl Into<String>,
        info: TypeInfo,
        scope: Scope,
        laziness: Laziness,
        provider: ProviderFn,
    ) -> Result<Self, DiError> {
        let name = validate_name(name.into())?;
        match (scope, laziness) {
            (Scope::Instance, _) => Err(DiError::InvalidProvider {
                name,
                reason: "instance scope takes a value, not a provider".to_string(),
            }),
            (Scope::Transient, Laziness::Eager) => Err(DiError::InvalidProvider {
                name,
                reason: "transient services cannot be built eagerly".to_string(),
            }),
            _ => Ok(ServiceRecord {
                name,
                info,
                scope,
                laziness,
                provider: Some(provider),
                dependencies: Vec::new(),
                lifecycle: None,
                cache: Mutex::new(None),
            }),
        }
    }

    /// Record holding an already constructed value
    pub fn from_instance(name: impl Into<String>, instance: Instance) -> Result<Self, DiError> {
        Ok(ServiceRecord {
            name: validate_name(name.into())?,
            info: instance.info,
            scope: Scope::Instance,
            laziness: Laziness::Lazy,
            provider: None,
            dependencies: Vec::new(),
            lifecycle: None,
            cache: Mutex::new(Some(instance)),
        })
    }

    pub fn with_dependencies(mut self, dependencies: Vec<DependencyInfo>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Marks the record as carrying start/stop hooks
    pub fn with_lifecycle<T: Lifecycle>(self) -> Result<Self, DiError> {
        let adapter = crate::lifecycle::adapter_for::<T>();
        self.with_lifecycle_adapter(adapter, crate::types::TypeInfo::of::<T>())
    }

    pub(crate) fn with_lifecycle_adapter(
        mut self,
        adapter: LifecycleAdapter,
        adapted: TypeInfo,
    ) -> Result<Self, DiError> {
        if self.scope == Scope::Transient {
            return Err(DiError::InvalidProvider {
                name: self.name,
                reason: "transient services cannot carry lifecycle hooks".to_string(),
            });
        }
        if adapted != self.info {
            return Err(DiError::InvalidProvider {
                name: self.name,
                reason: format!(
                    "lifecycle declared for '{}' but the service provides '{}'",
                    adapted, self.info
                ),
            });
        }
        self.lifecycle = Some(adapter);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_info(&self) -> TypeInfo {
        self.info
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn laziness(&self) -> Laziness {
        self.laziness
    }

    pub fn dependencies(&self) -> &[DependencyInfo] {
        &self.dependencies
    }

    pub fn has_lifecycle(&self) -> bool {
        self.lifecycle.is_some()
    }

    pub fn is_built(&self) -> bool {
        self.lock_cache().is_some()
    }

    /// The lifecycle view of a built instance of this record
    pub(crate) fn lifecycle_of(&self, instance: &Instance) -> Option<Arc<dyn Lifecycle>> {
        self.lifecycle.and_then(|adapt| adapt(instance))
    }

    /// Produces an instance according to the record's scope
    ///
    /// Must be called with this record already pushed onto the handle's chain.
    pub(crate) fn instantiate(&self, handle: &mut DiHandle) -> Result<Instance, DiError> {
        match self.scope {
            Scope::Instance => self.lock_cache().clone().ok_or_else(|| DiError::InvalidProvider {
                name: self.name.clone(),
                reason: "instance registration holds no value".to_string(),
            }),
            Scope::Transient => self.construct(handle),
            Scope::Singleton => {
                // Concurrent first-time resolvers queue up here, so the provider runs once
                let mut cache = self.lock_cache();
                if let Some(instance) = cache.as_ref() {
                    return Ok(instance.clone());
                }

                let instance = self.construct(handle)?;
                tracing::debug!(service = %self.name, "Constructed singleton");
                *cache = Some(instance.clone());
                Ok(instance)
            }
        }
    }

    fn construct(&self, handle: &mut DiHandle) -> Result<Instance, DiError> {
        let Some(provider) = self.provider.as_ref() else {
            return Err(DiError::InvalidProvider {
                name: self.name.clone(),
                reason: "no provider registered".to_string(),
            });
        };

        provider(handle).map_err(|error| match error.downcast::<DiError>() {
            // Resolution failures inside the provider keep their identity
            Ok(di_error) => *di_error,
            Err(error) => DiError::ProviderFailed {
                name: self.name.clone(),
                cause: Arc::new(error),
            },
        })
    }

    fn lock_cache(&self) -> MutexGuard<'_, Option<Instance>> {
        // A provider that panicked never stored anything, the cached value stays valid
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate_name(name: String) -> Result<String, DiError> {
    if name.trim().is_empty() {
        return Err(DiError::InvalidProvider {
            name,
            reason: "service name must not be empty".to_string(),
        });
    }
    Ok(name)
}
