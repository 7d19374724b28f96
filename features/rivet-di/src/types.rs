use std::{
    any::{Any, TypeId},
    sync::Arc,
};

/// Boxed error returned by providers and lifecycle hooks
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Services may be resolved from any thread and shared between them,
/// so anything registered needs to be Send + Sync + 'static
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// Type-erased instance produced by a provider
#[derive(Clone)]
pub struct Instance {
    pub info: TypeInfo,
    pub instance: Arc<dyn Any + Send + Sync + 'static>,
}

impl Instance {
    pub(crate) fn new<ExistingInstance: Injectable>(instance: ExistingInstance) -> Self {
        Instance {
            info: TypeInfo::of::<ExistingInstance>(),
            instance: Arc::new(instance),
        }
    }

    pub fn downcast<T: Injectable>(&self) -> Result<Arc<T>, &'static str> {
        match Arc::downcast::<T>(self.instance.clone()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(self.info.type_name),
        }
    }

    /// True if both handles point at the same allocation
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Instance").field(&self.info.type_name).finish()
    }
}

/// Information about a declared dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyInfo {
    /// Name the dependency is looked up under
    pub name: String,
    /// The required Type
    pub type_info: TypeInfo,
    /// If it is optional or required
    pub optional: bool,
    /// If the Dependency is resolved lazily
    pub lazy: bool,
}

impl DependencyInfo {
    /// Required dependency on `T` under its canonical name
    pub fn of<T: 'static + ?Sized>() -> Self {
        Self::named::<T>(TypeInfo::of::<T>().canonical_name())
    }

    pub fn named<T: 'static + ?Sized>(name: impl Into<String>) -> Self {
        DependencyInfo {
            name: name.into(),
            type_info: TypeInfo::of::<T>(),
            optional: false,
            lazy: false,
        }
    }
}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }

    /// Name a service of this type is registered under when no explicit name is given
    pub fn canonical_name(&self) -> &'static str {
        self.type_name
    }
}
