use std::{fmt::Debug, marker::PhantomData, ops::Deref, sync::Arc};

use crate::{
    errors::DiError,
    handle::DiHandle,
    resolver::Resolver,
    types::{DependencyInfo, Injectable},
};

/// Compile time name of a registration, used with [Named]
///
/// ```ignore
/// struct Primary;
/// impl ServiceName for Primary {
///     const NAME: &'static str = "db.primary";
/// }
/// ```
pub trait ServiceName: 'static {
    const NAME: &'static str;
}

/// Dependency on `T` registered under `N::NAME` instead of its type name
pub struct Named<T: Injectable, N: ServiceName> {
    inner: Arc<T>,
    _name: PhantomData<fn() -> N>,
}
impl<T: Injectable, N: ServiceName> Named<T, N> {
    pub fn inner(&self) -> Arc<T> {
        self.inner.clone()
    }

    pub fn into_inner(self) -> Arc<T> {
        self.inner
    }
}
impl<T: Injectable, N: ServiceName> Deref for Named<T, N> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
impl<T: Injectable, N: ServiceName> Clone for Named<T, N> {
    fn clone(&self) -> Self {
        Named {
            inner: self.inner.clone(),
            _name: PhantomData,
        }
    }
}
impl<T: Injectable + Debug, N: ServiceName> Debug for Named<T, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Named").field(&N::NAME).field(&self.inner).finish()
    }
}

impl<T: Injectable, N: ServiceName> Resolver for Named<T, N> {
    fn resolve(handle: &mut DiHandle) -> Result<Self, DiError> {
        Ok(Named {
            inner: handle.resolve_named::<T>(N::NAME)?,
            _name: PhantomData,
        })
    }

    fn dependency_info() -> Vec<DependencyInfo> {
        vec![DependencyInfo::named::<T>(N::NAME)]
    }
}
