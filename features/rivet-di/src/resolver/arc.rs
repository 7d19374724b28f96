use std::sync::Arc;

use crate::{
    errors::DiError,
    handle::DiHandle,
    resolver::Resolver,
    types::{DependencyInfo, Injectable, TypeInfo},
};

impl<T: Injectable> Resolver for Arc<T> {
    fn resolve(handle: &mut DiHandle) -> Result<Self, DiError> {
        handle.resolve_named::<T>(TypeInfo::of::<T>().canonical_name())
    }

    fn dependency_info() -> Vec<DependencyInfo> {
        vec![DependencyInfo::of::<T>()]
    }
}

/// Optional dependency: if the target cannot be resolved it is `None`
///
/// Every failure of the target counts, not only a missing registration.
/// Anything beyond a plain miss is logged as a warning.
impl<Resolvable: Resolver> Resolver for Option<Resolvable> {
    fn resolve(handle: &mut DiHandle) -> Result<Self, DiError> {
        match Resolvable::resolve(handle) {
            Ok(resolved) => Ok(Some(resolved)),
            Err(e) if e.is_not_found() => {
                tracing::debug!(error = %e, "Optional dependency not available");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Optional dependency failed to resolve, continuing without it");
                Ok(None)
            }
        }
    }

    fn dependency_info() -> Vec<DependencyInfo> {
        Resolvable::dependency_info()
            .into_iter()
            .map(|original| DependencyInfo {
                optional: true,
                ..original
            })
            .collect()
    }
}
