use crate::{errors::DiError, handle::DiHandle, types::DependencyInfo};

pub mod arc;
pub mod lazy;
pub mod named;
mod tuple;

/// Anything that can be injected into a constructor
///
/// Implemented for `Arc<T>`, `Option<_>`, [named::Named], [lazy::Lazy] and tuples of resolvers,
/// so a constructor declares its dependencies through its parameter type.
pub trait Resolver: Sized {
    fn resolve(handle: &mut DiHandle) -> Result<Self, DiError>;

    /// Dependencies this resolver pulls from the registry
    fn dependency_info() -> Vec<DependencyInfo>;
}
