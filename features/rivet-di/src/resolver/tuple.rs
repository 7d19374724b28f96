use crate::{errors::DiError, handle::DiHandle, resolver::Resolver, types::DependencyInfo};

impl Resolver for () {
    fn resolve(_: &mut DiHandle) -> Result<Self, DiError> {
        Ok(())
    }

    fn dependency_info() -> Vec<DependencyInfo> {
        Vec::new()
    }
}

macro_rules! impl_resolver_for_tuple {
    ($($dep:ident),+) => {
        impl<$($dep: Resolver),+> Resolver for ($($dep,)+) {
            fn resolve(handle: &mut DiHandle) -> Result<Self, DiError> {
                Ok(($($dep::resolve(handle)?,)+))
            }

            fn dependency_info() -> Vec<DependencyInfo> {
                let mut dependencies = Vec::new();
                $(dependencies.extend($dep::dependency_info());)+
                dependencies
            }
        }
    };
}

impl_resolver_for_tuple!(A);
impl_resolver_for_tuple!(A, B);
impl_resolver_for_tuple!(A, B, C);
impl_resolver_for_tuple!(A, B, C, D);
impl_resolver_for_tuple!(A, B, C, D, E);
impl_resolver_for_tuple!(A, B, C, D, E, F);
impl_resolver_for_tuple!(A, B, C, D, E, F, G);
impl_resolver_for_tuple!(A, B, C, D, E, F, G, H);
