use std::{any::type_name, ops::Deref, sync::Arc};

use rivet_di::{DependencyInfo, DiError, DiHandle, DynError, Injectable, Resolver};

use crate::{errors::ConfigError, provider::ConfigProvider};

/// A wrapper type to allow for config injections
///
/// Resolves `T` from the [ConfigProvider] registered in the registry, so configs
/// can be taken as constructor parameters. A missing config resolves like a missing
/// service: `NotFound`, or `None` when wrapped in an `Option`.
///
/// # Example
/// ```rust
/// use std::{convert::Infallible, sync::Arc};
/// use rivet_config::{Config, ConfigProvider};
/// use rivet_di::Registry;
///
/// struct HttpConfig {
///     port: u16,
/// }
/// struct Server {
///     port: u16,
/// }
///
/// let registry = Registry::new();
/// let mut configs = ConfigProvider::new();
/// configs.add_config(HttpConfig { port: 8080 }).unwrap();
/// configs.register(&registry).unwrap();
///
/// registry
///     .constructor(|(config,): (Config<HttpConfig>,)| {
///         Ok::<_, Infallible>(Server { port: config.port })
///     })
///     .register()
///     .unwrap();
///
/// registry.build().unwrap();
/// assert_eq!(registry.resolve::<Server>().unwrap().port, 8080);
/// ```
pub struct Config<T> {
    inner: Arc<T>,
}
impl<T> Deref for Config<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
impl<T> Clone for Config<T> {
    fn clone(&self) -> Self {
        Config {
            inner: self.inner.clone(),
        }
    }
}
impl<T> Config<T> {
    pub fn inner(&self) -> Arc<T> {
        self.inner.clone()
    }

    pub fn into_inner(self) -> Arc<T> {
        self.inner
    }
}

impl<T: Injectable> Resolver for Config<T> {
    fn resolve(handle: &mut DiHandle) -> Result<Self, DiError> {
        let config_provider = handle.resolve::<Arc<ConfigProvider>>()?;

        match config_provider.get_config::<T>() {
            Ok(inner) => Ok(Config { inner }),
            Err(ConfigError::Missing(_)) => Err(DiError::NotFound {
                name: type_name::<T>().to_string(),
            }),
            Err(other) => {
                let cause: DynError = Box::new(other);
                Err(DiError::ProviderFailed {
                    name: type_name::<T>().to_string(),
                    cause: Arc::new(cause),
                })
            }
        }
    }

    fn dependency_info() -> Vec<DependencyInfo> {
        vec![DependencyInfo::of::<ConfigProvider>()]
    }
}
