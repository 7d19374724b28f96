use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt::Debug,
    sync::Arc,
};

use rivet_di::{DiError, Injectable, Registry, TypeInfo};

use crate::errors::ConfigError;

/// A provider to register all configs.
///
/// Configs are stored and retrieved by type, at most one per type.
#[derive(Default)]
pub struct ConfigProvider {
    configs: HashMap<TypeId, (TypeInfo, Arc<dyn Any + Send + Sync + 'static>)>,
}

impl Debug for ConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.configs.values().map(|(info, _)| info.type_name).collect();
        names.sort_unstable();
        f.debug_struct("ConfigProvider").field("configs", &names).finish()
    }
}

impl ConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve a config with specified type.
    ///
    /// Fails with [`ConfigError::Missing`] if no config of that type was added
    pub fn get_config<T: Injectable>(&self) -> Result<Arc<T>, ConfigError> {
        self.configs
            .get(&TypeId::of::<T>())
            .and_then(|(_, entry)| entry.clone().downcast().ok())
            .ok_or_else(|| ConfigError::Missing(TypeInfo::of::<T>()))
    }

    /// Add a config to the registry.
    ///
    /// If the config type is already registered, it will return a
    /// [`ConfigError::AlreadyRegistered`] error
    pub fn add_config<T: Injectable>(&mut self, config: T) -> Result<&mut Self, ConfigError> {
        let info = TypeInfo::of::<T>();
        if self.configs.contains_key(&info.type_id) {
            return Err(ConfigError::AlreadyRegistered(info));
        }

        tracing::debug!(config = info.type_name, "Added config");
        self.configs.insert(info.type_id, (info, Arc::new(config)));
        Ok(self)
    }

    /// Can optionally add a config to the registry.
    ///
    /// If the config provided is `Some(T)`, it will be the same as calling [`ConfigProvider::add_config`]
    /// If the config provided is `None`, then the function just returns `Ok(self)` for chaining
    pub fn maybe_add_config<T: Injectable>(
        &mut self,
        config: Option<T>,
    ) -> Result<&mut Self, ConfigError> {
        match config {
            Some(c) => self.add_config(c),
            None => Ok(self),
        }
    }

    pub fn contains<T: Injectable>(&self) -> bool {
        self.configs.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Registers the provider as an instance so services can inject `Config<T>`
    pub fn register(self, registry: &Registry) -> Result<(), DiError> {
        registry.instance(self).register()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Http {
        port: u16,
    }

    #[test]
    fn added_configs_are_retrieved_by_type() {
        let mut provider = ConfigProvider::new();
        provider
            .add_config(Http { port: 8080 })
            .unwrap()
            .add_config("name".to_string())
            .unwrap();

        assert_eq!(*provider.get_config::<Http>().unwrap(), Http { port: 8080 });
        assert_eq!(*provider.get_config::<String>().unwrap(), "name");
        assert_eq!(provider.len(), 2);
    }

    #[test]
    fn missing_config_is_an_error() {
        let provider = ConfigProvider::new();

        assert_eq!(
            provider.get_config::<Http>().unwrap_err(),
            ConfigError::Missing(TypeInfo::of::<Http>())
        );
    }

    #[test]
    fn one_config_per_type() {
        let mut provider = ConfigProvider::new();
        provider.add_config(Http { port: 1 }).unwrap();

        let err = provider.add_config(Http { port: 2 }).unwrap_err();

        assert_eq!(err, ConfigError::AlreadyRegistered(TypeInfo::of::<Http>()));
        assert_eq!(provider.get_config::<Http>().unwrap().port, 1);
    }

    #[test]
    fn maybe_add_config_skips_none() {
        let mut provider = ConfigProvider::new();
        provider
            .maybe_add_config::<Http>(None)
            .unwrap()
            .maybe_add_config(Some(3u8))
            .unwrap();

        assert!(!provider.contains::<Http>());
        assert!(provider.contains::<u8>());
    }
}
