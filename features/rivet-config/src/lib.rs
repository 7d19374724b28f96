//! Rivet Config provides a typed registry of configs that can be injected into services.
//!
//! It is split into two parts:
//! 1. [ConfigProvider]: the registry of all configs, one per type
//! 2. [Config]: a wrapper to resolve a config as a constructor dependency
//!
//! Loading configs from files or the environment is left to the application,
//! this crate only makes the loaded values available to the registry.

pub mod config;
pub mod errors;
pub mod provider;

pub use config::Config;
pub use errors::ConfigError;
pub use provider::ConfigProvider;
