//! Rivet DI provides the service registry of a Rivet application.
//!
//! It consists of the following parts:
//! 1. [Registry] - registration of providers, constructors and prebuilt instances,
//!    scoping (singleton, transient, instance) and eager building
//! 2. [DiHandle] - resolution with per-call cycle detection; every resolution records
//!    a parent -> child edge in the [DependencyGraph]
//! 3. [Resolver] - constructor injection: `Arc<T>`, `Option<_>`, [Named], [Lazy] and tuples
//! 4. [Lifecycle] - the start/stop capability picked up by `rivet-lifecycle`
//!
//! # Example
//!
//! ```rust
//! use std::{convert::Infallible, sync::Arc};
//! use rivet_di::Registry;
//!
//! struct Settings {
//!     url: String,
//! }
//! struct Database {
//!     url: String,
//! }
//!
//! let registry = Registry::new();
//! registry
//!     .instance(Settings { url: "postgres://localhost".to_string() })
//!     .register()
//!     .unwrap();
//! registry
//!     .constructor(|(settings,): (Arc<Settings>,)| {
//!         Ok::<_, Infallible>(Database { url: settings.url.clone() })
//!     })
//!     .register()
//!     .unwrap();
//!
//! registry.build().unwrap();
//! let database = registry.resolve::<Database>().unwrap();
//! assert_eq!(database.url, "postgres://localhost");
//! ```

pub mod builder;
pub mod dependency_graph;
pub mod errors;
pub mod handle;
pub mod lifecycle;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod types;

pub use async_trait::async_trait;
pub use builder::ServiceBuilder;
pub use dependency_graph::{DependencyGraph, DependencyGraphError, DependencyGraphErrors};
pub use errors::{BuildErrors, DiError};
pub use handle::DiHandle;
pub use lifecycle::{HookContext, Lifecycle};
pub use record::{Laziness, Scope, ServiceRecord};
pub use registry::{BuildState, Registry};
pub use resolver::{
    lazy::Lazy,
    named::{Named, ServiceName},
    Resolver,
};
pub use types::{DependencyInfo, DynError, Injectable, Instance, TypeInfo};
