//! Rivet Lifecycle starts and stops the services of a [rivet_di::Registry].
//!
//! Services registered `with_lifecycle()` get their [Lifecycle] hooks called:
//! - on start, layer by layer in dependency order, each layer concurrently
//! - on stop, in reverse order, one service at a time, each under its own timeout
//!
//! The whole shutdown is bounded by a global timeout, exceeding it forces the process
//! to exit through the configured [ExitStrategy].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::{convert::Infallible, time::Duration};
//! use rivet_lifecycle::{async_trait, App, DynError, HookContext, Lifecycle, Registry};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Server;
//!
//! #[async_trait]
//! impl Lifecycle for Server {
//!     async fn on_start(&self, _ctx: HookContext) -> Result<(), DynError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Registry::new();
//!     registry
//!         .singleton(|_| Ok::<_, Infallible>(Server))
//!         .with_lifecycle()
//!         .register()
//!         .unwrap();
//!
//!     let app = App::builder(registry)
//!         .stop_timeout(Duration::from_secs(5))
//!         .build();
//!     app.run(CancellationToken::new()).await.unwrap();
//! }
//! ```

pub mod app;
pub mod config;
pub mod errors;
pub mod exit;
pub mod order;
pub mod signals;
mod watchdog;

pub use app::{App, AppBuilder, AppState, StopHandle, StopReason};
pub use config::LifecycleConfig;
pub use errors::{Hook, LifecycleError, LifecycleErrors};
pub use exit::{ExitStrategy, ProcessExit};
pub use order::{compute_shutdown_order, compute_startup_order, Layers};
pub use signals::{shutdown_signal, OsSignals, Signal, SignalSource, INTERRUPT_EXIT_CODE};

pub use rivet_di::{async_trait, DynError, HookContext, Lifecycle, Registry};
