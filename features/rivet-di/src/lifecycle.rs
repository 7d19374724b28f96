use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::types::{DynError, Injectable, Instance};

/// Start/stop capability of a registered service
///
/// Register a service with `with_lifecycle()` and the orchestrator will call
/// `on_start` in dependency order and `on_stop` in reverse dependency order.
/// Both hooks default to doing nothing, so a service may implement only one.
#[async_trait]
pub trait Lifecycle: Injectable {
    async fn on_start(&self, ctx: HookContext) -> Result<(), DynError> {
        let _ = ctx;
        Ok(())
    }

    async fn on_stop(&self, ctx: HookContext) -> Result<(), DynError> {
        let _ = ctx;
        Ok(())
    }

    /// Overrides the orchestrator's default stop timeout for this service
    fn stop_timeout(&self) -> Option<Duration> {
        None
    }
}

/// Context handed to every hook invocation
///
/// The token is cancelled once the hook's deadline passes or the application
/// is torn down. The orchestrator only stops waiting at that point, so hooks
/// that keep working past cancellation are abandoned, not killed.
#[derive(Debug, Clone)]
pub struct HookContext {
    service: Arc<str>,
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl HookContext {
    pub fn new(service: &str, token: CancellationToken, deadline: Option<Instant>) -> Self {
        HookContext {
            service: service.into(),
            token,
            deadline,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, `None` if the hook is unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Recovers the lifecycle view of a type-erased instance
pub(crate) type LifecycleAdapter = fn(&Instance) -> Option<Arc<dyn Lifecycle>>;

pub(crate) fn adapter_for<T: Lifecycle>() -> LifecycleAdapter {
    fn adapt<T: Lifecycle>(instance: &Instance) -> Option<Arc<dyn Lifecycle>> {
        instance
            .downcast::<T>()
            .ok()
            .map(|service| service as Arc<dyn Lifecycle>)
    }
    adapt::<T>
}
