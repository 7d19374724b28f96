//! OS signal handling.
//!
//! Interrupt (Ctrl+C) and terminate both trigger a graceful shutdown.
//! After an interrupt a second interrupt forces an immediate exit,
//! terminate has no such escalation: a following SIGKILL is the external one.
//!
//! Signals are read through a [SignalSource], [OsSignals] unless the application
//! is given another one.

use std::{future::pending, sync::Arc};

use rivet_di::async_trait;
use tokio::task::JoinHandle;

use crate::exit::ExitStrategy;

/// Conventional exit code after an interrupt
pub const INTERRUPT_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

/// Where the application learns about shutdown signals
#[async_trait]
pub trait SignalSource: Send + Sync + 'static {
    /// Completes on the first signal that should start a graceful shutdown
    async fn shutdown(&self) -> Signal;

    /// Completes on the next interrupt
    async fn interrupt(&self);
}

/// Signals delivered to this process
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSignals;

#[async_trait]
impl SignalSource for OsSignals {
    async fn shutdown(&self) -> Signal {
        shutdown_signal().await
    }

    async fn interrupt(&self) {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "Could not listen for interrupt signals");
            pending::<()>().await;
        }
    }
}

/// Completes on the first interrupt or terminate signal
pub async fn shutdown_signal() -> Signal {
    let interrupt = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "Could not listen for interrupt signals");
            pending::<()>().await;
        }
    };

    tokio::select! {
        _ = interrupt => Signal::Interrupt,
        _ = terminate() => Signal::Terminate,
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            terminate.recv().await;
        }
        Err(error) => {
            tracing::warn!(%error, "Could not listen for terminate signals");
            pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    pending::<()>().await;
}

/// Forces an exit on the next interrupt, abort the returned task to disarm
pub(crate) fn arm_second_interrupt(
    signals: Arc<dyn SignalSource>,
    exit: Arc<dyn ExitStrategy>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        signals.interrupt().await;
        tracing::error!("Second interrupt received, forcing exit");
        exit.exit(INTERRUPT_EXIT_CODE);
    })
}
