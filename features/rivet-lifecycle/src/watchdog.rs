use std::{
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    thread,
    time::Duration,
};

use crate::exit::ExitStrategy;

/// Forces an exit if shutdown takes longer than the global timeout
///
/// Runs on its own OS thread, so it fires even when the async runtime is
/// stuck in a blocking hook. Dropping the watchdog disarms it.
pub(crate) struct Watchdog {
    _disarm: Option<mpsc::Sender<()>>,
}

impl Watchdog {
    pub(crate) fn arm(timeout: Duration, exit: Arc<dyn ExitStrategy>, code: i32) -> Self {
        let (disarm_tx, disarm_rx) = mpsc::channel::<()>();

        let spawned = thread::Builder::new()
            .name("rivet-shutdown-watchdog".to_string())
            .spawn(move || match disarm_rx.recv_timeout(timeout) {
                Err(RecvTimeoutError::Timeout) => {
                    tracing::error!(
                        ?timeout,
                        code,
                        "Shutdown exceeded the global timeout, forcing exit"
                    );
                    exit.exit(code);
                }
                // Disarmed
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            });

        match spawned {
            Ok(_) => Watchdog {
                _disarm: Some(disarm_tx),
            },
            Err(error) => {
                tracing::warn!(%error, "Could not spawn shutdown watchdog, shutdown is unbounded");
                Watchdog { _disarm: None }
            }
        }
    }
}
