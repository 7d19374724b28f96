/// How the orchestrator terminates the process when shutdown cannot complete
///
/// Injected into the [crate::App] so forced exits can be observed in tests.
pub trait ExitStrategy: Send + Sync + 'static {
    fn exit(&self, code: i32);
}

/// Exits the process immediately, skipping destructors
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExit;

impl ExitStrategy for ProcessExit {
    fn exit(&self, code: i32) {
        std::process::exit(code)
    }
}
