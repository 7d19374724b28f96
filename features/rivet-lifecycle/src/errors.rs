use std::{sync::Arc, time::Duration};

use rivet_di::{BuildErrors, DiError, DynError};
use thiserror::Error;

use crate::app::AppState;

/// Errors raised while building, starting or stopping an application
#[derive(Error, Debug, Clone)]
pub enum LifecycleError {
    #[error(transparent)]
    Di(#[from] DiError),
    /// Some services could not be placed in any layer
    #[error("circular dependency between services: {}", remaining.join(", "))]
    CircularDependency { remaining: Vec<String> },
    #[error("starting service {service}: {cause}")]
    Start {
        service: String,
        cause: Arc<DynError>,
    },
    #[error("stopping service {service}: {cause}")]
    Stop {
        service: String,
        cause: Arc<DynError>,
    },
    /// A hook did not finish within its timeout and was abandoned
    #[error("{hook} hook of service {service} exceeded its deadline of {timeout:?} (abandoned after {elapsed:?})")]
    DeadlineExceeded {
        service: String,
        hook: Hook,
        timeout: Duration,
        elapsed: Duration,
    },
    #[error("{hook} hook of service {service} panicked")]
    Panicked { service: String, hook: Hook },
    #[error("the application is already running")]
    AlreadyRunning,
    /// A stop was requested before every layer had started
    #[error("startup was interrupted by a stop request")]
    Interrupted,
    #[error("cannot {operation} while the application is {state:?}")]
    InvalidState {
        state: AppState,
        operation: &'static str,
    },
}

impl From<BuildErrors> for LifecycleError {
    fn from(errors: BuildErrors) -> Self {
        LifecycleError::Di(errors.into())
    }
}

impl LifecycleError {
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, LifecycleError::DeadlineExceeded { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, LifecycleError::Interrupted)
    }

    /// The service this error is attributed to, if any
    pub fn service(&self) -> Option<&str> {
        match self {
            LifecycleError::Start { service, .. }
            | LifecycleError::Stop { service, .. }
            | LifecycleError::DeadlineExceeded { service, .. }
            | LifecycleError::Panicked { service, .. } => Some(service),
            LifecycleError::Di(error) => error.service_name(),
            _ => None,
        }
    }
}

/// Which hook an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Start,
    Stop,
}
impl std::fmt::Display for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Hook::Start => f.write_str("start"),
            Hook::Stop => f.write_str("stop"),
        }
    }
}

/// Every failure of one start or stop pass, joined together
#[derive(Error, Debug, Clone)]
pub struct LifecycleErrors {
    pub errors: Vec<LifecycleError>,
}
impl std::fmt::Display for LifecycleErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let [single] = self.errors.as_slice() {
            return write!(f, "{single}");
        }

        let mut display = Vec::new();
        display.push("One or more lifecycle errors occurred:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}
impl From<LifecycleError> for LifecycleErrors {
    fn from(error: LifecycleError) -> Self {
        LifecycleErrors {
            errors: vec![error],
        }
    }
}
impl LifecycleErrors {
    pub fn iter(&self) -> impl Iterator<Item = &LifecycleError> {
        self.errors.iter()
    }

    pub fn has_deadline_exceeded(&self) -> bool {
        self.errors.iter().any(LifecycleError::is_deadline_exceeded)
    }

    /// Errors attributed to `service`
    pub fn for_service<'a>(&'a self, service: &'a str) -> impl Iterator<Item = &'a LifecycleError> {
        self.errors
            .iter()
            .filter(move |error| error.service() == Some(service))
    }
}
