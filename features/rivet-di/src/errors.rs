use std::sync::Arc;

use thiserror::Error;

use crate::{dependency_graph::DependencyGraphErrors, types::DynError};

/// Errors raised while registering or resolving services
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// No service is registered under the name
    #[error("service '{name}' is not registered")]
    NotFound { name: String },
    /// A service with the same name exists and replacing was not allowed
    #[error("service '{name}' is already registered")]
    Duplicate { name: String },
    /// The name is already being resolved further up the chain
    #[error("circular dependency: {}", chain.join(" → "))]
    Cycle { chain: Vec<String> },
    /// The name resolves to a different type than requested
    #[error("service '{name}' provides '{actual}' but '{requested}' was requested")]
    TypeMismatch {
        name: String,
        requested: &'static str,
        actual: &'static str,
    },
    /// The registration itself is malformed
    #[error("invalid provider for '{name}': {reason}")]
    InvalidProvider { name: String, reason: String },
    /// Registration was attempted after `build`
    #[error("cannot register '{name}': the registry has already been built")]
    AlreadyBuilt { name: String },
    /// The provider returned an error of its own
    #[error("provider failed: {cause}")]
    ProviderFailed { name: String, cause: Arc<DynError> },
    /// Context wrapper naming the service being resolved when `source` occurred
    #[error("resolving {service}: {source}")]
    Resolve {
        service: String,
        /// Names that were mid-resolution above `service`
        chain: Vec<String>,
        #[source]
        source: Box<DiError>,
    },
    #[error(transparent)]
    DependencyGraph(#[from] DependencyGraphErrors),
    #[error(transparent)]
    Build(#[from] BuildErrors),
}

impl DiError {
    /// Strips all `Resolve` context wrappers and returns the underlying cause
    pub fn root(&self) -> &DiError {
        let mut current = self;
        while let DiError::Resolve { source, .. } = current {
            current = source;
        }
        current
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), DiError::NotFound { .. })
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self.root(), DiError::Cycle { .. })
    }

    /// Name of the outermost service this error is attributed to, if any
    pub fn service_name(&self) -> Option<&str> {
        match self {
            DiError::NotFound { name }
            | DiError::Duplicate { name }
            | DiError::TypeMismatch { name, .. }
            | DiError::InvalidProvider { name, .. }
            | DiError::AlreadyBuilt { name }
            | DiError::ProviderFailed { name, .. } => Some(name),
            DiError::Resolve { service, .. } => Some(service),
            DiError::Cycle { chain } => chain.last().map(String::as_str),
            DiError::DependencyGraph(_) | DiError::Build(_) => None,
        }
    }
}

/// All failures collected during a single `build`
#[derive(Error, Debug, Clone)]
pub struct BuildErrors {
    pub errors: Vec<DiError>,
}
impl std::fmt::Display for BuildErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("Building the registry failed with one or more errors:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_joins_chain_with_arrows() {
        let err = DiError::Cycle {
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "circular dependency: a → b → a");
    }

    #[test]
    fn root_unwraps_nested_context() {
        let err = DiError::Resolve {
            service: "outer".into(),
            chain: vec![],
            source: Box::new(DiError::Resolve {
                service: "inner".into(),
                chain: vec!["outer".into()],
                source: Box::new(DiError::NotFound {
                    name: "missing".into(),
                }),
            }),
        };

        assert!(err.is_not_found());
        assert_eq!(err.service_name(), Some("outer"));
        assert_eq!(
            err.to_string(),
            "resolving outer: resolving inner: service 'missing' is not registered"
        );
    }
}
