use rivet_di::TypeInfo;

/// Errors of the config registry
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The required Config is not known
    #[error("config {0} is not registered")]
    Missing(TypeInfo),
    /// A config of this type was added before
    #[error("config {0} is already registered")]
    AlreadyRegistered(TypeInfo),
}
