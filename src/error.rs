use thiserror::Error;

/// An experiment could not be assembled from its configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The experiment name is empty or only whitespace
    #[error("experiment name must be non-empty and have text")]
    BlankName,

    /// The compared type differs from the output type and nothing maps one
    /// onto the other
    #[error("experiment `{0}` compares a simplified type but has no simplifier")]
    MissingSimplifier(String),

    /// A sampling percentage outside of 0..=100
    #[error("sampling percentage must be between 0 and 100, got {0}")]
    InvalidPercent(f64),
}

/// A registry lookup failed
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The name is registered to an experiment of a different type
    #[error("experiment `{name}` is registered with a different type than `{requested}`")]
    TypeMismatch {
        name: String,
        requested: &'static str,
    },

    /// The experiment built for a name carries a different name
    #[error("experiment registered as `{key}` is named `{name}`")]
    NameMismatch { key: String, name: String },

    /// Constructing the experiment on first access failed
    #[error(transparent)]
    Config(#[from] ConfigError),
}
