use thiserror::Error;

/// Top-level error type for the Banter system.
///
/// Subsystem crates define their own error types where they have distinct
/// failure modes and implement `From<SubsystemError> for BanterError` so
/// that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BanterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persona error: {0}")]
    Persona(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Analytics error: {0}")]
    Analytics(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Hotkey error: {0}")]
    Hotkey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for BanterError {
    fn from(err: toml::de::Error) -> Self {
        BanterError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for BanterError {
    fn from(err: toml::ser::Error) -> Self {
        BanterError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for BanterError {
    fn from(err: serde_json::Error) -> Self {
        BanterError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Banter operations.
pub type Result<T> = std::result::Result<T, BanterError>;
