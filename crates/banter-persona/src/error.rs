use std::path::PathBuf;

use banter_core::error::BanterError;
use thiserror::Error;

/// Errors from reading or validating a persona definition file.
#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("Failed to read persona file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Persona file is not valid JSON: {0}")]
    Parse(String),

    #[error("Persona file must contain a JSON array")]
    NotAnArray,

    #[error("Persona file contains no valid personas")]
    NoValidEntries,

    #[error("Failed to watch persona file: {0}")]
    Watch(String),
}

impl From<PersonaError> for BanterError {
    fn from(err: PersonaError) -> Self {
        BanterError::Persona(err.to_string())
    }
}
