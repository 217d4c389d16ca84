//! Error types for line generation.

use banter_core::error::BanterError;

/// Errors from a single generation attempt.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("generated text was empty after cleanup")]
    EmptyOutput,
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        GenerationError::Http(err.to_string())
    }
}

impl From<GenerationError> for BanterError {
    fn from(err: GenerationError) -> Self {
        BanterError::Generation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_display() {
        assert_eq!(GenerationError::MissingApiKey.to_string(), "no API key configured");
        let err = GenerationError::Status {
            status: 429,
            body: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "API returned status 429: rate limited");
        assert_eq!(
            GenerationError::MalformedResponse("no choices".into()).to_string(),
            "malformed response: no choices"
        );
    }

    #[test]
    fn test_into_banter_error() {
        let err: BanterError = GenerationError::EmptyOutput.into();
        assert!(matches!(err, BanterError::Generation(_)));
    }
}
