//! Error types for Fortell.

use thiserror::Error;

/// Library-level error type for Fortell operations.
#[derive(Error, Debug)]
pub enum FortellError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Story error: {0}")]
    Story(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Cover art error: {0}")]
    Artwork(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Localization error: {0}")]
    Localization(String),

    #[error("Fragment cache error: {0}")]
    Cache(String),

    /// Transient failure reported by an external service (retryable).
    #[error("Service temporarily unavailable: {0}")]
    ServiceTransient(String),

    /// Permanent failure reported by an external service (not retryable).
    #[error("Service rejected request: {0}")]
    ServicePermanent(String),

    #[error("Timed out after {0}s: {1}")]
    Timeout(u64, String),

    /// A local invariant does not hold (fragment gaps, mismatched formats...).
    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),
}

impl FortellError {
    /// Whether a retry of the failed call may succeed.
    ///
    /// Network failures, timeouts, rate limits and server errors are transient.
    /// Everything else (bad credentials, policy rejections, local errors) is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FortellError::ServiceTransient(_) | FortellError::Timeout(..) => true,
            FortellError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| is_transient_status(s.as_u16()))
            }
            _ => false,
        }
    }

    /// Classify a failed HTTP response by status code.
    pub fn from_status(status: u16, context: &str, body: &str) -> Self {
        let snippet: String = body.chars().take(300).collect();
        let message = format!("{} returned {}: {}", context, status, snippet);
        if is_transient_status(status) {
            FortellError::ServiceTransient(message)
        } else {
            FortellError::ServicePermanent(message)
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

/// Result type alias for Fortell operations.
pub type Result<T> = std::result::Result<T, FortellError>;
