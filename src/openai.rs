//! OpenAI client configuration and error classification.

use crate::error::{FortellError, Result};
use async_openai::error::OpenAIError;
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// API error fragments that indicate a temporary condition.
const TRANSIENT_MARKERS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "server_error",
    "overloaded",
    "timeout",
    "temporarily",
    "try again",
];

/// Create an OpenAI client with a custom timeout.
pub fn create_client_with_timeout(timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Client::with_config(OpenAIConfig::default()).with_http_client(http_client))
}

/// Map an OpenAI client error onto the retryable/permanent taxonomy.
pub fn classify_error(context: &str, err: OpenAIError) -> FortellError {
    match err {
        OpenAIError::Reqwest(e) => FortellError::Http(e),
        other => {
            let message = other.to_string();
            let lower = message.to_lowercase();
            if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
                FortellError::ServiceTransient(format!("{}: {}", context, message))
            } else {
                FortellError::OpenAI(format!("{}: {}", context, message))
            }
        }
    }
}
