//! Error types shared by the rate pipeline.

use thiserror::Error;

/// Failures of a single rate fetch.
///
/// Every error raised while building the request, talking to the provider or
/// decoding its reply is converted into one of these variants at the fetcher
/// boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The request URL could not be built. No I/O was attempted.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Connection level failure or a non-2xx HTTP status.
    #[error("Transport error: {reason}")]
    Transport { status: Option<u16>, reason: String },

    /// The body did not match the provider schema.
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Well-formed reply where the provider reported a logical failure.
    #[error("{0}")]
    ApiFailure(String),
}

impl FetchError {
    /// Message shown to the user when a refresh ends in this error.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::InvalidRequest(_) => "Error: Invalid API URL.".to_string(),
            FetchError::Transport { reason, .. } => format!("Network Error: {reason}"),
            FetchError::Decoding(reason) => format!("Decoding Error: {reason}"),
            FetchError::ApiFailure(message) => format!("API Failure: {message}"),
        }
    }

    /// HTTP status carried by a transport error, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    /// The request URL carries the API key as a path segment, so it is
    /// stripped before the error text is kept.
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        FetchError::Transport {
            status,
            reason: err.without_url().to_string(),
        }
    }
}

/// Rejected currency code input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid currency code: '{0}' (expected three letters, e.g. USD)")]
pub struct CurrencyCodeError(pub String);
