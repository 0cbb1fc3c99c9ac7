use rankgrid_core::ValidationError;
use thiserror::Error;

/// Errors returned by [`crate::RankingClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The form failed validation; no request was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The service rejected the request as unauthenticated (HTTP 401/403).
    #[error("login required: {0}")]
    Unauthenticated(String),

    /// The anti-forgery token could not be obtained or was rejected, so the
    /// dependent action was not sent.
    #[error("could not obtain a CSRF token ({0}); refresh your session and try again")]
    CsrfUnavailable(String),

    /// Non-2xx response. `message` is taken from the response body when it
    /// carried one.
    #[error("{message}")]
    Remote { status: u16, message: String },

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ClientError {
    /// `true` when the caller should send the user to log in.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Unauthenticated(_))
    }
}
