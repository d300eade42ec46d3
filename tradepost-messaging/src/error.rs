use reqwest::StatusCode;
use shared::models::{SubjectId, UserId};
use thiserror::Error;

/// Failures surfaced by a [`MessagingGateway`](crate::gateway::MessagingGateway).
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request never produced a response (connect, timeout, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The backend rejected the caller's identity.
    #[error("not authorized ({status})")]
    Auth {
        /// 401 or 403.
        status: StatusCode,
    },

    /// Any other non-success response.
    #[error("request failed with {status}: {message}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Backend-provided message, or the raw body.
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// An endpoint URL could not be built from the configuration.
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl GatewayError {
    /// Whether retrying the same request later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => status.is_server_error(),
            Self::Auth { .. } | Self::Decode(_) | Self::InvalidUrl(_) => false,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Failures of store and session operations.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// A fetch through the gateway failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Local input was rejected before any request was issued.
    #[error("{0}")]
    Validation(&'static str),

    /// The operation needs an active conversation and there is none.
    #[error("no conversation is selected")]
    NoActiveConversation,

    /// The requested conversation is not in the loaded list.
    #[error("no conversation with user {counterpart_id} about listing {subject_id}")]
    UnknownConversation {
        /// The other participant.
        counterpart_id: UserId,
        /// The listing.
        subject_id: SubjectId,
    },

    /// Another send for the active conversation has not finished yet.
    #[error("a message is already being sent")]
    SendInProgress,

    /// The backend did not accept the message; the draft is kept for retry.
    #[error("message could not be sent: {0}")]
    SendFailed(#[source] GatewayError),

    /// The unread count could not be fetched; zero was published instead.
    #[error("unread count unavailable: {0}")]
    UnreadFetchFailed(#[source] GatewayError),
}

/// Convenience alias used across the crate.
pub type Result<T, E = MessagingError> = std::result::Result<T, E>;
