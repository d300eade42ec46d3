use serde::{Deserialize, Serialize};

/// Structured error body returned by the messaging backend.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// The main error message
    #[serde(alias = "error")]
    pub message: String,
    /// Optional additional details about the error
    #[serde(default)]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Creates a new error response with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new error response with message and details.
    pub fn with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Interprets a raw response body.
    ///
    /// The backend answers rejected requests either with a JSON object or with
    /// a bare text message; blank bodies yield `None`.
    #[must_use]
    pub fn from_body(body: &str) -> Option<Self> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return None;
        }
        serde_json::from_str(trimmed)
            .ok()
            .or_else(|| Some(Self::new(trimmed)))
    }

    /// Checks if this error response has details.
    #[must_use]
    pub const fn has_details(&self) -> bool {
        self.details.is_some()
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{}: {}", self.message, details),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ErrorResponse {}
