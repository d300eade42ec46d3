//! `/messages/{counterpartId}/{subjectId}` routes.

use std::{fmt, str::FromStr};

use shared::models::{ConversationKey, SubjectId, UserId};
use thiserror::Error;

/// Route prefix of the messaging view.
pub const MESSAGES_ROUTE: &str = "/messages";

/// A route that opens one conversation directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeepLink(pub ConversationKey);

/// Why a route is not a conversation deep link.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeepLinkError {
    /// Not of the form `/messages/<counterpartId>/<subjectId>`.
    #[error("expected {MESSAGES_ROUTE}/<counterpartId>/<subjectId>, got `{0}`")]
    Shape(String),
    /// A segment is not a numeric id.
    #[error("invalid id `{0}`")]
    Id(String),
}

impl DeepLink {
    /// Parses a route such as `/messages/7/42`.
    ///
    /// A query string or fragment is ignored, as is a trailing slash.
    ///
    /// # Errors
    /// Returns [`DeepLinkError`] for any other shape or a non-numeric id.
    pub fn parse(route: &str) -> Result<Self, DeepLinkError> {
        let path = route
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim()
            .trim_end_matches('/');
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        let [prefix, counterpart, subject] = segments.as_slice() else {
            return Err(DeepLinkError::Shape(route.to_string()));
        };
        if format!("/{prefix}") != MESSAGES_ROUTE {
            return Err(DeepLinkError::Shape(route.to_string()));
        }

        let counterpart: UserId = counterpart
            .parse()
            .map_err(|_| DeepLinkError::Id((*counterpart).to_string()))?;
        let subject: SubjectId = subject
            .parse()
            .map_err(|_| DeepLinkError::Id((*subject).to_string()))?;
        Ok(Self(ConversationKey::new(counterpart, subject)))
    }

    /// The route for `key`.
    #[must_use]
    pub fn path(key: ConversationKey) -> String {
        Self(key).to_string()
    }

    /// The conversation this link opens.
    #[must_use]
    pub const fn key(self) -> ConversationKey {
        self.0
    }
}

impl From<ConversationKey> for DeepLink {
    fn from(key: ConversationKey) -> Self {
        Self(key)
    }
}

impl FromStr for DeepLink {
    type Err = DeepLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DeepLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{MESSAGES_ROUTE}/{}/{}",
            self.0.counterpart_id, self.0.subject_id
        )
    }
}
