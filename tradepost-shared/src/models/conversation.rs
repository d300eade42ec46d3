use serde::{Deserialize, Serialize};

use super::{SubjectId, Timestamp, UserId};

/// Identity of a conversation: the other participant plus the listing it is
/// about. Previews, timestamps and unread state are projections, not identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    /// The other participant.
    pub counterpart_id: UserId,
    /// The listing the conversation is scoped to.
    pub subject_id: SubjectId,
}

impl ConversationKey {
    /// Builds a key from its two components.
    #[must_use]
    pub const fn new(counterpart_id: UserId, subject_id: SubjectId) -> Self {
        Self {
            counterpart_id,
            subject_id,
        }
    }
}

/// One row of the signed-in user's conversation list, as the backend projects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// The other participant.
    #[serde(rename = "otherUserId")]
    pub counterpart_id: UserId,

    /// Display name of the other participant.
    #[serde(rename = "otherUserName")]
    pub counterpart_name: String,

    /// The listing this conversation is about.
    #[serde(rename = "productId")]
    pub subject_id: SubjectId,

    /// Display title of the listing.
    #[serde(rename = "productTitle")]
    pub subject_title: String,

    /// Optional listing thumbnail.
    #[serde(
        rename = "productImageUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub subject_image_url: Option<String>,

    /// Text of the most recent message.
    #[serde(rename = "lastMessage", default)]
    pub last_message_preview: String,

    /// When the most recent message was sent.
    #[serde(rename = "lastMessageTime")]
    pub last_message_at: Timestamp,

    /// Whether any message addressed to the signed-in user is unread.
    pub has_unread: bool,

    /// Number of unread messages addressed to the signed-in user.
    #[serde(default)]
    pub unread_count: u32,
}

impl Conversation {
    /// Identity of this conversation.
    #[must_use]
    pub const fn key(&self) -> ConversationKey {
        ConversationKey::new(self.counterpart_id, self.subject_id)
    }

    /// Whether `other` denotes the same conversation, ignoring projections.
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        self.key() == other.key()
    }

    /// Drops any unread marker on this row.
    pub fn mark_read(&mut self) {
        self.has_unread = false;
        self.unread_count = 0;
    }
}
