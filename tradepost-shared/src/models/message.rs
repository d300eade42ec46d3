use serde::{Deserialize, Serialize};

use super::{MessageId, SubjectId, Timestamp, UserId};

/// A single, immutable message within one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned identifier.
    #[serde(rename = "messageId")]
    pub id: MessageId,

    /// Author of the message.
    pub sender_id: UserId,

    /// Display name of the author.
    #[serde(default)]
    pub sender_name: String,

    /// Recipient, when the backend includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<UserId>,

    /// Display name of the recipient, when the backend includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_name: Option<String>,

    /// The listing the message is about.
    #[serde(rename = "productId")]
    pub subject_id: SubjectId,

    /// Listing title, when the backend includes it.
    #[serde(
        rename = "productTitle",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub subject_title: Option<String>,

    /// Message body.
    pub content: String,

    /// Server time the message was accepted.
    pub sent_at: Timestamp,

    /// Whether the recipient has fetched the message.
    #[serde(default)]
    pub is_read: bool,

    /// When the recipient first fetched the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<Timestamp>,
}

/// Body of the send endpoint; the sender travels as a query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Recipient of the message.
    #[serde(rename = "receiverId")]
    pub counterpart_id: UserId,

    /// The listing the message is about.
    #[serde(rename = "productId")]
    pub subject_id: SubjectId,

    /// Trimmed, non-empty message text.
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_message_deserializes_minimal_backend_shape() {
        let json = r#"{
            "messageId": 501,
            "senderId": 3,
            "senderName": "Grace",
            "productId": 11,
            "content": "Is the price negotiable?",
            "sentAt": "2025-03-08T14:30:00Z",
            "isRead": false
        }"#;

        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.id, MessageId(501));
        assert_eq!(message.sender_id, UserId(3));
        assert_eq!(message.receiver_id, None);
        assert_eq!(message.subject_title, None);
        assert_eq!(
            message.sent_at,
            Timestamp(Utc.with_ymd_and_hms(2025, 3, 8, 14, 30, 0).unwrap())
        );
        assert!(!message.is_read);
    }

    #[test]
    fn test_send_request_uses_backend_field_names() {
        let request = SendMessageRequest {
            counterpart_id: UserId(7),
            subject_id: SubjectId(11),
            content: "hello".into(),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["receiverId"], 7);
        assert_eq!(value["productId"], 11);
        assert_eq!(value["content"], "hello");
    }
}
