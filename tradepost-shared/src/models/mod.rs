//! Data transfer types exchanged with the marketplace messaging backend.

pub mod conversation;
pub mod errors;
pub mod ids;
pub mod message;
pub mod timestamp;

pub use conversation::{Conversation, ConversationKey};
pub use errors::ErrorResponse;
pub use ids::{MessageId, SubjectId, UserId};
pub use message::{Message, SendMessageRequest};
pub use timestamp::Timestamp;
