#![cfg_attr(not(test), forbid(unsafe_code))]

//! Client-side synchronization core for Tradepost messaging.
//!
//! The backend offers request/response endpoints only, so the core keeps a
//! conversation list and the active thread current by polling:
//!
//! * [`gateway`]: the backend operations, plus an HTTP implementation.
//! * [`unread`]: the shared unread-count channel consumed by badges.
//! * [`conversations`] and [`thread`]: the two stores and their
//!   reconciliation rules.
//! * [`scheduler`]: cancellable repeating tasks for the list and thread polls.
//! * [`session`]: the view-model tying them together.
//! * [`display`] and [`deep_link`]: pure helpers for rendering and routing.

pub mod conversations;
pub mod deep_link;
pub mod display;
pub mod error;
pub mod gateway;
pub mod scheduler;
pub mod session;
pub mod thread;
pub mod unread;

#[cfg(test)]
pub mod test_implementations;

pub use conversations::{ConversationListState, ConversationListStore, ListLoad};
pub use deep_link::{DeepLink, DeepLinkError};
pub use error::{GatewayError, MessagingError, Result};
pub use gateway::{HttpGateway, MessagingGateway, SharedGateway};
pub use scheduler::{PollTask, PollingScheduler};
pub use session::{MessagingSession, MessagingSnapshot, SessionOptions};
pub use thread::{ActiveThreadStore, ThreadLoad, ThreadState};
pub use unread::{UnreadBroadcast, UnreadSubscription};
