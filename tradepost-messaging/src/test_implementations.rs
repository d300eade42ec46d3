//! Scripted gateway and fixtures shared by the unit tests.

use std::{
    collections::HashMap,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicI64, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shared::models::{
    Conversation, ConversationKey, Message, MessageId, SendMessageRequest, SubjectId, Timestamp,
    UserId,
};
use tokio::sync::oneshot;

use crate::{error::GatewayError, gateway::MessagingGateway};

pub const ME: UserId = UserId(1);

pub fn key(counterpart: i64, subject: i64) -> ConversationKey {
    ConversationKey::new(UserId(counterpart), SubjectId(subject))
}

pub fn conversation(counterpart: i64, subject: i64, unread: u32) -> Conversation {
    Conversation {
        counterpart_id: UserId(counterpart),
        counterpart_name: format!("User {counterpart}"),
        subject_id: SubjectId(subject),
        subject_title: format!("Listing {subject}"),
        subject_image_url: None,
        last_message_preview: "hi".into(),
        last_message_at: at(2025, 3, 8, 12, 0),
        has_unread: unread > 0,
        unread_count: unread,
    }
}

pub fn message(id: i64, sender: UserId, subject: i64, content: &str) -> Message {
    Message {
        id: MessageId(id),
        sender_id: sender,
        sender_name: format!("User {sender}"),
        receiver_id: None,
        receiver_name: None,
        subject_id: SubjectId(subject),
        subject_title: None,
        content: content.into(),
        sent_at: at(2025, 3, 8, 12, 0),
        is_read: false,
        read_at: None,
    }
}

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Timestamp {
    Timestamp(
        Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .expect("valid fixture timestamp"),
    )
}

/// Calls observed by a [`ScriptedGateway`].
#[derive(Debug, Default, Clone)]
pub struct CallLog {
    pub conversations: usize,
    pub threads: Vec<ConversationKey>,
    pub sends: Vec<SendMessageRequest>,
    pub unread: usize,
    pub mark_read: Vec<MessageId>,
}

impl CallLog {
    pub fn total(&self) -> usize {
        self.conversations + self.threads.len() + self.sends.len() + self.unread + self.mark_read.len()
    }
}

/// In-memory gateway whose answers are set by the test.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    conversations: Mutex<Vec<Conversation>>,
    conversations_fail: Mutex<bool>,
    threads: Mutex<HashMap<ConversationKey, Vec<Message>>>,
    thread_fail: Mutex<bool>,
    send_fail: Mutex<bool>,
    unread: Mutex<Option<i64>>,
    gates: Mutex<HashMap<ConversationKey, oneshot::Receiver<()>>>,
    conversations_gate: Mutex<Option<oneshot::Receiver<()>>>,
    calls: Mutex<CallLog>,
    next_id: AtomicI64,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedGateway {
    pub fn new() -> Self {
        let gateway = Self::default();
        gateway.next_id.store(1000, Ordering::SeqCst);
        *lock(&gateway.unread) = Some(0);
        gateway
    }

    pub fn set_conversations(&self, list: Vec<Conversation>) {
        *lock(&self.conversations) = list;
    }

    pub fn fail_conversations(&self, fail: bool) {
        *lock(&self.conversations_fail) = fail;
    }

    pub fn set_thread(&self, conversation: ConversationKey, messages: Vec<Message>) {
        lock(&self.threads).insert(conversation, messages);
    }

    pub fn fail_threads(&self, fail: bool) {
        *lock(&self.thread_fail) = fail;
    }

    pub fn fail_sends(&self, fail: bool) {
        *lock(&self.send_fail) = fail;
    }

    /// `None` makes the unread endpoint fail.
    pub fn set_unread(&self, count: Option<i64>) {
        *lock(&self.unread) = count;
    }

    /// Holds the next thread fetch for `conversation` until the sender fires.
    pub fn hold_thread(&self, conversation: ConversationKey) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        lock(&self.gates).insert(conversation, rx);
        tx
    }

    /// Holds the next conversation list fetch until the sender fires.
    pub fn hold_conversations(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *lock(&self.conversations_gate) = Some(rx);
        tx
    }

    pub fn calls(&self) -> CallLog {
        lock(&self.calls).clone()
    }
}

fn offline() -> GatewayError {
    GatewayError::Network("scripted failure".into())
}

#[async_trait]
impl MessagingGateway for ScriptedGateway {
    async fn fetch_conversations(&self, _user: UserId) -> Result<Vec<Conversation>, GatewayError> {
        lock(&self.calls).conversations += 1;
        let gate = lock(&self.conversations_gate).take();
        let conversations = lock(&self.conversations).clone();
        let fail = *lock(&self.conversations_fail);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if fail {
            return Err(offline());
        }
        Ok(conversations)
    }

    async fn fetch_thread(
        &self,
        _user: UserId,
        conversation: ConversationKey,
    ) -> Result<Vec<Message>, GatewayError> {
        lock(&self.calls).threads.push(conversation);
        let gate = lock(&self.gates).remove(&conversation);
        let messages = lock(&self.threads)
            .get(&conversation)
            .cloned()
            .unwrap_or_default();
        let fail = *lock(&self.thread_fail);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if fail {
            return Err(offline());
        }
        Ok(messages)
    }

    async fn send_message(
        &self,
        user: UserId,
        request: &SendMessageRequest,
    ) -> Result<Message, GatewayError> {
        lock(&self.calls).sends.push(request.clone());
        if *lock(&self.send_fail) {
            return Err(offline());
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut sent = message(id, user, request.subject_id.get(), &request.content);
        sent.receiver_id = Some(request.counterpart_id);
        Ok(sent)
    }

    async fn fetch_unread_count(&self, _user: UserId) -> Result<i64, GatewayError> {
        lock(&self.calls).unread += 1;
        (*lock(&self.unread)).ok_or_else(offline)
    }

    async fn mark_read(&self, _user: UserId, message: MessageId) -> Result<(), GatewayError> {
        lock(&self.calls).mark_read.push(message);
        Ok(())
    }
}
