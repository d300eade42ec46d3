//! One-shot inbox commands.

use std::{fmt::Display, fmt::Write as _, sync::Arc};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use clap::Args;
use messaging::{
    ActiveThreadStore, DeepLink, MessagingGateway, UnreadBroadcast,
    display::{
        avatar_initials, conversation_initials, day_label, is_new_day, sender_label,
        should_show_header, short_time,
    },
};
use shared::{
    config::ClientConfig,
    models::{Conversation, ConversationKey, Message, MessageId, SubjectId, UserId},
};

use super::gateway;

#[derive(Args, Debug)]
pub struct UserArgs {
    /// Your user id
    #[arg(long, short)]
    pub user: UserId,
}

#[derive(Args, Debug)]
pub struct ThreadArgs {
    /// Your user id
    #[arg(long, short)]
    pub user: UserId,

    /// The other participant's user id
    #[arg(long = "with")]
    pub counterpart: UserId,

    /// The listing the conversation is about
    #[arg(long)]
    pub listing: SubjectId,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Your user id
    #[arg(long, short)]
    pub user: UserId,

    /// Recipient user id
    #[arg(long)]
    pub to: UserId,

    /// The listing the message is about
    #[arg(long)]
    pub listing: SubjectId,

    /// Message text
    #[arg()]
    pub text: String,
}

#[derive(Args, Debug)]
pub struct MarkReadArgs {
    /// Your user id
    #[arg(long, short)]
    pub user: UserId,

    /// Message to mark as read
    #[arg(long)]
    pub message: MessageId,
}

pub async fn list_conversations(config: &ClientConfig, args: UserArgs) -> Result<()> {
    let gateway = gateway(config)?;
    let conversations = gateway
        .fetch_conversations(args.user)
        .await
        .context("failed to fetch conversations")?;
    print!("{}", render_conversations(&conversations, None));
    Ok(())
}

pub async fn show_thread(config: &ClientConfig, args: ThreadArgs) -> Result<()> {
    let gateway = gateway(config)?;
    let key = ConversationKey::new(args.counterpart, args.listing);
    let messages = gateway
        .fetch_thread(args.user, key)
        .await
        .context("failed to fetch messages")?;

    let counterpart_name = messages
        .iter()
        .find(|message| message.sender_id == args.counterpart)
        .map(|message| message.sender_name.as_str());
    println!("{}", DeepLink::path(key));
    print!(
        "{}",
        render_thread(&messages, args.user, counterpart_name, &Local::now())
    );
    Ok(())
}

pub async fn send(config: &ClientConfig, args: SendArgs) -> Result<()> {
    let gateway = gateway(config)?;
    let unread = UnreadBroadcast::new(Arc::clone(&gateway));
    let thread = ActiveThreadStore::new(gateway, args.user, unread);
    thread.set_target(Some(ConversationKey::new(args.to, args.listing)));

    let message = thread
        .send(&args.text)
        .await
        .context("failed to send message")?;
    println!(
        "Sent message {} at {}",
        message.id,
        message.sent_at.0.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    );
    Ok(())
}

pub async fn unread(config: &ClientConfig, args: UserArgs) -> Result<()> {
    let unread = UnreadBroadcast::new(gateway(config)?);
    let count = unread
        .refresh(args.user)
        .await
        .context("failed to fetch unread count")?;
    println!("{count}");
    Ok(())
}

pub async fn mark_read(config: &ClientConfig, args: MarkReadArgs) -> Result<()> {
    gateway(config)?
        .mark_read(args.user, args.message)
        .await
        .context("failed to mark message as read")?;
    println!("Marked message {} as read", args.message);
    Ok(())
}

/// One block per conversation; `active` is marked with `>`.
pub fn render_conversations(
    conversations: &[Conversation],
    active: Option<ConversationKey>,
) -> String {
    if conversations.is_empty() {
        return "No conversations yet.\n".to_string();
    }

    let mut out = String::new();
    for conversation in conversations {
        let marker = if active == Some(conversation.key()) {
            '>'
        } else {
            ' '
        };
        let unread = if conversation.has_unread {
            format!("  ({} unread)", conversation.unread_count.max(1))
        } else {
            String::new()
        };
        let _ = writeln!(
            out,
            "{marker} [{}] {} - {}  {}{unread}",
            conversation_initials(&conversation.counterpart_name),
            conversation.counterpart_name,
            conversation.subject_title,
            DeepLink::path(conversation.key()),
        );
        if !conversation.last_message_preview.is_empty() {
            let _ = writeln!(out, "      {}", conversation.last_message_preview);
        }
    }
    out
}

/// Thread text with day separators and sender headers, in `now`'s zone.
pub fn render_thread<Tz>(
    messages: &[Message],
    me: UserId,
    counterpart_name: Option<&str>,
    now: &DateTime<Tz>,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if messages.is_empty() {
        return "No messages yet.\n".to_string();
    }

    let tz = now.timezone();
    let mut out = String::new();
    for (index, message) in messages.iter().enumerate() {
        if is_new_day(messages, index, &tz) {
            let _ = writeln!(out, "--- {} ---", day_label(message.sent_at, now));
        }
        if should_show_header(messages, index, &tz) {
            let _ = writeln!(
                out,
                "[{}] {}  {}",
                avatar_initials(message.sender_id, me, counterpart_name),
                sender_label(message.sender_id, me, counterpart_name),
                short_time(message.sent_at, &tz),
            );
        }
        let _ = writeln!(out, "    {}", message.content);
    }
    out
}
