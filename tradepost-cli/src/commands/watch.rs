//! Live view: polls conversations, the open thread and the unread badge,
//! redrawing whenever something changes, while stdin drives the view.

use std::{fmt::Write as _, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use clap::Args;
use messaging::{DeepLink, MessagingSession, MessagingSnapshot, SessionOptions, UnreadBroadcast};
use shared::{
    config::ClientConfig,
    models::{ConversationKey, SubjectId, UserId},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::Notify,
};
use tracing::debug;

use super::{
    gateway,
    inbox::{render_conversations, render_thread},
};

const HELP: &str = "Commands: /open <userId> <listingId> (or a /messages/... route), /refresh, /quit. Any other line is sent to the open conversation.";

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Your user id
    #[arg(long, short)]
    pub user: UserId,

    /// Conversation to open as soon as it exists, e.g. /messages/7/42
    #[arg(long)]
    pub open: Option<DeepLink>,
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Empty,
    Open(ConversationKey),
    Refresh,
    Quit,
    Help,
    Send(String),
    Invalid(&'static str),
}

fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }
    if !trimmed.starts_with('/') {
        return Input::Send(line.to_string());
    }
    if let Ok(link) = DeepLink::parse(trimmed) {
        return Input::Open(link.key());
    }

    let mut parts = trimmed.split_whitespace();
    match parts.next() {
        Some("/quit" | "/q") => Input::Quit,
        Some("/refresh") => Input::Refresh,
        Some("/help") => Input::Help,
        Some("/open") => {
            let rest: Vec<&str> = parts.collect();
            match rest.as_slice() {
                [route] => DeepLink::parse(route)
                    .map(|link| Input::Open(link.key()))
                    .unwrap_or(Input::Invalid("usage: /open <userId> <listingId>")),
                [counterpart, subject] => match (counterpart.parse(), subject.parse()) {
                    (Ok(counterpart), Ok(subject)) => Input::Open(ConversationKey::new(
                        UserId(counterpart),
                        SubjectId(subject),
                    )),
                    _ => Input::Invalid("ids must be numbers"),
                },
                _ => Input::Invalid("usage: /open <userId> <listingId>"),
            }
        }
        _ => Input::Invalid("unknown command, try /help"),
    }
}

pub async fn watch(config: &ClientConfig, args: WatchArgs) -> Result<()> {
    let gateway = gateway(config)?;
    let unread = UnreadBroadcast::new(Arc::clone(&gateway));
    let changed = Arc::new(Notify::new());
    let _badge = {
        let changed = Arc::clone(&changed);
        unread.subscribe(move |_| changed.notify_one())
    };
    let badge_poll = unread.poll(args.user, config.polling.unread_interval());
    if let Err(err) = unread.refresh(args.user).await {
        eprintln!("warning: {err}");
    }

    let session = MessagingSession::new(
        args.user,
        gateway,
        Arc::clone(&unread),
        SessionOptions {
            polling: config.polling.clone(),
            deep_link: args.open.map(DeepLink::key),
        },
    );
    if let Err(err) = session.start().await {
        eprintln!("warning: {err}");
    }

    println!("{HELP}");
    let mut last: Option<MessagingSnapshot> = None;
    redraw(&session, &mut last);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    break;
                };
                match parse_input(&line) {
                    Input::Empty => {}
                    Input::Quit => break,
                    Input::Help => println!("{HELP}"),
                    Input::Invalid(reason) => eprintln!("{reason}"),
                    Input::Refresh => {
                        if let Err(err) = session.refresh().await {
                            eprintln!("warning: {err}");
                        }
                    }
                    Input::Open(key) => {
                        if let Err(err) = session.select_by_key(key).await {
                            eprintln!("warning: {err}");
                        }
                    }
                    Input::Send(text) => {
                        session.set_draft(text);
                        if let Err(err) = session.send_message().await {
                            eprintln!("warning: {err}");
                        }
                    }
                }
            }
            () = changed.notified() => debug!("unread badge changed"),
            _ = ticker.tick() => {}
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for ctrl-c")?;
                break;
            }
        }
        redraw(&session, &mut last);
    }

    session.teardown();
    drop(badge_poll);
    Ok(())
}

fn redraw(session: &MessagingSession, last: &mut Option<MessagingSnapshot>) {
    let snapshot = session.snapshot();
    if last.as_ref() == Some(&snapshot) {
        return;
    }
    print!("{}", render_view(&snapshot, session.user(), &Local::now()));
    *last = Some(snapshot);
}

/// Full text of the view for one snapshot.
fn render_view<Tz>(snapshot: &MessagingSnapshot, me: UserId, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    let _ = writeln!(out, "\n=== Messages ({} unread) ===", snapshot.unread_count);
    if snapshot.conversations_loading {
        out.push_str("Loading conversations...\n");
    }
    if let Some(error) = &snapshot.conversations_error {
        let _ = writeln!(out, "! {error}");
    }
    out.push_str(&render_conversations(
        &snapshot.conversations,
        snapshot.active.as_ref().map(|active| active.key()),
    ));

    let Some(active) = &snapshot.active else {
        out.push_str("\nSelect a conversation with /open <userId> <listingId>.\n");
        return out;
    };

    let _ = writeln!(
        out,
        "\n--- {} - {} ({}) ---",
        active.counterpart_name,
        active.subject_title,
        snapshot.route.as_deref().unwrap_or_default()
    );
    if snapshot.messages_loading {
        out.push_str("Loading messages...\n");
    }
    if let Some(error) = &snapshot.messages_error {
        let _ = writeln!(out, "! {error}");
    }
    out.push_str(&render_thread(
        &snapshot.messages,
        me,
        Some(active.counterpart_name.as_str()),
        now,
    ));
    if snapshot.sending {
        out.push_str("Sending...\n");
    }
    if let Some(error) = &snapshot.send_error {
        let _ = writeln!(out, "! {error}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::models::{Conversation, Timestamp};

    fn key(counterpart: i64, subject: i64) -> ConversationKey {
        ConversationKey::new(UserId(counterpart), SubjectId(subject))
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_input("   "), Input::Empty);
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(parse_input("/refresh"), Input::Refresh);
        assert_eq!(parse_input("/open 7 42"), Input::Open(key(7, 42)));
        assert_eq!(parse_input("/open /messages/7/42"), Input::Open(key(7, 42)));
        assert_eq!(parse_input("/messages/7/42"), Input::Open(key(7, 42)));
        assert!(matches!(parse_input("/open 7"), Input::Invalid(_)));
        assert!(matches!(parse_input("/open a b"), Input::Invalid(_)));
        assert!(matches!(parse_input("/nope"), Input::Invalid(_)));
    }

    #[test]
    fn plain_lines_are_messages() {
        assert_eq!(
            parse_input("Is it still available?"),
            Input::Send("Is it still available?".into())
        );
    }

    #[test]
    fn view_without_selection_prompts_to_open() {
        let snapshot = MessagingSnapshot {
            unread_count: 3,
            ..MessagingSnapshot::default()
        };
        let text = render_view(&snapshot, UserId(1), &Utc::now());
        assert!(text.contains("=== Messages (3 unread) ==="));
        assert!(text.contains("No conversations yet."));
        assert!(text.contains("/open <userId> <listingId>"));
    }

    #[test]
    fn view_shows_active_thread_and_errors() {
        let sent_at = Timestamp(Utc::now());
        let active = Conversation {
            counterpart_id: UserId(7),
            counterpart_name: "Jane Doe".into(),
            subject_id: SubjectId(42),
            subject_title: "Road bike".into(),
            subject_image_url: None,
            last_message_preview: String::new(),
            last_message_at: sent_at,
            has_unread: false,
            unread_count: 0,
        };
        let snapshot = MessagingSnapshot {
            conversations: vec![active.clone()],
            active: Some(active),
            route: Some("/messages/7/42".into()),
            send_error: Some("Failed to send message: network error: reset".into()),
            ..MessagingSnapshot::default()
        };

        let text = render_view(&snapshot, UserId(1), &Utc::now());
        assert!(text.contains("> [JD] Jane Doe - Road bike"));
        assert!(text.contains("--- Jane Doe - Road bike (/messages/7/42) ---"));
        assert!(text.contains("No messages yet."));
        assert!(text.contains("! Failed to send message"));
    }
}
