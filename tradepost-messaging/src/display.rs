//! Pure rendering derivations over a thread.
//!
//! Nothing here is cached: day separators and sender headers depend on
//! adjacent pairs and are recomputed from the current messages on every
//! render.

use chrono::{DateTime, Days, TimeZone};
use shared::models::{Message, Timestamp, UserId};

/// Whether `messages[index]` starts a new calendar day in `tz`.
///
/// The first message always does; an out-of-range index never does.
#[must_use]
pub fn is_new_day<Tz: TimeZone>(messages: &[Message], index: usize, tz: &Tz) -> bool {
    if index == 0 {
        return true;
    }
    match (messages.get(index - 1), messages.get(index)) {
        (Some(previous), Some(current)) => {
            previous.sent_at.date_in(tz) != current.sent_at.date_in(tz)
        }
        _ => false,
    }
}

/// Whether a sender header goes above `messages[index]`: on the first
/// message, when the sender changes, or when the day changes.
#[must_use]
pub fn should_show_header<Tz: TimeZone>(messages: &[Message], index: usize, tz: &Tz) -> bool {
    if index == 0 {
        return true;
    }
    match (messages.get(index - 1), messages.get(index)) {
        (Some(previous), Some(current)) => {
            previous.sender_id != current.sender_id || is_new_day(messages, index, tz)
        }
        _ => true,
    }
}

/// "Today", "Yesterday", or a date such as "Mar 8, 2025", relative to `now`
/// and in `now`'s zone.
#[must_use]
pub fn day_label<Tz: TimeZone>(sent_at: Timestamp, now: &DateTime<Tz>) -> String {
    let today = now.date_naive();
    let day = sent_at.date_in(&now.timezone());
    if day == today {
        "Today".to_string()
    } else if today.checked_sub_days(Days::new(1)) == Some(day) {
        "Yesterday".to_string()
    } else {
        day.format("%b %-d, %Y").to_string()
    }
}

/// Clock time such as "2:05 PM" in `tz`.
#[must_use]
pub fn short_time<Tz>(sent_at: Timestamp, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    sent_at.0.with_timezone(tz).format("%-I:%M %p").to_string()
}

fn first_char_upper(word: &str) -> String {
    word.chars().next().map(char::to_uppercase).into_iter().flatten().collect()
}

/// Initials for a conversation row: first letters of the first two words,
/// or the first two characters of a single word. "U" when blank.
#[must_use]
pub fn conversation_initials(name: &str) -> String {
    let mut words = name.split_whitespace();
    match (words.next(), words.next()) {
        (Some(first), Some(second)) => first_char_upper(first) + &first_char_upper(second),
        (Some(only), None) => only.chars().take(2).collect::<String>().to_uppercase(),
        _ => "U".to_string(),
    }
}

/// Avatar text for a message bubble: "Me" for the signed-in user, otherwise
/// the counterpart's initials (one letter for a single-word name).
#[must_use]
pub fn avatar_initials(sender: UserId, me: UserId, counterpart_name: Option<&str>) -> String {
    if sender == me {
        return "Me".to_string();
    }
    let Some(name) = counterpart_name else {
        return "U".to_string();
    };
    let mut words = name.split_whitespace();
    match (words.next(), words.next()) {
        (Some(first), Some(second)) => first_char_upper(first) + &first_char_upper(second),
        (Some(only), None) => first_char_upper(only),
        _ => "U".to_string(),
    }
}

/// "You" for the signed-in user, otherwise the counterpart name or "User".
#[must_use]
pub fn sender_label(sender: UserId, me: UserId, counterpart_name: Option<&str>) -> String {
    if sender == me {
        return "You".to_string();
    }
    counterpart_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("User")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_implementations::{ME, at, message};
    use chrono::{FixedOffset, Utc};
    use test_case::test_case;

    fn thread() -> Vec<Message> {
        let other = UserId(2);
        let mut messages = vec![
            message(1, other, 10, "is it available?"),
            message(2, other, 10, "I can pick up today"),
            message(3, ME, 10, "yes"),
            message(4, ME, 10, "see you tomorrow"),
        ];
        messages[0].sent_at = at(2025, 3, 8, 9, 0);
        messages[1].sent_at = at(2025, 3, 8, 9, 1);
        messages[2].sent_at = at(2025, 3, 8, 9, 5);
        messages[3].sent_at = at(2025, 3, 9, 8, 0);
        messages
    }

    #[test_case(0, true ; "first message")]
    #[test_case(1, false ; "same day")]
    #[test_case(3, true ; "next day")]
    #[test_case(9, false ; "out of range")]
    fn new_day_boundaries(index: usize, expected: bool) {
        assert_eq!(is_new_day(&thread(), index, &Utc), expected);
    }

    #[test_case(0, true ; "first message")]
    #[test_case(1, false ; "same sender same day")]
    #[test_case(2, true ; "sender changes")]
    #[test_case(3, true ; "same sender next day")]
    #[test_case(9, true ; "out of range")]
    fn header_boundaries(index: usize, expected: bool) {
        assert_eq!(should_show_header(&thread(), index, &Utc), expected);
    }

    #[test]
    fn day_boundaries_follow_the_display_zone() {
        let mut messages = vec![
            message(1, ME, 10, "late"),
            message(2, ME, 10, "later"),
        ];
        messages[0].sent_at = at(2025, 3, 8, 23, 30);
        messages[1].sent_at = at(2025, 3, 9, 0, 30);
        assert!(is_new_day(&messages, 1, &Utc));

        let hawaii = FixedOffset::west_opt(10 * 3600).unwrap();
        assert!(!is_new_day(&messages, 1, &hawaii));
    }

    #[test_case(at(2025, 3, 9, 7, 0), "Today" ; "today")]
    #[test_case(at(2025, 3, 8, 23, 59), "Yesterday" ; "yesterday")]
    #[test_case(at(2025, 3, 1, 12, 0), "Mar 1, 2025" ; "older")]
    fn day_labels(sent_at: Timestamp, expected: &str) {
        let now = at(2025, 3, 9, 18, 0).0;
        assert_eq!(day_label(sent_at, &now), expected);
    }

    #[test]
    fn short_time_uses_twelve_hour_clock() {
        assert_eq!(short_time(at(2025, 3, 8, 14, 5), &Utc), "2:05 PM");
        assert_eq!(short_time(at(2025, 3, 8, 0, 30), &Utc), "12:30 AM");
    }

    #[test_case("Jane Doe", "JD" ; "two words")]
    #[test_case("  ada   lovelace  king", "AL" ; "extra whitespace")]
    #[test_case("bob", "BO" ; "single word")]
    #[test_case("", "U" ; "blank")]
    fn conversation_initials_cases(name: &str, expected: &str) {
        assert_eq!(conversation_initials(name), expected);
    }

    #[test_case(ME, Some("Jane Doe"), "Me" ; "own message")]
    #[test_case(UserId(2), Some("Jane Doe"), "JD" ; "two words")]
    #[test_case(UserId(2), Some("bob"), "B" ; "single word")]
    #[test_case(UserId(2), None, "U" ; "no counterpart")]
    fn avatar_initials_cases(sender: UserId, name: Option<&str>, expected: &str) {
        assert_eq!(avatar_initials(sender, ME, name), expected);
    }

    #[test_case(ME, Some("Jane"), "You" ; "own message")]
    #[test_case(UserId(2), Some("Jane"), "Jane" ; "counterpart")]
    #[test_case(UserId(2), Some("  "), "User" ; "blank name")]
    #[test_case(UserId(2), None, "User" ; "no counterpart")]
    fn sender_labels(sender: UserId, name: Option<&str>, expected: &str) {
        assert_eq!(sender_label(sender, ME, name), expected);
    }
}
