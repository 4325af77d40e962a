use chrono::{DateTime, Local, Utc};

use crate::history::{Message, Origin};

/// Format a message timestamp as local HH:MM
pub fn format_clock(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format("%H:%M").to_string()
}

pub fn origin_label(origin: Origin) -> &'static str {
    match origin {
        Origin::User => "you",
        Origin::Assistant => "assistant",
    }
}

/// Format a message as a single transcript line
pub fn format_message(message: &Message) -> String {
    format!(
        "[{}] {}: {}",
        format_clock(message.timestamp()),
        origin_label(message.origin()),
        message.text()
    )
}

pub fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(format_message)
        .collect::<Vec<_>>()
        .join("\n")
}
