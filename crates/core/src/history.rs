use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    Assistant,
}

/// Fixed vocabulary of notices the session writes into the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    Greeting,
    InvalidReference,
    LoadingStarted,
    TranscriptLoaded,
    LoadFailed,
    NoAnswer,
    QueryFailed,
}

impl Notice {
    pub fn text(&self) -> &'static str {
        match self {
            Notice::Greeting => {
                "👋 Hi! I'm your YouTube assistant. Paste a YouTube URL to get started!"
            }
            Notice::InvalidReference => "❌ Invalid YouTube URL. Please paste a correct link.",
            Notice::LoadingStarted => "⏳ Loading video transcript... Please wait.",
            Notice::TranscriptLoaded => {
                "✅ Transcript loaded! You can now ask questions about this video."
            }
            Notice::LoadFailed => {
                "❌ Failed to load transcript. Make sure the video has subtitles."
            }
            Notice::NoAnswer => "⚠️ No response from server",
            Notice::QueryFailed => "❌ Failed to fetch response.",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Notice::InvalidReference | Notice::LoadFailed | Notice::QueryFailed
        )
    }
}

/// One turn of the conversation. Never changes once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    origin: Origin,
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notice: Option<Notice>,
    timestamp: DateTime<Utc>,
}

impl Message {
    fn new(origin: Origin, text: String, notice: Option<Notice>) -> Self {
        Self {
            origin,
            text,
            notice,
            timestamp: Utc::now(),
        }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Append-only conversation log, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> &Message {
        self.push(Message::new(Origin::User, text.into(), None))
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) -> &Message {
        self.push(Message::new(Origin::Assistant, text.into(), None))
    }

    /// Notices render as assistant turns.
    pub fn push_notice(&mut self, notice: Notice) -> &Message {
        self.push(Message::new(
            Origin::Assistant,
            notice.text().to_string(),
            Some(notice),
        ))
    }

    fn push(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
