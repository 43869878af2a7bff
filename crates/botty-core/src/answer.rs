//! Answers: what a handler wants delivered back to the chat.
//!
//! An [`Answer`] is either a fresh message ([`AnswerKind::Send`]), an edit of an
//! earlier one ([`AnswerKind::Edit`]) or nothing at all ([`AnswerKind::Empty`]).
//! The correlation fields (`key`, `metadata`, `handler_name`) are shared by all
//! three and are recorded in the message registry once delivery succeeds.
//!
//! # Example
//!
//! ```rust
//! use botty_core::Answer;
//!
//! let first = Answer::text("3").key("countdown");
//! let later = Answer::edit("2").key("countdown");
//! assert!(later.is_edit());
//! # let _ = first;
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::update::MessageId;

/// Text formatting mode understood by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ParseMode {
    #[default]
    Html,
    Markdown,
    MarkdownV2,
}

/// Delivery options shared by every payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(default)]
    pub disable_notification: bool,
    #[serde(default)]
    pub protect_content: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            parse_mode: Some(ParseMode::Html),
            disable_notification: false,
            protect_content: false,
        }
    }
}

/// A file reference: platform file id, URL or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputFile {
    Url(String),
    Bytes(Vec<u8>),
}

impl From<&str> for InputFile {
    fn from(value: &str) -> Self {
        Self::Url(value.to_string())
    }
}

impl From<String> for InputFile {
    fn from(value: String) -> Self {
        Self::Url(value)
    }
}

impl From<Vec<u8>> for InputFile {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// The content of an outgoing message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Text {
        text: String,
    },
    Photo {
        photo: InputFile,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Document {
        document: InputFile,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Location {
        latitude: f64,
        longitude: f64,
    },
    Poll {
        question: String,
        options: Vec<String>,
        #[serde(default)]
        is_anonymous: bool,
    },
    Dice {
        emoji: String,
    },
}

impl Payload {
    /// The textual part of the payload (text or caption).
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Photo { caption, .. } | Self::Document { caption, .. } => caption.as_deref(),
            Self::Poll { question, .. } => Some(question),
            Self::Location { .. } | Self::Dice { .. } => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Photo { .. } => "photo",
            Self::Document { .. } => "document",
            Self::Location { .. } => "location",
            Self::Poll { .. } => "poll",
            Self::Dice { .. } => "dice",
        }
    }
}

/// What kind of delivery an answer asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerKind {
    /// Send a new message.
    Send { payload: Payload },
    /// Edit an earlier message. Without `message_id`, the target is looked up
    /// in the message registry.
    Edit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<MessageId>,
        payload: Payload,
    },
    /// Deliver nothing.
    Empty,
}

/// A single item of handler output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub kind: AnswerKind,
    #[serde(default)]
    pub options: SendOptions,
    /// Correlation key. Stored with the delivered message; for edits, used to
    /// look up the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    /// Overrides the handler name the delivered message is recorded under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler_name: Option<String>,
}

impl Answer {
    fn with_kind(kind: AnswerKind) -> Self {
        Self {
            kind,
            options: SendOptions::default(),
            key: None,
            metadata: None,
            handler_name: None,
        }
    }

    /// A new message with the given payload.
    pub fn send(payload: Payload) -> Self {
        Self::with_kind(AnswerKind::Send { payload })
    }

    /// A new text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self::send(Payload::Text { text: text.into() })
    }

    /// A text edit of an earlier message.
    pub fn edit(text: impl Into<String>) -> Self {
        Self::edit_payload(Payload::Text { text: text.into() })
    }

    pub fn edit_payload(payload: Payload) -> Self {
        Self::with_kind(AnswerKind::Edit {
            message_id: None,
            payload,
        })
    }

    /// An answer that delivers nothing.
    pub fn empty() -> Self {
        Self::with_kind(AnswerKind::Empty)
    }

    pub fn photo(photo: impl Into<InputFile>, caption: Option<String>) -> Self {
        Self::send(Payload::Photo {
            photo: photo.into(),
            caption,
        })
    }

    pub fn document(document: impl Into<InputFile>, filename: Option<String>) -> Self {
        Self::send(Payload::Document {
            document: document.into(),
            filename,
            caption: None,
        })
    }

    pub fn location(latitude: f64, longitude: f64) -> Self {
        Self::send(Payload::Location {
            latitude,
            longitude,
        })
    }

    pub fn poll(question: impl Into<String>, options: Vec<String>) -> Self {
        Self::send(Payload::Poll {
            question: question.into(),
            options,
            is_anonymous: true,
        })
    }

    pub fn dice(emoji: impl Into<String>) -> Self {
        Self::send(Payload::Dice {
            emoji: emoji.into(),
        })
    }

    // ─── Builder methods ──────────────────────────────────────────────────────

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Adds one metadata entry.
    pub fn meta(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(name.into(), value.into());
        self
    }

    /// Records the delivered message under `handler` instead of the emitting handler.
    pub fn from_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler_name = Some(handler.into());
        self
    }

    /// Targets a specific message. Turns a `Send` into an `Edit`.
    pub fn message_id(mut self, id: MessageId) -> Self {
        self.kind = match self.kind {
            AnswerKind::Send { payload } | AnswerKind::Edit { payload, .. } => AnswerKind::Edit {
                message_id: Some(id),
                payload,
            },
            AnswerKind::Empty => AnswerKind::Empty,
        };
        self
    }

    pub fn parse_mode(mut self, mode: Option<ParseMode>) -> Self {
        self.options.parse_mode = mode;
        self
    }

    pub fn silent(mut self) -> Self {
        self.options.disable_notification = true;
        self
    }

    pub fn protected(mut self) -> Self {
        self.options.protect_content = true;
        self
    }

    // ─── Accessors ────────────────────────────────────────────────────────────

    pub fn is_edit(&self) -> bool {
        matches!(self.kind, AnswerKind::Edit { .. })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, AnswerKind::Empty)
    }

    /// The explicit edit target, if any.
    pub fn target_message_id(&self) -> Option<MessageId> {
        match self.kind {
            AnswerKind::Edit { message_id, .. } => message_id,
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match &self.kind {
            AnswerKind::Send { payload } | AnswerKind::Edit { payload, .. } => Some(payload),
            AnswerKind::Empty => None,
        }
    }

    /// Short name of the answer type, used in logs.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            AnswerKind::Send { payload } => payload.kind_name(),
            AnswerKind::Edit { .. } => "edit",
            AnswerKind::Empty => "empty",
        }
    }
}

impl From<&str> for Answer {
    fn from(text: &str) -> Self {
        Answer::text(text)
    }
}

impl From<String> for Answer {
    fn from(text: String) -> Self {
        Answer::text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_turns_send_into_edit() {
        let answer = Answer::text("hi").message_id(5);
        assert!(answer.is_edit());
        assert_eq!(answer.target_message_id(), Some(5));
        assert_eq!(answer.payload().and_then(Payload::text), Some("hi"));
    }

    #[test]
    fn test_empty_stays_empty() {
        let answer = Answer::empty().message_id(5).key("k");
        assert!(answer.is_empty());
        assert_eq!(answer.target_message_id(), None);
        assert_eq!(answer.type_name(), "empty");
    }

    #[test]
    fn test_meta_accumulates() {
        let answer = Answer::text("x").meta("a", 1).meta("b", "two");
        let metadata = answer.metadata.unwrap();
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata["b"], "two");
    }

    #[test]
    fn test_serialized_shape() {
        let answer = Answer::edit("2").key("cd");
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["kind"]["kind"], "edit");
        assert_eq!(json["kind"]["payload"]["type"], "text");
        assert_eq!(json["key"], "cd");
    }
}
