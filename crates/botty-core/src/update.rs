//! The platform-neutral inbound event.
//!
//! An inbound adapter converts whatever the chat platform delivers into an
//! [`Update`]. Only the fields the dispatch core and typical handlers need are
//! modelled; everything else stays in the adapter.

use serde::{Deserialize, Serialize};

use crate::error::ChatIdNotFound;

/// Identifier of a chat.
pub type ChatId = i64;

/// Identifier of a message, unique within its chat.
pub type MessageId = i64;

/// Identifier of a user.
pub type UserId = i64;

/// The user that triggered an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveUser {
    pub id: UserId,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Kind of a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    #[default]
    Private,
    Group,
    Supergroup,
    Channel,
}

/// The chat an update belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveChat {
    pub id: ChatId,
    #[serde(default, rename = "type")]
    pub kind: ChatKind,
}

/// An incoming message. Media fields are not modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveMessage {
    pub message_id: MessageId,
    pub chat_id: ChatId,
    /// Unix timestamp (seconds).
    pub date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A press on an inline button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<ChatId>,
}

/// A message that was edited by its author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditedMessage {
    pub message_id: MessageId,
    pub chat_id: ChatId,
    pub date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A parsed bot command such as `/start payload`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command<'a> {
    /// Command name without the leading slash or `@botname` suffix.
    pub name: &'a str,
    /// Everything after the command, trimmed.
    pub args: &'a str,
}

impl<'a> Command<'a> {
    /// Parses `text` as a command. Returns `None` when it does not start with `/`.
    pub fn parse(text: &'a str) -> Option<Self> {
        let rest = text.trim_start().strip_prefix('/')?;
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };
        let name = head.split_once('@').map_or(head, |(name, _)| name);
        if name.is_empty() {
            return None;
        }
        Some(Self { name, args })
    }

    /// Whitespace-separated arguments.
    pub fn arg_list(&self) -> Vec<&'a str> {
        self.args.split_whitespace().collect()
    }
}

/// A platform-neutral update delivered to handlers.
///
/// Use [`chat_id`](Self::chat_id) to find the chat an update belongs to rather
/// than reading individual fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Update {
    pub update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<EffectiveUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<EffectiveChat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<EffectiveMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<CallbackQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_message: Option<EditedMessage>,
}

impl Update {
    /// Creates an empty update with the given id.
    pub fn new(update_id: i64) -> Self {
        Self {
            update_id,
            ..Default::default()
        }
    }

    /// Convenience constructor for a text message sent in a private chat.
    pub fn text_message(update_id: i64, chat_id: ChatId, message_id: MessageId, text: &str) -> Self {
        Self {
            update_id,
            chat: Some(EffectiveChat {
                id: chat_id,
                kind: ChatKind::Private,
            }),
            message: Some(EffectiveMessage {
                message_id,
                chat_id,
                date: 0,
                text: Some(text.to_string()),
            }),
            ..Default::default()
        }
    }

    /// Convenience constructor for a callback query.
    pub fn callback(update_id: i64, chat_id: ChatId, data: &str) -> Self {
        Self {
            update_id,
            callback_query: Some(CallbackQuery {
                id: update_id.to_string(),
                data: Some(data.to_string()),
                user_id: chat_id,
                message_id: None,
                chat_id: Some(chat_id),
            }),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user: EffectiveUser) -> Self {
        self.user = Some(user);
        self
    }

    /// Resolves the chat this update belongs to.
    ///
    /// Tries the message, then the callback query, then the edited message,
    /// then the bare chat.
    pub fn chat_id(&self) -> Result<ChatId, ChatIdNotFound> {
        if let Some(message) = &self.message {
            return Ok(message.chat_id);
        }
        if let Some(chat_id) = self.callback_query.as_ref().and_then(|q| q.chat_id) {
            return Ok(chat_id);
        }
        if let Some(edited) = &self.edited_message {
            return Ok(edited.chat_id);
        }
        self.chat
            .as_ref()
            .map(|chat| chat.id)
            .ok_or(ChatIdNotFound {
                update_id: self.update_id,
            })
    }

    pub fn effective_user_id(&self) -> Option<UserId> {
        self.user
            .as_ref()
            .map(|u| u.id)
            .or_else(|| self.callback_query.as_ref().map(|q| q.user_id))
    }

    /// Text of the message, if this update carries one.
    pub fn text(&self) -> Option<&str> {
        self.message.as_ref()?.text.as_deref()
    }

    /// Parses the message text as a bot command.
    pub fn command(&self) -> Option<Command<'_>> {
        Command::parse(self.text()?)
    }

    /// Callback data, if this update is a callback query.
    pub fn callback_data(&self) -> Option<&str> {
        self.callback_query.as_ref()?.data.as_deref()
    }
}
