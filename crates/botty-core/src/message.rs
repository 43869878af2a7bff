//! Descriptor of a delivered message.

use serde::{Deserialize, Serialize};

use crate::update::{ChatId, MessageId};

/// What the outbound transport reports back after a send or edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDescriptor {
    pub message_id: MessageId,
    pub chat_id: ChatId,
    /// Unix timestamp (seconds) reported by the platform, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl MessageDescriptor {
    pub fn new(chat_id: ChatId, message_id: MessageId) -> Self {
        Self {
            message_id,
            chat_id,
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}
