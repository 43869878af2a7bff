//! Error types shared across Botty crates.

use thiserror::Error;

use crate::update::{ChatId, MessageId};

/// Boxed error used at trait-object seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The update carries no field from which a chat id can be taken.
#[derive(Debug, Clone, Error)]
#[error("could not determine chat id for update {update_id}")]
pub struct ChatIdNotFound {
    pub update_id: i64,
}

/// Errors reported by an outbound transport client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The platform rejected the request.
    #[error("platform rejected request to chat {chat_id}: {reason}")]
    Rejected { chat_id: ChatId, reason: String },

    /// The message to edit does not exist or can no longer be edited.
    #[error("message {message_id} in chat {chat_id} cannot be edited")]
    NotEditable {
        chat_id: ChatId,
        message_id: MessageId,
    },

    /// The answer cannot be expressed by this transport.
    #[error("unsupported answer type: {0}")]
    Unsupported(&'static str),

    /// The transport is not connected.
    #[error("transport is not connected")]
    NotConnected,

    /// Any other transport failure.
    #[error(transparent)]
    Other(#[from] BoxError),
}

impl ClientError {
    pub fn rejected(chat_id: ChatId, reason: impl Into<String>) -> Self {
        Self::Rejected {
            chat_id,
            reason: reason.into(),
        }
    }
}

/// Result type for outbound transport calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors reported by the persistence port.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A session was requested but no database provider is configured.
    #[error("database is not configured")]
    NotConfigured,

    /// The session was already closed.
    #[error("database session is already closed")]
    SessionClosed,

    /// Opening a session failed.
    #[error("failed to open database session: {0}")]
    Open(String),

    /// Committing the session failed.
    #[error("failed to commit database session: {0}")]
    Commit(String),

    #[error(transparent)]
    Other(#[from] BoxError),
}

/// Result type for persistence operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;
