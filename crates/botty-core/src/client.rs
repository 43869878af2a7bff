//! Outbound transport port.
//!
//! Concrete platform clients implement [`BotClient`]. The core never talks to a
//! platform library directly; it only calls [`BotClient::send`] and
//! [`BotClient::edit`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::answer::Answer;
use crate::error::ClientResult;
use crate::message::MessageDescriptor;
use crate::update::{ChatId, MessageId};

/// Port for delivering answers to a chat.
///
/// Implementors provide [`send`](Self::send) and [`edit_message`](Self::edit_message).
/// The provided [`edit`](Self::edit) adds the fallback contract every client
/// shares: without a target, or when the edit fails, the answer is sent as a
/// new message instead.
///
/// # Example
///
/// ```rust,ignore
/// struct ConsoleClient;
///
/// #[async_trait]
/// impl BotClient for ConsoleClient {
///     async fn send(&self, chat_id: ChatId, answer: &Answer) -> ClientResult<Option<MessageDescriptor>> {
///         println!("[{chat_id}] {:?}", answer.payload());
///         Ok(Some(MessageDescriptor::new(chat_id, 1)))
///     }
///
///     async fn edit_message(&self, chat_id: ChatId, message_id: MessageId, answer: &Answer)
///         -> ClientResult<Option<MessageDescriptor>> {
///         Ok(Some(MessageDescriptor::new(chat_id, message_id)))
///     }
/// }
/// ```
#[async_trait]
pub trait BotClient: Send + Sync + 'static {
    /// Sends `answer` as a new message.
    ///
    /// Returns `Ok(None)` when nothing was delivered.
    async fn send(&self, chat_id: ChatId, answer: &Answer) -> ClientResult<Option<MessageDescriptor>>;

    /// Edits message `message_id` in place.
    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        answer: &Answer,
    ) -> ClientResult<Option<MessageDescriptor>>;

    /// Edits `message_id`, or sends a new message when there is no target or
    /// the edit fails.
    async fn edit(
        &self,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        answer: &Answer,
    ) -> ClientResult<Option<MessageDescriptor>> {
        let Some(message_id) = message_id else {
            debug!(chat_id, "No edit target, sending a new message");
            return self.send(chat_id, answer).await;
        };

        match self.edit_message(chat_id, message_id, answer).await {
            Ok(descriptor) => Ok(descriptor),
            Err(e) => {
                warn!(chat_id, message_id, error = %e, "Edit failed, sending a new message");
                self.send(chat_id, answer).await
            }
        }
    }
}

/// Shared handle to a bot client.
pub type BoxedBotClient = Arc<dyn BotClient>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use parking_lot::Mutex;
    use tokio_test::assert_ok;

    #[derive(Default)]
    struct FlakyClient {
        calls: Mutex<Vec<String>>,
        fail_edits: bool,
    }

    #[async_trait]
    impl BotClient for FlakyClient {
        async fn send(&self, chat_id: ChatId, _answer: &Answer) -> ClientResult<Option<MessageDescriptor>> {
            self.calls.lock().push("send".into());
            Ok(Some(MessageDescriptor::new(chat_id, 500)))
        }

        async fn edit_message(
            &self,
            chat_id: ChatId,
            message_id: MessageId,
            _answer: &Answer,
        ) -> ClientResult<Option<MessageDescriptor>> {
            self.calls.lock().push("edit".into());
            if self.fail_edits {
                Err(ClientError::NotEditable {
                    chat_id,
                    message_id,
                })
            } else {
                Ok(Some(MessageDescriptor::new(chat_id, message_id)))
            }
        }
    }

    #[tokio::test]
    async fn test_edit_without_target_sends() {
        let client = FlakyClient::default();
        let descriptor = assert_ok!(client.edit(1, None, &Answer::edit("x")).await);
        assert_eq!(descriptor.unwrap().message_id, 500);
        assert_eq!(*client.calls.lock(), vec!["send".to_string()]);
    }

    #[tokio::test]
    async fn test_edit_success() {
        let client = FlakyClient::default();
        let descriptor = assert_ok!(client.edit(1, Some(7), &Answer::edit("x")).await);
        assert_eq!(descriptor.unwrap().message_id, 7);
        assert_eq!(*client.calls.lock(), vec!["edit".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_edit_falls_back_to_send() {
        let client = FlakyClient {
            fail_edits: true,
            ..Default::default()
        };
        let descriptor = assert_ok!(client.edit(1, Some(7), &Answer::edit("x")).await);
        assert_eq!(descriptor.unwrap().message_id, 500);
        assert_eq!(
            *client.calls.lock(),
            vec!["edit".to_string(), "send".to_string()]
        );
    }
}
