//! Response processor.
//!
//! Turns a handler's output into transport calls. Items are realized strictly
//! in emission order: the handler stays suspended on [`Answers::send`] until
//! the processor has called the client and updated the registry, so item N is
//! fully done before item N+1 exists.
//!
//! A failing item is logged and skipped; it never aborts the invocation.
//!
//! [`Answers::send`]: crate::Answers::send

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;

use botty_core::{Answer, BoxError, BoxedBotClient, ChatId};
use tracing::{debug, error, warn};

use crate::answers::AnswerStream;
use crate::error::ResponseError;
use crate::registry::{MessageRecord, MessageRegistry};

/// Sends and edits answers and records what was delivered.
#[derive(Clone)]
pub struct ResponseProcessor {
    registry: Arc<MessageRegistry>,
    client: BoxedBotClient,
}

impl ResponseProcessor {
    pub fn new(registry: Arc<MessageRegistry>, client: BoxedBotClient) -> Self {
        Self { registry, client }
    }

    pub fn registry(&self) -> &Arc<MessageRegistry> {
        &self.registry
    }

    /// Realizes one answer in `chat_id` on behalf of `handler`.
    ///
    /// Returns the registry record of the delivered message, or `None` when
    /// nothing was delivered (`Empty`, or the client reported no message).
    pub async fn process(
        &self,
        answer: &Answer,
        chat_id: ChatId,
        handler: &str,
    ) -> Result<Option<Arc<MessageRecord>>, ResponseError> {
        if answer.is_empty() {
            debug!(handler, chat_id, "Empty answer, nothing to deliver");
            return Ok(None);
        }

        let answer_type = answer.type_name();
        let result = if answer.is_edit() {
            let target = self.registry.find_edit_target(answer, chat_id, handler);
            debug!(handler, chat_id, target = ?target, "Editing message");
            self.client.edit(chat_id, target, answer).await
        } else {
            debug!(handler, chat_id, answer_type, "Sending message");
            self.client.send(chat_id, answer).await
        };

        let descriptor = result.map_err(|source| ResponseError {
            handler: handler.to_string(),
            answer_type,
            source,
        })?;

        let Some(descriptor) = descriptor else {
            warn!(handler, chat_id, answer_type, "Client delivered no message for a non-empty answer");
            return Ok(None);
        };

        let origin = answer.handler_name.as_deref().unwrap_or(handler);
        Ok(Some(self.registry.register(
            &descriptor,
            Some(origin),
            answer.key.as_deref(),
            answer.metadata.clone(),
        )))
    }

    /// Processes one answer, logging instead of returning a failure.
    async fn process_logged(&self, answer: &Answer, chat_id: ChatId, handler: &str) -> bool {
        match self.process(answer, chat_id, handler).await {
            Ok(_) => true,
            Err(e) => {
                error!(
                    handler = %e.handler,
                    answer_type = e.answer_type,
                    chat_id,
                    error = %e.source,
                    "Failed to deliver answer"
                );
                false
            }
        }
    }

    /// Runs a handler body to completion while realizing everything it emits
    /// on `stream`.
    ///
    /// Answers the body returns (rather than emits) are realized after it
    /// finishes, in order. If the body fails, items already realized stay
    /// delivered and the error is returned.
    pub async fn drive<F>(
        &self,
        body: F,
        mut stream: AnswerStream,
        chat_id: ChatId,
        handler: &str,
    ) -> Result<(), BoxError>
    where
        F: Future<Output = Result<Vec<Answer>, BoxError>>,
    {
        let mut body = pin!(body);
        let mut delivered = 0usize;
        let mut failed = 0usize;
        let mut tally = |ok: bool| {
            if ok {
                delivered += 1;
            } else {
                failed += 1;
            }
        };

        let outcome = loop {
            tokio::select! {
                biased;
                Some(emitted) = stream.recv() => {
                    tally(self.process_logged(&emitted.answer, chat_id, handler).await);
                    let _ = emitted.ack.send(());
                }
                outcome = &mut body => break outcome,
            }
        };

        // Late emissions (e.g. from tasks the handler spawned) are realized
        // before the stream goes away; later ones are dropped by the sender.
        stream.close();
        while let Some(emitted) = stream.try_recv() {
            tally(self.process_logged(&emitted.answer, chat_id, handler).await);
            let _ = emitted.ack.send(());
        }

        let returned = outcome?;
        for answer in &returned {
            tally(self.process_logged(answer, chat_id, handler).await);
        }

        debug!(handler, chat_id, delivered, failed, "Handler output processed");
        Ok(())
    }
}

impl std::fmt::Debug for ResponseProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseProcessor")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::Answers;
    use crate::testing::{ClientCall, RecordingClient};
    use botty_core::MessageDescriptor;
    use tokio_test::{assert_err, assert_ok};

    fn processor() -> (ResponseProcessor, Arc<RecordingClient>) {
        let client = Arc::new(RecordingClient::new());
        let processor = ResponseProcessor::new(Arc::new(MessageRegistry::default()), client.clone());
        (processor, client)
    }

    #[tokio::test]
    async fn test_send_registers_under_current_handler() {
        let (processor, client) = processor();
        let record = assert_ok!(processor.process(&Answer::text("hi").key("k"), 1, "start").await);
        let record = record.unwrap();

        assert_eq!(record.message_id, 1000);
        assert_eq!(record.handler_name.as_deref(), Some("start"));
        assert_eq!(client.send_count(), 1);
        assert_eq!(processor.registry().get_by_key(1, "k").unwrap().message_id, 1000);
    }

    #[tokio::test]
    async fn test_handler_override_is_recorded() {
        let (processor, _client) = processor();
        let record = assert_ok!(
            processor
                .process(&Answer::text("hi").from_handler("menu"), 1, "start")
                .await
        );
        assert_eq!(record.unwrap().handler_name.as_deref(), Some("menu"));
    }

    #[tokio::test]
    async fn test_empty_answer_does_nothing() {
        let (processor, client) = processor();
        let record = assert_ok!(processor.process(&Answer::empty(), 1, "h").await);
        assert!(record.is_none());
        assert!(client.calls().is_empty());
        assert!(processor.registry().is_empty());
    }

    #[tokio::test]
    async fn test_edit_uses_registry_target() {
        let (processor, client) = processor();
        processor
            .registry()
            .register(&MessageDescriptor::new(1, 42), Some("h"), None, None);

        assert_ok!(processor.process(&Answer::edit("new"), 1, "h").await);
        assert_eq!(
            client.calls(),
            vec![ClientCall::Edit {
                chat_id: 1,
                message_id: 42,
                answer: Answer::edit("new"),
            }]
        );
    }

    #[tokio::test]
    async fn test_edit_without_target_sends() {
        let (processor, client) = processor();
        assert_ok!(processor.process(&Answer::edit("new"), 1, "h").await);
        assert_eq!(client.send_count(), 1);
        assert_eq!(client.edit_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_carries_handler_and_answer_type() {
        let (processor, client) = processor();
        client.fail_on_text("boom");
        let err = assert_err!(processor.process(&Answer::text("boom"), 1, "h").await);
        assert_eq!(err.handler, "h");
        assert_eq!(err.answer_type, "text");
        assert!(processor.registry().is_empty());
    }

    #[tokio::test]
    async fn test_drive_realizes_items_in_order() {
        let (processor, client) = processor();
        let (answers, stream) = Answers::channel();
        let registry = processor.registry().clone();

        let body = async move {
            answers.send("one").await;
            // the first item is registered before the second is emitted
            assert_eq!(registry.len(), 1);
            answers.send("two").await;
            Ok::<_, BoxError>(vec![Answer::text("three")])
        };

        assert_ok!(processor.drive(body, stream, 1, "h").await);
        assert_eq!(client.texts(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_drive_continues_after_failed_item() {
        let (processor, client) = processor();
        client.fail_on_text("one");
        let (answers, stream) = Answers::channel();

        let body = async move {
            answers.send("one").await;
            answers.send("two").await;
            Ok::<_, BoxError>(Vec::new())
        };

        assert_ok!(processor.drive(body, stream, 1, "h").await);
        assert_eq!(client.texts(), vec!["one", "two"]);
        assert_eq!(processor.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_drive_returns_handler_error_after_realized_items() {
        let (processor, client) = processor();
        let (answers, stream) = Answers::channel();

        let body = async move {
            answers.send("partial").await;
            Err::<Vec<Answer>, BoxError>("handler broke".into())
        };

        let err = assert_err!(processor.drive(body, stream, 1, "h").await);
        assert_eq!(err.to_string(), "handler broke");
        assert_eq!(client.texts(), vec!["partial"]);
    }
}
