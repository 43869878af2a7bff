//! The handler output channel.
//!
//! Handlers emit answers one at a time through [`Answers::send`]. The channel
//! holds at most one item and every send waits for an acknowledgement, so the
//! handler stays suspended until the response processor has delivered the
//! answer and updated the registry. Item N is fully realized before item N+1
//! is produced.

use botty_core::Answer;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

pub(crate) struct Emitted {
    pub(crate) answer: Answer,
    pub(crate) ack: oneshot::Sender<()>,
}

/// Sending half of the output channel, injected into handlers.
#[derive(Clone)]
pub struct Answers {
    tx: mpsc::Sender<Emitted>,
}

/// Receiving half of the output channel, consumed by the response processor.
pub struct AnswerStream {
    rx: mpsc::Receiver<Emitted>,
}

impl Answers {
    /// Creates a connected sender/stream pair.
    pub fn channel() -> (Answers, AnswerStream) {
        let (tx, rx) = mpsc::channel(1);
        (Answers { tx }, AnswerStream { rx })
    }

    /// Emits one answer and waits until it has been processed.
    ///
    /// If nobody is consuming the output any more the answer is dropped with a
    /// warning.
    pub async fn send(&self, answer: impl Into<Answer>) {
        let answer = answer.into();
        let (ack, done) = oneshot::channel();
        let answer_type = answer.type_name();
        if self.tx.send(Emitted { answer, ack }).await.is_err() {
            warn!(answer_type, "Answer emitted after output was closed; dropping it");
            return;
        }
        let _ = done.await;
    }

    /// Emits several answers in order.
    pub async fn send_all<I>(&self, answers: I)
    where
        I: IntoIterator,
        I::Item: Into<Answer>,
    {
        for answer in answers {
            self.send(answer).await;
        }
    }

    /// Returns `true` once the consuming side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl AnswerStream {
    pub(crate) async fn recv(&mut self) -> Option<Emitted> {
        self.rx.recv().await
    }

    /// Stops accepting new answers. Already queued ones can still be drained.
    pub(crate) fn close(&mut self) {
        self.rx.close();
    }

    pub(crate) fn try_recv(&mut self) -> Option<Emitted> {
        self.rx.try_recv().ok()
    }
}
