//! Test doubles for the outbound client and the persistence port.
//!
//! Available under `cfg(test)` and with the `testing` feature, so downstream
//! crates can drive a [`Router`](crate::Router) without a platform or a
//! database.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use botty_core::{
    Answer, BotClient, ChatId, ClientError, ClientResult, DatabaseProvider, DatabaseResult,
    MessageDescriptor, MessageId, Session,
};
use parking_lot::Mutex;

// =============================================================================
// RecordingClient
// =============================================================================

/// One call observed by [`RecordingClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCall {
    Send {
        chat_id: ChatId,
        answer: Answer,
    },
    Edit {
        chat_id: ChatId,
        message_id: MessageId,
        answer: Answer,
    },
}

impl ClientCall {
    pub fn answer(&self) -> &Answer {
        match self {
            Self::Send { answer, .. } | Self::Edit { answer, .. } => answer,
        }
    }

    pub fn is_send(&self) -> bool {
        matches!(self, Self::Send { .. })
    }
}

/// A [`BotClient`] that records every call and hands out increasing message
/// ids starting at 1000.
pub struct RecordingClient {
    next_id: AtomicI64,
    calls: Mutex<Vec<ClientCall>>,
    failing_texts: Mutex<Vec<String>>,
    fail_edits: bool,
}

impl Default for RecordingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingClient {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1000),
            calls: Mutex::new(Vec::new()),
            failing_texts: Mutex::new(Vec::new()),
            fail_edits: false,
        }
    }

    /// Makes every `edit_message` call fail.
    pub fn failing_edits(mut self) -> Self {
        self.fail_edits = true;
        self
    }

    /// Makes sends of answers whose text equals `text` fail.
    pub fn fail_on_text(&self, text: impl Into<String>) {
        self.failing_texts.lock().push(text.into());
    }

    pub fn calls(&self) -> Vec<ClientCall> {
        self.calls.lock().clone()
    }

    pub fn send_count(&self) -> usize {
        self.calls.lock().iter().filter(|c| c.is_send()).count()
    }

    pub fn edit_count(&self) -> usize {
        self.calls.lock().iter().filter(|c| !c.is_send()).count()
    }

    /// Texts of all recorded answers, in call order.
    pub fn texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| c.answer().payload().and_then(|p| p.text()).map(str::to_string))
            .collect()
    }

    fn should_fail(&self, answer: &Answer) -> bool {
        let Some(text) = answer.payload().and_then(|p| p.text()) else {
            return false;
        };
        self.failing_texts.lock().iter().any(|t| t == text)
    }
}

#[async_trait]
impl BotClient for RecordingClient {
    async fn send(&self, chat_id: ChatId, answer: &Answer) -> ClientResult<Option<MessageDescriptor>> {
        self.calls.lock().push(ClientCall::Send {
            chat_id,
            answer: answer.clone(),
        });
        if self.should_fail(answer) {
            return Err(ClientError::rejected(chat_id, "rejected by test client"));
        }
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(Some(MessageDescriptor::new(chat_id, message_id)))
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        answer: &Answer,
    ) -> ClientResult<Option<MessageDescriptor>> {
        self.calls.lock().push(ClientCall::Edit {
            chat_id,
            message_id,
            answer: answer.clone(),
        });
        if self.fail_edits {
            return Err(ClientError::NotEditable {
                chat_id,
                message_id,
            });
        }
        Ok(Some(MessageDescriptor::new(chat_id, message_id)))
    }
}

// =============================================================================
// MemoryDatabase
// =============================================================================

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    commits: AtomicUsize,
    closes: AtomicUsize,
}

/// A [`DatabaseProvider`] that opens [`MemorySession`]s and counts what
/// happens to them.
#[derive(Default)]
pub struct MemoryDatabase {
    counters: Arc<Counters>,
    fail_commits: bool,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every commit fail.
    pub fn failing_commits(mut self) -> Self {
        self.fail_commits = true;
        self
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.counters.commits.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }
}

impl DatabaseProvider for MemoryDatabase {
    fn open_session(&self) -> DatabaseResult<Arc<dyn Session>> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemorySession {
            counters: Arc::clone(&self.counters),
            fail_commits: self.fail_commits,
            rows: Mutex::new(Vec::new()),
        }))
    }
}

/// Session opened by [`MemoryDatabase`]. Stores rows as strings.
pub struct MemorySession {
    counters: Arc<Counters>,
    fail_commits: bool,
    rows: Mutex<Vec<String>>,
}

impl MemorySession {
    pub fn insert(&self, row: impl Into<String>) {
        self.rows.lock().push(row.into());
    }

    pub fn rows(&self) -> Vec<String> {
        self.rows.lock().clone()
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn commit(&self) -> DatabaseResult<()> {
        if self.fail_commits {
            return Err(botty_core::DatabaseError::Commit("commit refused".into()));
        }
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
