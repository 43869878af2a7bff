//! Per-invocation request scope.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use botty_core::{DatabaseError, DatabaseResult, Session, Update};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::chain::ResolverId;
use super::container::DependencyContainer;
use super::marker::ResolvedValue;
use crate::answers::{AnswerStream, Answers};
use crate::context::{AppContext, Context};

enum SessionSlot {
    Unopened,
    Open(Arc<dyn Session>),
    Closed,
}

/// State owned by exactly one handler invocation.
///
/// Holds the inbound update, the side-channel context, the per-request
/// resolution cache and a database session that is opened on first use.
/// The session is closed exactly once: by [`finish`](Self::finish) on the
/// normal path, or when the scope is dropped (cancellation, early return).
/// It is committed only when `finish` is called with `success = true`.
pub struct RequestScope {
    update: Arc<Update>,
    context: Arc<Context>,
    app: Arc<AppContext>,
    cache: Mutex<HashMap<ResolverId, ResolvedValue>>,
    session: Mutex<SessionSlot>,
    answers: Answers,
    stream: Mutex<Option<AnswerStream>>,
}

impl RequestScope {
    pub fn new(update: Arc<Update>, context: Arc<Context>, app: Arc<AppContext>) -> Self {
        let (answers, stream) = Answers::channel();
        Self {
            update,
            context,
            app,
            cache: Mutex::new(HashMap::new()),
            session: Mutex::new(SessionSlot::Unopened),
            answers,
            stream: Mutex::new(Some(stream)),
        }
    }

    pub fn update(&self) -> &Arc<Update> {
        &self.update
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn app(&self) -> &Arc<AppContext> {
        &self.app
    }

    pub fn container(&self) -> &DependencyContainer {
        self.app.container()
    }

    // ─── Resolution cache ─────────────────────────────────────────────────────

    pub(crate) fn cached(&self, id: ResolverId) -> Option<ResolvedValue> {
        self.cache.lock().get(&id).cloned()
    }

    pub(crate) fn store(&self, id: ResolverId, value: ResolvedValue) {
        self.cache.lock().insert(id, value);
    }

    /// Number of values cached in this scope.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }

    // ─── Output ───────────────────────────────────────────────────────────────

    /// A sender for this invocation's output.
    pub fn answers(&self) -> Answers {
        self.answers.clone()
    }

    /// Takes the receiving end of the output channel. Only the first call
    /// gets it.
    pub(crate) fn take_stream(&self) -> Option<AnswerStream> {
        self.stream.lock().take()
    }

    // ─── Session ──────────────────────────────────────────────────────────────

    /// The request's database session, opened on first use.
    pub fn session(&self) -> DatabaseResult<Arc<dyn Session>> {
        let mut slot = self.session.lock();
        if let SessionSlot::Open(session) = &*slot {
            return Ok(Arc::clone(session));
        }
        if matches!(*slot, SessionSlot::Closed) {
            return Err(DatabaseError::SessionClosed);
        }

        let provider = self.app.database().ok_or(DatabaseError::NotConfigured)?;
        let session = provider.open_session()?;
        debug!(update_id = self.update.update_id, "Opened database session");
        *slot = SessionSlot::Open(Arc::clone(&session));
        Ok(session)
    }

    pub fn has_open_session(&self) -> bool {
        matches!(*self.session.lock(), SessionSlot::Open(_))
    }

    /// Ends the scope: commits the session if `success`, then closes it.
    ///
    /// Safe to call more than once; only the first call touches the session.
    pub async fn finish(&self, success: bool) -> DatabaseResult<()> {
        let slot = std::mem::replace(&mut *self.session.lock(), SessionSlot::Closed);
        let SessionSlot::Open(session) = slot else {
            return Ok(());
        };

        let result = if success {
            session.commit().await
        } else {
            Ok(())
        };
        if let Err(e) = &result {
            warn!(update_id = self.update.update_id, error = %e, "Session commit failed");
        }
        session.close();
        debug!(update_id = self.update.update_id, committed = success && result.is_ok(), "Closed database session");
        result
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        if let SessionSlot::Open(session) =
            std::mem::replace(self.session.get_mut(), SessionSlot::Closed)
        {
            debug!(update_id = self.update.update_id, "Closing database session of an unfinished request");
            session.close();
        }
    }
}

impl fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope")
            .field("update_id", &self.update.update_id)
            .field("cached", &self.cached_len())
            .field("session_open", &self.has_open_session())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryDatabase, RecordingClient};
    use tokio_test::assert_ok;

    fn scope_with(database: Option<Arc<MemoryDatabase>>) -> RequestScope {
        let client = Arc::new(RecordingClient::new());
        let mut builder = AppContext::builder(client.clone());
        if let Some(db) = database {
            builder = builder.database(db);
        }
        let app = builder.build();
        RequestScope::new(
            Arc::new(Update::text_message(1, 10, 1, "hi")),
            Arc::new(Context::new(client)),
            app,
        )
    }

    #[tokio::test]
    async fn test_session_is_lazy_and_shared() {
        let db = Arc::new(MemoryDatabase::new());
        let scope = scope_with(Some(db.clone()));
        assert_eq!(db.opened(), 0);

        let a = assert_ok!(scope.session());
        let b = assert_ok!(scope.session());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(db.opened(), 1);
    }

    #[tokio::test]
    async fn test_finish_commits_on_success() {
        let db = Arc::new(MemoryDatabase::new());
        let scope = scope_with(Some(db.clone()));
        assert_ok!(scope.session());

        assert_ok!(scope.finish(true).await);
        assert_eq!(db.commits(), 1);
        assert_eq!(db.closes(), 1);

        // second finish and drop leave the session alone
        assert_ok!(scope.finish(true).await);
        drop(scope);
        assert_eq!(db.commits(), 1);
        assert_eq!(db.closes(), 1);
    }

    #[tokio::test]
    async fn test_finish_without_success_does_not_commit() {
        let db = Arc::new(MemoryDatabase::new());
        let scope = scope_with(Some(db.clone()));
        assert_ok!(scope.session());

        assert_ok!(scope.finish(false).await);
        assert_eq!(db.commits(), 0);
        assert_eq!(db.closes(), 1);
        assert!(matches!(scope.session(), Err(DatabaseError::SessionClosed)));
    }

    #[tokio::test]
    async fn test_drop_closes_open_session() {
        let db = Arc::new(MemoryDatabase::new());
        let scope = scope_with(Some(db.clone()));
        assert_ok!(scope.session());
        drop(scope);
        assert_eq!(db.commits(), 0);
        assert_eq!(db.closes(), 1);
    }

    #[tokio::test]
    async fn test_session_without_provider() {
        let scope = scope_with(None);
        assert!(matches!(scope.session(), Err(DatabaseError::NotConfigured)));
        assert_ok!(scope.finish(true).await);
    }
}
