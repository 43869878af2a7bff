//! Persistence port.
//!
//! The dispatch core never touches a database directly. It asks a
//! [`DatabaseProvider`] for a [`Session`] the first time something in a request
//! needs one, commits it when the handler succeeds and closes it exactly once.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DatabaseResult;

/// A unit of work against the database.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Makes pending changes durable.
    async fn commit(&self) -> DatabaseResult<()>;

    /// Releases the session. Synchronous so it can run while a request is
    /// being torn down.
    fn close(&self);

    /// Access to the concrete session type, for repositories that need it.
    fn as_any(&self) -> &dyn Any;
}

/// Opens sessions on demand.
pub trait DatabaseProvider: Send + Sync + 'static {
    fn open_session(&self) -> DatabaseResult<Arc<dyn Session>>;
}

/// Shared handle to a database provider.
pub type BoxedDatabaseProvider = Arc<dyn DatabaseProvider>;
