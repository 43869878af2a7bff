//! Application and per-event contexts.
//!
//! - [`AppContext`]: built once at startup. Owns the dependency container, the
//!   message registry, the outbound client and the optional database provider.
//!   Shared by every request through an `Arc`.
//! - [`Context`]: the side-channel for one inbound event. Carries the client
//!   the event arrived on, any command arguments the adapter pre-parsed, and a
//!   small typed state map handlers can use to talk to each other.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use botty_core::{BoxedBotClient, BoxedDatabaseProvider};
use parking_lot::Mutex;

use crate::di::DependencyContainer;
use crate::registry::{DEFAULT_MAX_PER_CHAT, MessageRegistry};

// =============================================================================
// Context
// =============================================================================

/// Per-event side-channel context handed to every handler.
pub struct Context {
    client: BoxedBotClient,
    args: Vec<String>,
    state: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl Context {
    pub fn new(client: BoxedBotClient) -> Self {
        Self {
            client,
            args: Vec::new(),
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Attaches pre-parsed command arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// The client the event arrived on.
    pub fn client(&self) -> &BoxedBotClient {
        &self.client
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Stores a value in the state map. One value per type; later calls
    /// overwrite.
    pub fn set_state<T: Send + Sync + 'static>(&self, value: T) {
        self.state.lock().insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get_state<T: Clone + 'static>(&self) -> Option<T> {
        self.state
            .lock()
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    pub fn has_state<T: 'static>(&self) -> bool {
        self.state.lock().contains_key(&TypeId::of::<T>())
    }

    /// Removes and returns a value from the state map.
    pub fn take_state<T: 'static>(&self) -> Option<T> {
        self.state
            .lock()
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("args", &self.args)
            .field("state_entries", &self.state.lock().len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// AppContext
// =============================================================================

/// Application-wide collaborators, threaded into every request scope.
pub struct AppContext {
    container: DependencyContainer,
    registry: Arc<MessageRegistry>,
    client: BoxedBotClient,
    database: Option<BoxedDatabaseProvider>,
}

impl AppContext {
    pub fn builder(client: BoxedBotClient) -> AppContextBuilder {
        AppContextBuilder {
            client,
            container: None,
            registry: None,
            max_per_chat: DEFAULT_MAX_PER_CHAT,
            database: None,
        }
    }

    pub fn container(&self) -> &DependencyContainer {
        &self.container
    }

    pub fn registry(&self) -> &Arc<MessageRegistry> {
        &self.registry
    }

    pub fn client(&self) -> &BoxedBotClient {
        &self.client
    }

    pub fn database(&self) -> Option<&BoxedDatabaseProvider> {
        self.database.as_ref()
    }

    /// A fresh per-event context on the application's client.
    pub fn context(&self) -> Context {
        Context::new(Arc::clone(&self.client))
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("container", &self.container)
            .field("registry", &self.registry)
            .field("database", &self.database.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`AppContext`].
pub struct AppContextBuilder {
    client: BoxedBotClient,
    container: Option<DependencyContainer>,
    registry: Option<Arc<MessageRegistry>>,
    max_per_chat: usize,
    database: Option<BoxedDatabaseProvider>,
}

impl AppContextBuilder {
    pub fn container(mut self, container: DependencyContainer) -> Self {
        self.container = Some(container);
        self
    }

    /// Uses an existing registry. Overrides [`max_per_chat`](Self::max_per_chat).
    pub fn registry(mut self, registry: Arc<MessageRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Bound of the per-chat FIFO of a registry created by this builder.
    pub fn max_per_chat(mut self, max_per_chat: usize) -> Self {
        self.max_per_chat = max_per_chat;
        self
    }

    pub fn database(mut self, provider: BoxedDatabaseProvider) -> Self {
        self.database = Some(provider);
        self
    }

    pub fn build(self) -> Arc<AppContext> {
        let max_per_chat = self.max_per_chat;
        Arc::new(AppContext {
            container: self.container.unwrap_or_default(),
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(MessageRegistry::new(max_per_chat))),
            client: self.client,
            database: self.database,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingClient;

    #[test]
    fn test_state_roundtrip() {
        let ctx = Context::new(Arc::new(RecordingClient::new()));
        assert!(!ctx.has_state::<u32>());
        ctx.set_state(7u32);
        assert_eq!(ctx.get_state::<u32>(), Some(7));
        assert_eq!(ctx.take_state::<u32>(), Some(7));
        assert!(!ctx.has_state::<u32>());
    }

    #[test]
    fn test_args() {
        let ctx = Context::new(Arc::new(RecordingClient::new())).with_args(["a", "b"]);
        assert_eq!(ctx.args(), ["a", "b"]);
    }

    #[test]
    fn test_builder_defaults() {
        let app = AppContext::builder(Arc::new(RecordingClient::new()))
            .max_per_chat(5)
            .build();
        assert_eq!(app.registry().max_per_chat(), 5);
        assert!(app.database().is_none());
        assert!(app.container().is_empty());
    }
}
