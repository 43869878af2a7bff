//! # Botty Framework
//!
//! Request dispatch for bot handlers:
//!
//! - [`di`]: dependency markers, the container, the per-request scope and
//!   parameter resolution
//! - [`MessageRegistry`]: what was sent where, used to pick edit targets
//! - [`ResponseProcessor`]: realizes handler output through the [`BotClient`]
//! - [`Router`]: builds a scope per update and runs the first matching route
//!
//! Routes are tower services. The `on_xxx()` builders pre-stack a filter;
//! `.handler(f)` attaches any async function whose extra parameters implement
//! [`FromScope`]:
//!
//! ```rust,ignore
//! async fn start(update: Arc<Update>, _ctx: Arc<Context>, out: Answers) {
//!     out.send(Answer::text("Hi!").key("welcome")).await;
//! }
//!
//! let app = AppContext::builder(client).container(container).build();
//! let router = Router::new(app).route(on_command("start").handler(start));
//! router.handle(update).await?;
//! ```
//!
//! [`BotClient`]: botty_core::BotClient

pub mod answers;
pub mod context;
pub mod di;
pub mod error;
pub mod handler;
pub mod matcher_builders;
pub mod processor;
pub mod registry;
pub mod router;
pub mod service;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use answers::Answers;
pub use context::{AppContext, AppContextBuilder, Context};
pub use di::{
    ContainerBuilder, DependencyChain, DependencyContainer, Depends, FromScope, Inject, Repo,
    Repository, RequestScope, ServiceRef,
};
pub use error::{EventSkipped, InvocationError, ResolveError, ResolveResult, ResponseError};
pub use handler::{Handler, HandlerOutcome, HandlerOutput, invoke};
pub use matcher_builders::{
    FilteredBuilder, on_any, on_callback, on_command, on_edited_message, on_message,
};
pub use processor::ResponseProcessor;
pub use registry::{DEFAULT_MAX_PER_CHAT, MessageRecord, MessageRegistry};
pub use router::Router;
pub use service::{BoxedRoute, EventPredicate, HandlerService, ServiceBuilderExt};

pub use tower::Layer;
