//! Route builders for common update kinds.
//!
//! Each function returns a [`ServiceBuilder`] with a filter pre-stacked;
//! finish it with `.handler(f)`:
//!
//! ```rust,ignore
//! let router = Router::new(app)
//!     .route(on_command("start").handler(start))
//!     .route(on_callback("menu:").handler(menu))
//!     .route(on_message().rule(|u| u.text().is_some_and(|t| t.len() > 3)).handler(echo));
//! ```

use tower::ServiceBuilder;
use tower::filter::FilterLayer;
use tower_layer::{Identity, Stack};

use crate::service::{EventPredicate, ServiceBuilderExt};

/// A service builder with one update filter stacked.
pub type FilteredBuilder = ServiceBuilder<Stack<FilterLayer<EventPredicate>, Identity>>;

/// Matches `/name` commands (a trailing `@botname` is ignored).
pub fn on_command(name: impl Into<String>) -> FilteredBuilder {
    let name = name.into();
    ServiceBuilder::new().rule(move |update| update.command().is_some_and(|c| c.name == name))
}

/// Matches callback queries whose data starts with `prefix`.
pub fn on_callback(prefix: impl Into<String>) -> FilteredBuilder {
    let prefix = prefix.into();
    ServiceBuilder::new().rule(move |update| {
        update
            .callback_data()
            .is_some_and(|data| data.starts_with(prefix.as_str()))
    })
}

/// Matches new messages.
pub fn on_message() -> FilteredBuilder {
    ServiceBuilder::new().rule(|update| update.message.is_some())
}

pub fn on_edited_message() -> FilteredBuilder {
    ServiceBuilder::new().rule(|update| update.edited_message.is_some())
}

/// Matches every update.
pub fn on_any() -> FilteredBuilder {
    ServiceBuilder::new().rule(|_| true)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use botty_core::Update;
    use tokio_test::{assert_err, assert_ok};
    use tower::{BoxError, Service, ServiceExt};

    use super::*;
    use crate::context::{AppContext, Context};
    use crate::di::RequestScope;
    use crate::error::EventSkipped;
    use crate::testing::RecordingClient;

    async fn ok_handler(_: Arc<Update>, _: Arc<Context>) {}

    fn scope(update: Update) -> Arc<RequestScope> {
        let client = Arc::new(RecordingClient::new());
        let app = AppContext::builder(client).build();
        Arc::new(RequestScope::new(Arc::new(update), Arc::new(app.context()), app))
    }

    async fn run<S>(mut svc: S, update: Update) -> Result<(), BoxError>
    where
        S: Service<Arc<RequestScope>, Response = (), Error = BoxError>,
    {
        svc.ready().await?.call(scope(update)).await
    }

    fn skipped(result: Result<(), BoxError>) -> bool {
        result.is_err_and(|e| e.is::<EventSkipped>())
    }

    #[tokio::test]
    async fn test_on_command() {
        let route = on_command("start").handler(ok_handler);
        assert_ok!(run(route.clone(), Update::text_message(1, 1, 1, "/start@my_bot now")).await);
        assert!(skipped(run(route.clone(), Update::text_message(1, 1, 1, "/stop")).await));
        assert!(skipped(run(route, Update::text_message(1, 1, 1, "start")).await));
    }

    #[tokio::test]
    async fn test_on_callback_prefix() {
        let route = on_callback("menu:").handler(ok_handler);
        assert_ok!(run(route.clone(), Update::callback(1, 1, "menu:open")).await);
        assert!(skipped(run(route, Update::callback(1, 1, "other")).await));
    }

    #[tokio::test]
    async fn test_on_message_and_rule() {
        let route = on_message()
            .rule(|u| u.text().is_some_and(|t| t.len() > 3))
            .handler(ok_handler);
        assert_ok!(run(route.clone(), Update::text_message(1, 1, 1, "long text")).await);
        assert!(skipped(run(route.clone(), Update::text_message(1, 1, 1, "hi")).await));
        assert!(skipped(run(route, Update::callback(1, 1, "x")).await));
    }

    #[tokio::test]
    async fn test_on_any_passes_handler_errors_through() {
        let err = assert_err!(run(on_any().handler(ok_handler), Update::new(1)).await);
        assert!(!err.is::<EventSkipped>());
    }
}
