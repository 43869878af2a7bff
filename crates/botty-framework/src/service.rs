//! Tower services for routes.
//!
//! [`HandlerService<H, T>`] is the building block: it wraps a single handler
//! and implements `tower::Service<Arc<RequestScope>>`. Filtering is expressed
//! as ordinary tower layers stacked on top.
//!
//! The `on_xxx()` helpers return a [`ServiceBuilder`] with a filter layer
//! pre-stacked. Call `.handler(f)` (from [`ServiceBuilderExt`]) to attach a
//! handler and obtain the final service:
//!
//! ```text
//! on_command("start")    ← ServiceBuilder<Stack<FilterLayer, Identity>>
//!     .handler(start)    ← applies FilterLayer to HandlerService<F, T>
//! ```
//!
//! The result is type-erased into [`BoxedRoute`] by
//! [`Router::route`](crate::Router::route).

use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};

use botty_core::Update;
use futures::FutureExt;
use futures::future::BoxFuture;
use tower::filter::{FilterLayer, Predicate};
use tower::util::BoxCloneSyncService;
use tower::{BoxError, Layer, Service, ServiceBuilder};
use tower_layer::Stack;
use tracing::warn;

use crate::di::{RequestScope, short_type_name};
use crate::error::EventSkipped;
use crate::handler::{Handler, invoke};

// ============================================================================
// EventPredicate
// ============================================================================

/// A type-erased [`Predicate`] over the inbound update.
///
/// When the inner closure returns `false` the request is rejected with
/// [`EventSkipped`].
#[derive(Clone)]
pub struct EventPredicate(Arc<dyn Fn(&Update) -> bool + Send + Sync>);

impl EventPredicate {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Update) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }
}

impl Predicate<Arc<RequestScope>> for EventPredicate {
    type Request = Arc<RequestScope>;

    fn check(&mut self, request: Arc<RequestScope>) -> Result<Arc<RequestScope>, BoxError> {
        if (self.0)(request.update()) {
            Ok(request)
        } else {
            Err(Box::new(EventSkipped))
        }
    }
}

/// A type-erased, `Clone + Send + Sync` route as stored by the router.
///
/// Filter layers fail with [`EventSkipped`] on mismatch, which the router
/// treats as "try the next route".
pub type BoxedRoute = BoxCloneSyncService<Arc<RequestScope>, (), BoxError>;

// ============================================================================
// HandlerService
// ============================================================================

/// A tower [`Service`] that invokes a single handler.
///
/// The handler name used in logs, errors and registry records defaults to the
/// function's short type name and can be set with [`named`](Self::named).
///
/// Closures have no name of their own and default to
/// `<enclosing fn>::{{closure}}`, which several closures may share. Their
/// registry records would then land in one handler bucket, so closure routes
/// should be built with [`with_name`](Self::with_name) or
/// [`named_handler`](ServiceBuilderExt::named_handler).
pub struct HandlerService<H, T> {
    handler: H,
    name: Arc<str>,
    _marker: PhantomData<fn() -> T>,
}

impl<H: Clone, T> Clone for HandlerService<H, T> {
    fn clone(&self) -> Self {
        HandlerService {
            handler: self.handler.clone(),
            name: Arc::clone(&self.name),
            _marker: PhantomData,
        }
    }
}

impl<H, T> HandlerService<H, T>
where
    H: Handler<T>,
{
    pub fn new(handler: H) -> Self {
        let full = std::any::type_name::<H>();
        let name = if full.ends_with(CLOSURE) {
            let name = closure_name(full);
            warn!(
                handler = %name,
                "Closure handler without an explicit name; its messages share a registry bucket with other unnamed closures"
            );
            name
        } else {
            short_type_name::<H>()
        };
        Self::with_name(handler, name)
    }

    pub fn with_name(handler: H, name: impl Into<Arc<str>>) -> Self {
        Self {
            handler,
            name: name.into(),
            _marker: PhantomData,
        }
    }

    /// Overrides the handler name.
    pub fn named(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<H, T> From<H> for HandlerService<H, T>
where
    H: Handler<T>,
{
    fn from(handler: H) -> Self {
        HandlerService::new(handler)
    }
}

impl<H, T> Service<Arc<RequestScope>> for HandlerService<H, T>
where
    H: Handler<T>,
    T: 'static,
{
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<(), Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, scope: Arc<RequestScope>) -> Self::Future {
        let handler = self.handler.clone();
        let name = Arc::clone(&self.name);
        async move {
            invoke(&handler, &scope, &name)
                .await
                .map_err(BoxError::from)
        }
        .boxed()
    }
}

const CLOSURE: &str = "{{closure}}";

/// `my_bot::setup::{{closure}}::{{closure}}` becomes `setup::{{closure}}`.
fn closure_name(full: &str) -> String {
    let mut path = full;
    while let Some(outer) = path.strip_suffix(CLOSURE).and_then(|p| p.strip_suffix("::")) {
        path = outer;
    }
    let function = path.rsplit("::").next().unwrap_or(path);
    format!("{function}::{CLOSURE}")
}

// ============================================================================
// ServiceBuilderExt
// ============================================================================

/// Extension trait for [`tower::ServiceBuilder`] with shortcuts for building
/// routes.
pub trait ServiceBuilderExt<L> {
    /// Wraps `handler` in a [`HandlerService`] and applies all stacked layers.
    ///
    /// Equivalent to `.service(HandlerService::new(handler))`.
    fn handler<H, T>(self, handler: H) -> L::Service
    where
        H: Handler<T>,
        L: Layer<HandlerService<H, T>>;

    /// Like [`handler`](Self::handler), with an explicit handler name.
    fn named_handler<H, T>(self, name: &str, handler: H) -> L::Service
    where
        H: Handler<T>,
        L: Layer<HandlerService<H, T>>;

    /// Adds a synchronous filter over the update.
    ///
    /// Equivalent to `.filter(EventPredicate::new(predicate))`.
    fn rule<F>(self, predicate: F) -> ServiceBuilder<Stack<FilterLayer<EventPredicate>, L>>
    where
        F: Fn(&Update) -> bool + Send + Sync + 'static;
}

impl<L> ServiceBuilderExt<L> for ServiceBuilder<L> {
    fn handler<H, T>(self, handler: H) -> L::Service
    where
        H: Handler<T>,
        L: Layer<HandlerService<H, T>>,
    {
        self.service(HandlerService::new(handler))
    }

    fn named_handler<H, T>(self, name: &str, handler: H) -> L::Service
    where
        H: Handler<T>,
        L: Layer<HandlerService<H, T>>,
    {
        self.service(HandlerService::with_name(handler, name))
    }

    fn rule<F>(self, predicate: F) -> ServiceBuilder<Stack<FilterLayer<EventPredicate>, L>>
    where
        F: Fn(&Update) -> bool + Send + Sync + 'static,
    {
        self.filter(EventPredicate::new(predicate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Answers;
    use crate::context::Context as EventContext;

    async fn greet(_: Arc<Update>, _: Arc<EventContext>, out: Answers) {
        out.send("hi").await;
    }

    #[test]
    fn test_closure_name_keeps_enclosing_function() {
        assert_eq!(closure_name("my_bot::setup::{{closure}}"), "setup::{{closure}}");
        assert_eq!(
            closure_name("my_bot::routes::build::{{closure}}::{{closure}}"),
            "build::{{closure}}"
        );
    }

    #[test]
    fn test_function_handler_named_after_function() {
        assert_eq!(HandlerService::new(greet).name(), "greet");
    }

    #[test]
    fn test_with_name_overrides_default() {
        let service = HandlerService::with_name(
            |_: Arc<Update>, _: Arc<EventContext>| async {},
            "status",
        );
        assert_eq!(service.name(), "status");
    }
}
