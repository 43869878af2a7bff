//! The router: entry point for one inbound update.
//!
//! For every update the router builds a [`RequestScope`] on the application
//! context, offers it to each route in registration order and stops at the
//! first route that does not skip it. It then ends the scope: the database
//! session (if one was opened) is committed when the handler succeeded and
//! closed in every case.

use std::sync::Arc;

use botty_core::Update;
use tower::util::BoxCloneSyncService;
use tower::{BoxError, Service, ServiceExt};
use tracing::{Instrument, debug, error, info_span};

use crate::context::{AppContext, Context};
use crate::di::RequestScope;
use crate::error::{EventSkipped, InvocationError};
use crate::service::BoxedRoute;

/// Ordered list of routes over a shared [`AppContext`].
#[derive(Clone)]
pub struct Router {
    app: Arc<AppContext>,
    routes: Vec<BoxedRoute>,
}

impl Router {
    pub fn new(app: Arc<AppContext>) -> Self {
        Self {
            app,
            routes: Vec::new(),
        }
    }

    /// Appends a route (builder pattern).
    pub fn route<S>(mut self, service: S) -> Self
    where
        S: Service<Arc<RequestScope>, Response = (), Error = BoxError> + Clone + Send + Sync + 'static,
        S::Future: Send + 'static,
    {
        self.add_route(service);
        self
    }

    /// Appends a route.
    pub fn add_route<S>(&mut self, service: S)
    where
        S: Service<Arc<RequestScope>, Response = (), Error = BoxError> + Clone + Send + Sync + 'static,
        S::Future: Send + 'static,
    {
        self.routes.push(BoxCloneSyncService::new(service));
    }

    pub fn app(&self) -> &Arc<AppContext> {
        &self.app
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatches `update` with a fresh context on the application's client.
    pub async fn handle(&self, update: Update) -> Result<bool, InvocationError> {
        let ctx = self.app.context();
        self.dispatch(update, ctx).await
    }

    /// Dispatches `update` to the first matching route.
    ///
    /// Returns `Ok(true)` when a route handled the update and `Ok(false)` when
    /// every route skipped it. Resolution and handler failures are logged here
    /// and returned; they are never sent to the chat.
    pub async fn dispatch(&self, update: Update, ctx: Context) -> Result<bool, InvocationError> {
        let span = info_span!("dispatch", update_id = update.update_id);
        async move {
            let scope = Arc::new(RequestScope::new(
                Arc::new(update),
                Arc::new(ctx),
                Arc::clone(&self.app),
            ));

            let mut matched = false;
            let mut result = Ok(());
            for route in &self.routes {
                match route.clone().oneshot(Arc::clone(&scope)).await {
                    Ok(()) => {
                        matched = true;
                        break;
                    }
                    Err(e) if e.is::<EventSkipped>() => continue,
                    Err(e) => {
                        matched = true;
                        result = Err(invocation_error(e));
                        break;
                    }
                }
            }

            if !matched {
                debug!("No route matched");
            }

            let finished = scope.finish(result.is_ok()).await;
            if let Err(e) = &result {
                error!(error = %e, "Failed to handle update");
            }
            result?;
            finished?;
            Ok(matched)
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.len())
            .field("app", &self.app)
            .finish()
    }
}

fn invocation_error(e: BoxError) -> InvocationError {
    match e.downcast::<InvocationError>() {
        Ok(e) => *e,
        Err(e) => InvocationError::Route(e),
    }
}
