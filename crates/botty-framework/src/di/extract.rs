//! Parameter extraction from a request scope.
//!
//! [`FromScope`] is implemented for everything a handler or resolver may ask
//! for. The set of built-in injectables is closed and checked at compile time:
//!
//! | Parameter                | Source                                          |
//! |--------------------------|-------------------------------------------------|
//! | `Arc<Update>`            | the inbound update                              |
//! | `Arc<Context>`           | the per-event side-channel context              |
//! | `Arc<AppContext>`        | the application context                         |
//! | `Arc<dyn Session>`       | the request's lazily opened database session    |
//! | [`Answers`]              | the handler's output sink (handlers only)       |
//! | [`Inject<T>`]            | the marker registered for role `T`              |
//! | [`ServiceRef<S>`]        | the container's singleton of `S`                |
//! | [`Repo<R>`]              | a fresh repository bound to the session         |
//! | `Option<T>`              | `T`, or `None` if no provider is registered     |

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use botty_core::{DatabaseError, Session, Update};
use tracing::debug;

use super::chain::{DependencyChain, short_type_name};
use super::scope::RequestScope;
use crate::answers::Answers;
use crate::context::{AppContext, Context};
use crate::error::{ResolveError, ResolveResult};

/// A type that can be resolved from a [`RequestScope`].
///
/// `chain` names the path from the handler to this value and is used to build
/// error messages.
///
/// # Example
///
/// ```rust,ignore
/// struct Locale(String);
///
/// #[async_trait]
/// impl FromScope for Locale {
///     async fn from_scope(scope: &RequestScope, _chain: &DependencyChain) -> ResolveResult<Self> {
///         Ok(Locale(scope.context().get_state::<String>().unwrap_or_else(|| "en".into())))
///     }
/// }
/// ```
#[async_trait]
pub trait FromScope: Sized + Send + 'static {
    async fn from_scope(scope: &RequestScope, chain: &DependencyChain) -> ResolveResult<Self>;
}

// ============================================================================
// Basic injectables
// ============================================================================

#[async_trait]
impl FromScope for Arc<Update> {
    async fn from_scope(scope: &RequestScope, _chain: &DependencyChain) -> ResolveResult<Self> {
        Ok(Arc::clone(scope.update()))
    }
}

#[async_trait]
impl FromScope for Arc<Context> {
    async fn from_scope(scope: &RequestScope, _chain: &DependencyChain) -> ResolveResult<Self> {
        Ok(Arc::clone(scope.context()))
    }
}

#[async_trait]
impl FromScope for Arc<AppContext> {
    async fn from_scope(scope: &RequestScope, _chain: &DependencyChain) -> ResolveResult<Self> {
        Ok(Arc::clone(scope.app()))
    }
}

#[async_trait]
impl FromScope for Arc<dyn Session> {
    async fn from_scope(scope: &RequestScope, chain: &DependencyChain) -> ResolveResult<Self> {
        scope.session().map_err(|e| session_error(chain, e))
    }
}

#[async_trait]
impl FromScope for Answers {
    async fn from_scope(scope: &RequestScope, chain: &DependencyChain) -> ResolveResult<Self> {
        // Output is drained only once every parameter is bound.
        if chain.in_resolver() {
            return Err(chain.configuration_error(
                "the output sink can only be injected into handlers, not dependency resolvers",
            ));
        }
        Ok(scope.answers())
    }
}

#[async_trait]
impl<T: FromScope> FromScope for Option<T> {
    async fn from_scope(scope: &RequestScope, chain: &DependencyChain) -> ResolveResult<Self> {
        match T::from_scope(scope, chain).await {
            Ok(value) => Ok(Some(value)),
            Err(e @ ResolveError::NoBinding { .. }) => {
                debug!(chain = %chain, error = %e, "Optional dependency not registered");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Maps a session failure onto a resolution error with handler context.
fn session_error(chain: &DependencyChain, error: DatabaseError) -> ResolveError {
    match error {
        DatabaseError::NotConfigured => chain.configuration_error(
            "a database session was requested but no database provider is configured",
        ),
        other => chain.resolution_error(Box::new(other)),
    }
}

// ============================================================================
// Inject
// ============================================================================

/// A dependency resolved through the marker registered for role `T`.
///
/// Values are shared: with caching enabled, every `Inject<T>` in one request
/// points at the same instance.
pub struct Inject<T: ?Sized>(pub Arc<T>);

impl<T: ?Sized> Inject<T> {
    pub fn into_inner(self) -> Arc<T> {
        self.0
    }
}

impl<T: ?Sized> Deref for Inject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: ?Sized> Clone for Inject<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Inject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Inject").field(&&*self.0).finish()
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> FromScope for Inject<T> {
    async fn from_scope(scope: &RequestScope, chain: &DependencyChain) -> ResolveResult<Self> {
        scope
            .container()
            .resolve_role::<T>(scope, chain)
            .await
            .map(Inject)
    }
}

// ============================================================================
// ServiceRef
// ============================================================================

/// A process-wide service instance.
///
/// Services are built once with [`Default`] and shared by every request until
/// the container is reset.
pub struct ServiceRef<S: ?Sized>(pub Arc<S>);

impl<S: ?Sized> Deref for ServiceRef<S> {
    type Target = S;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S: ?Sized> Clone for ServiceRef<S> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

#[async_trait]
impl<S: Default + Send + Sync + 'static> FromScope for ServiceRef<S> {
    async fn from_scope(scope: &RequestScope, _chain: &DependencyChain) -> ResolveResult<Self> {
        Ok(ServiceRef(scope.container().singleton::<S>()))
    }
}

// ============================================================================
// Repo
// ============================================================================

/// A data-access object bound to the request's database session.
pub trait Repository: Send + Sync + 'static {
    fn from_session(session: Arc<dyn Session>) -> Self;
}

/// A fresh repository instance for this request. Never shared across requests.
pub struct Repo<R>(pub Arc<R>);

impl<R> Deref for Repo<R> {
    type Target = R;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<R> Clone for Repo<R> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

#[async_trait]
impl<R: Repository> FromScope for Repo<R> {
    async fn from_scope(scope: &RequestScope, chain: &DependencyChain) -> ResolveResult<Self> {
        let session = scope.session().map_err(|e| session_error(chain, e))?;
        debug!(repository = %short_type_name::<R>(), "Creating repository");
        Ok(Repo(Arc::new(R::from_session(session))))
    }
}
