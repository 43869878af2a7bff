//! Dependency markers.
//!
//! A [`Depends`] pairs a resolver function with a caching flag. Resolver
//! functions are ordinary functions (sync or async) whose parameters are
//! themselves resolved from the request scope, so dependencies compose:
//!
//! ```rust,ignore
//! async fn settings() -> Result<Settings, Infallible> {
//!     Ok(Settings::from_env())
//! }
//!
//! async fn greeter(settings: Inject<Settings>, users: Repo<UserRepository>) -> Result<Greeter, BoxError> {
//!     Ok(Greeter::new(&settings, users))
//! }
//!
//! let container = DependencyContainer::builder()
//!     .provide(Depends::new(settings))
//!     .provide(Depends::new(greeter).no_cache())
//!     .build();
//! ```
//!
//! The identity of a marker is the identity of its function: two markers
//! wrapping the same function share one cache slot within a request.

use std::any::{Any, TypeId};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use botty_core::BoxError;
use futures::future::BoxFuture;

use super::chain::{DependencyChain, ResolverId, short_type_name};
use super::extract::FromScope;
use super::scope::RequestScope;
use crate::error::{ResolveError, ResolveResult};

/// A resolved dependency, type-erased for the per-request cache.
pub type ResolvedValue = Arc<dyn Any + Send + Sync>;

// ============================================================================
// Resolver traits
// ============================================================================

/// An async function usable as a dependency resolver.
///
/// Implemented for `Fn(T1, .., Tn) -> impl Future<Output = Result<T, E>>` where
/// every `Ti` is [`FromScope`] and `E` converts into a boxed error.
pub trait AsyncResolver<Args, T>: Clone + Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        scope: &'a RequestScope,
        chain: &'a DependencyChain,
    ) -> BoxFuture<'a, ResolveResult<T>>;
}

/// A synchronous function usable as a dependency resolver.
///
/// Its parameters may still need async resolution; only the function body is
/// synchronous.
pub trait SyncResolver<Args, T>: Clone + Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        scope: &'a RequestScope,
        chain: &'a DependencyChain,
    ) -> BoxFuture<'a, ResolveResult<T>>;
}

macro_rules! impl_resolvers {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_variables)]
        impl<F, Fut, T, E, $($ty,)*> AsyncResolver<($($ty,)*), T> for F
        where
            F: Fn($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Result<T, E>> + Send + 'static,
            E: Into<BoxError> + 'static,
            T: Send + 'static,
            $( $ty: FromScope, )*
        {
            fn call<'a>(
                &'a self,
                scope: &'a RequestScope,
                chain: &'a DependencyChain,
            ) -> BoxFuture<'a, ResolveResult<T>> {
                Box::pin(async move {
                    $(
                        let $ty = <$ty as FromScope>::from_scope(
                            scope,
                            &chain.push(short_type_name::<$ty>()),
                        )
                        .await?;
                    )*
                    (self)($($ty,)*)
                        .await
                        .map_err(|e| chain.resolution_error(e.into()))
                })
            }
        }

        #[allow(non_snake_case, unused_variables)]
        impl<F, T, E, $($ty,)*> SyncResolver<($($ty,)*), T> for F
        where
            F: Fn($($ty,)*) -> Result<T, E> + Clone + Send + Sync + 'static,
            E: Into<BoxError> + 'static,
            T: Send + 'static,
            $( $ty: FromScope, )*
        {
            fn call<'a>(
                &'a self,
                scope: &'a RequestScope,
                chain: &'a DependencyChain,
            ) -> BoxFuture<'a, ResolveResult<T>> {
                Box::pin(async move {
                    $(
                        let $ty = <$ty as FromScope>::from_scope(
                            scope,
                            &chain.push(short_type_name::<$ty>()),
                        )
                        .await?;
                    )*
                    (self)($($ty,)*).map_err(|e| chain.resolution_error(e.into()))
                })
            }
        }
    };
}

impl_resolvers!();
impl_resolvers!(T1);
impl_resolvers!(T1, T2);
impl_resolvers!(T1, T2, T3);
impl_resolvers!(T1, T2, T3, T4);
impl_resolvers!(T1, T2, T3, T4, T5);
impl_resolvers!(T1, T2, T3, T4, T5, T6);
impl_resolvers!(T1, T2, T3, T4, T5, T6, T7);
impl_resolvers!(T1, T2, T3, T4, T5, T6, T7, T8);

// ============================================================================
// Type erasure
// ============================================================================

/// Object-safe form of a resolver, as stored in a marker.
pub(crate) trait ErasedResolve: Send + Sync {
    fn resolve<'a>(
        &'a self,
        scope: &'a RequestScope,
        chain: &'a DependencyChain,
    ) -> BoxFuture<'a, ResolveResult<ResolvedValue>>;
}

struct AsyncFn<F, Args, T> {
    f: F,
    _marker: PhantomData<fn(Args) -> T>,
}

impl<F, Args, T> ErasedResolve for AsyncFn<F, Args, T>
where
    F: AsyncResolver<Args, T>,
    Args: 'static,
    T: Send + Sync + 'static,
{
    fn resolve<'a>(
        &'a self,
        scope: &'a RequestScope,
        chain: &'a DependencyChain,
    ) -> BoxFuture<'a, ResolveResult<ResolvedValue>> {
        Box::pin(async move {
            let value = self.f.call(scope, chain).await?;
            Ok::<_, ResolveError>(Arc::new(value) as ResolvedValue)
        })
    }
}

struct SyncFn<F, Args, T> {
    f: F,
    _marker: PhantomData<fn(Args) -> T>,
}

impl<F, Args, T> ErasedResolve for SyncFn<F, Args, T>
where
    F: SyncResolver<Args, T>,
    Args: 'static,
    T: Send + Sync + 'static,
{
    fn resolve<'a>(
        &'a self,
        scope: &'a RequestScope,
        chain: &'a DependencyChain,
    ) -> BoxFuture<'a, ResolveResult<ResolvedValue>> {
        Box::pin(async move {
            let value = self.f.call(scope, chain).await?;
            Ok::<_, ResolveError>(Arc::new(value) as ResolvedValue)
        })
    }
}

/// A fixed value standing in for a resolver.
struct Constant<T>(Arc<T>);

impl<T: Send + Sync + 'static> ErasedResolve for Constant<T> {
    fn resolve<'a>(
        &'a self,
        _scope: &'a RequestScope,
        _chain: &'a DependencyChain,
    ) -> BoxFuture<'a, ResolveResult<ResolvedValue>> {
        let value: ResolvedValue = self.0.clone();
        Box::pin(async move { Ok::<_, ResolveError>(value) })
    }
}

#[derive(Clone)]
pub(crate) struct ErasedResolver {
    pub(crate) id: ResolverId,
    pub(crate) name: String,
    pub(crate) inner: Arc<dyn ErasedResolve>,
}

// ============================================================================
// Depends
// ============================================================================

/// A dependency marker: resolver function plus caching flag.
///
/// The marker's *role* is the type its resolver produces. Handlers ask for a
/// role with [`Inject<T>`](super::Inject); the container looks up the marker
/// registered for `T`.
#[derive(Clone)]
pub struct Depends {
    resolver: Option<ErasedResolver>,
    use_cache: bool,
    output: TypeId,
    output_name: &'static str,
}

impl Depends {
    /// Wraps an async resolver function. Results are cached per request.
    pub fn new<F, Args, T>(f: F) -> Self
    where
        F: AsyncResolver<Args, T>,
        Args: 'static,
        T: Send + Sync + 'static,
    {
        Self::from_erased::<F, T>(Arc::new(AsyncFn {
            f,
            _marker: PhantomData,
        }))
    }

    /// Wraps a synchronous resolver function. Results are cached per request.
    pub fn sync<F, Args, T>(f: F) -> Self
    where
        F: SyncResolver<Args, T>,
        Args: 'static,
        T: Send + Sync + 'static,
    {
        Self::from_erased::<F, T>(Arc::new(SyncFn {
            f,
            _marker: PhantomData,
        }))
    }

    /// A marker that always yields `value`.
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_erased::<Constant<T>, T>(Arc::new(Constant(Arc::new(value))))
    }

    /// A marker for role `T` with no resolver function.
    ///
    /// Resolving it is a configuration error until a resolver is provided.
    pub fn unset<T: 'static>() -> Self {
        Self {
            resolver: None,
            use_cache: true,
            output: TypeId::of::<T>(),
            output_name: std::any::type_name::<T>(),
        }
    }

    fn from_erased<F: 'static, T: 'static>(inner: Arc<dyn ErasedResolve>) -> Self {
        Self {
            resolver: Some(ErasedResolver {
                id: TypeId::of::<F>(),
                name: short_type_name::<F>(),
                inner,
            }),
            use_cache: true,
            output: TypeId::of::<T>(),
            output_name: std::any::type_name::<T>(),
        }
    }

    /// Calls the resolver every time the dependency is requested.
    pub fn no_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Sets the caching flag explicitly.
    pub fn cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    /// Identity of the resolver function, if there is one.
    pub fn resolver_id(&self) -> Option<ResolverId> {
        self.resolver.as_ref().map(|r| r.id)
    }

    /// Short name of the resolver function.
    pub fn resolver_name(&self) -> Option<&str> {
        self.resolver.as_ref().map(|r| r.name.as_str())
    }

    pub fn has_resolver(&self) -> bool {
        self.resolver.is_some()
    }

    /// The role this marker provides.
    pub fn output_type(&self) -> TypeId {
        self.output
    }

    pub fn output_name(&self) -> &'static str {
        self.output_name
    }

    pub(crate) fn resolver(&self) -> Option<&ErasedResolver> {
        self.resolver.as_ref()
    }
}

impl fmt::Debug for Depends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Depends")
            .field("resolver", &self.resolver_name())
            .field("use_cache", &self.use_cache)
            .field("output", &self.output_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    struct Settings;

    async fn settings() -> Result<Settings, Infallible> {
        Ok(Settings)
    }

    fn sync_settings() -> Result<Settings, Infallible> {
        Ok(Settings)
    }

    #[test]
    fn test_same_function_same_identity() {
        let a = Depends::new(settings);
        let b = Depends::new(settings).no_cache();
        assert_eq!(a.resolver_id(), b.resolver_id());
        assert!(a.use_cache());
        assert!(!b.use_cache());
    }

    #[test]
    fn test_different_functions_differ() {
        let a = Depends::new(settings);
        let b = Depends::sync(sync_settings);
        assert_ne!(a.resolver_id(), b.resolver_id());
        assert_eq!(a.output_type(), b.output_type());
        assert_eq!(a.resolver_name(), Some("settings"));
    }

    #[test]
    fn test_unset_marker() {
        let marker = Depends::unset::<Settings>();
        assert!(!marker.has_resolver());
        assert_eq!(marker.output_type(), TypeId::of::<Settings>());
    }
}
