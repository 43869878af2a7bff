//! The dependency container.
//!
//! [`DependencyContainer`] owns two things:
//!
//! - the **registration table**, built once at startup, mapping each role
//!   (output type) to the [`Depends`] marker that provides it;
//! - the **singleton map**, process-wide instances of services keyed by type.
//!
//! Resolution of a single marker is [`DependencyContainer::resolve`]: consult
//! the request cache, detect cycles, run the resolver (its own parameters are
//! resolved first) and store the result when caching is enabled.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::chain::{DependencyChain, short_type_name};
use super::marker::{Depends, ResolvedValue};
use super::scope::RequestScope;
use crate::error::ResolveResult;

/// Registration table plus singleton store.
pub struct DependencyContainer {
    providers: HashMap<TypeId, Depends>,
    singletons: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Default for DependencyContainer {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DependencyContainer {
    /// Starts a new registration table.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    /// The marker registered for role `T`, if any.
    pub fn provider<T: 'static>(&self) -> Option<&Depends> {
        self.providers.get(&TypeId::of::<T>())
    }

    pub fn is_registered<T: 'static>(&self) -> bool {
        self.providers.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered roles.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    // ─── Resolution ───────────────────────────────────────────────────────────

    /// Resolves one marker within `scope`.
    ///
    /// With caching enabled a value already computed in this scope is returned
    /// without calling the resolver. Errors from the resolver are wrapped with
    /// the chain; a marker without a resolver is a configuration error.
    pub async fn resolve(
        &self,
        marker: &Depends,
        scope: &RequestScope,
        chain: &DependencyChain,
    ) -> ResolveResult<ResolvedValue> {
        let Some(resolver) = marker.resolver() else {
            return Err(chain.configuration_error(format!(
                "dependency `{}` is declared without a resolver function",
                marker.output_name()
            )));
        };

        if marker.use_cache() {
            if let Some(value) = scope.cached(resolver.id) {
                trace!(resolver = %resolver.name, chain = %chain, "Dependency cache hit");
                return Ok(value);
            }
        }

        let inner = chain.enter(resolver.id, resolver.name.clone())?;
        trace!(resolver = %resolver.name, chain = %inner, "Calling resolver");
        let value = resolver.inner.resolve(scope, &inner).await?;

        if marker.use_cache() {
            scope.store(resolver.id, Arc::clone(&value));
        }
        Ok(value)
    }

    /// Resolves the marker registered for role `T`.
    ///
    /// A role with no registration is a resolution error naming the handler
    /// and parameter.
    pub async fn resolve_role<T: Send + Sync + 'static>(
        &self,
        scope: &RequestScope,
        chain: &DependencyChain,
    ) -> ResolveResult<Arc<T>> {
        let type_name = short_type_name::<T>();
        let marker = self
            .provider::<T>()
            .ok_or_else(|| chain.no_binding(type_name.clone()))?;

        let value = self.resolve(marker, scope, chain).await?;
        value.downcast::<T>().map_err(|_| {
            chain.configuration_error(format!(
                "resolver for `{type_name}` produced a value of another type"
            ))
        })
    }

    // ─── Singletons ───────────────────────────────────────────────────────────

    /// Returns the process-wide instance of `S`, creating it on first use.
    ///
    /// Services are built with [`Default`]; there is no way to pass arguments
    /// from the resolution context. Pre-seed with
    /// [`ContainerBuilder::singleton`] when a service needs configuration.
    pub fn singleton<S: Default + Send + Sync + 'static>(&self) -> Arc<S> {
        let id = TypeId::of::<S>();
        let mut singletons = self.singletons.lock();
        if let Some(existing) = singletons
            .get(&id)
            .and_then(|v| Arc::clone(v).downcast::<S>().ok())
        {
            return existing;
        }

        debug!(service = %short_type_name::<S>(), "Creating service instance");
        let created = Arc::new(S::default());
        singletons.insert(id, created.clone());
        created
    }

    pub fn has_singleton<S: 'static>(&self) -> bool {
        self.singletons.lock().contains_key(&TypeId::of::<S>())
    }

    /// Drops every singleton. The registration table is kept.
    pub fn reset(&self) {
        let mut singletons = self.singletons.lock();
        debug!(count = singletons.len(), "Resetting service instances");
        singletons.clear();
    }
}

impl fmt::Debug for DependencyContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyContainer")
            .field("providers", &self.providers.values().collect::<Vec<_>>())
            .field("singletons", &self.singletons.lock().len())
            .finish()
    }
}

// ============================================================================
// ContainerBuilder
// ============================================================================

/// Builds the registration table.
///
/// Later registrations for the same role replace earlier ones, which is how
/// tests swap in doubles:
///
/// ```rust,ignore
/// let container = DependencyContainer::builder()
///     .provide(Depends::new(load_settings))
///     .override_value(Settings::for_tests())
///     .build();
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
    providers: HashMap<TypeId, Depends>,
    singletons: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ContainerBuilder {
    /// Registers `marker` as the provider of its output type.
    pub fn provide(mut self, marker: Depends) -> Self {
        if let Some(previous) = self.providers.insert(marker.output_type(), marker) {
            debug!(role = previous.output_name(), "Replacing dependency provider");
        }
        self
    }

    /// Declares role `T` without a resolver.
    pub fn declare<T: 'static>(self) -> Self {
        self.provide(Depends::unset::<T>())
    }

    /// Provides role `T` with a fixed value.
    pub fn override_value<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.provide(Depends::value(value))
    }

    /// Pre-seeds the singleton for service `S`.
    pub fn singleton<S: Send + Sync + 'static>(mut self, instance: S) -> Self {
        self.singletons.insert(TypeId::of::<S>(), Arc::new(instance));
        self
    }

    pub fn build(self) -> DependencyContainer {
        DependencyContainer {
            providers: self.providers,
            singletons: Mutex::new(self.singletons),
        }
    }
}
