//! Dependency resolution.
//!
//! - [`Depends`]: a resolver function plus a caching flag
//! - [`RequestScope`]: per-invocation cache and lazy database session
//! - [`DependencyContainer`]: registration table, singletons, and the
//!   recursive resolve algorithm
//! - [`resolve_parameter`]: binds one handler parameter
//! - [`FromScope`]: everything that can appear as a parameter

pub mod chain;
pub mod container;
pub mod extract;
pub mod marker;
pub mod resolver;
pub mod scope;

pub use chain::{DependencyChain, ResolverId, short_type_name};
pub use container::{ContainerBuilder, DependencyContainer};
pub use extract::{FromScope, Inject, Repo, Repository, ServiceRef};
pub use marker::{AsyncResolver, Depends, ResolvedValue, SyncResolver};
pub use resolver::resolve_parameter;
pub use scope::RequestScope;
