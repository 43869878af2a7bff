//! Error types for the Botty framework.

use botty_core::{BoxError, ChatIdNotFound, ClientError, DatabaseError};
use thiserror::Error;

/// Returned by a route filter when an update does **not** match.
///
/// The router recognises this error and moves on to the next route without
/// logging anything. All other errors are treated as genuine failures.
#[derive(Debug, Clone, Error)]
#[error("update skipped by filter")]
pub struct EventSkipped;

fn join_chain(chain: &[String]) -> String {
    chain.join(" -> ")
}

/// Errors raised while binding a handler's parameters.
///
/// Every variant names the handler and the parameter being resolved so the
/// operator can find the offending declaration. `chain` is the full path from
/// the handler down to the failing dependency.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A dependency is declared but cannot be satisfied as configured, for
    /// example a role with no resolver function or a session requested with no
    /// database provider.
    #[error("configuration error in handler `{handler}`, parameter `{parameter}`: {message} (chain: {})", join_chain(.chain))]
    Configuration {
        message: String,
        handler: String,
        parameter: String,
        chain: Vec<String>,
    },

    /// Nothing is registered for the requested type.
    #[error("no dependency registered for `{type_name}` (handler `{handler}`, parameter `{parameter}`)")]
    NoBinding {
        type_name: String,
        handler: String,
        parameter: String,
        chain: Vec<String>,
    },

    /// A resolver (transitively) depends on itself.
    #[error("dependency cycle in handler `{handler}`: {}", join_chain(.chain))]
    Cycle {
        handler: String,
        parameter: String,
        chain: Vec<String>,
    },

    /// A resolver function returned an error.
    #[error("failed to resolve `{parameter}` in handler `{handler}` (chain: {}): {source}", join_chain(.chain))]
    Resolution {
        handler: String,
        parameter: String,
        chain: Vec<String>,
        #[source]
        source: BoxError,
    },
}

impl ResolveError {
    /// Name of the handler whose parameter failed.
    pub fn handler(&self) -> &str {
        match self {
            Self::Configuration { handler, .. }
            | Self::NoBinding { handler, .. }
            | Self::Cycle { handler, .. }
            | Self::Resolution { handler, .. } => handler,
        }
    }

    /// Name of the handler parameter being resolved.
    pub fn parameter(&self) -> &str {
        match self {
            Self::Configuration { parameter, .. }
            | Self::NoBinding { parameter, .. }
            | Self::Cycle { parameter, .. }
            | Self::Resolution { parameter, .. } => parameter,
        }
    }

    pub fn chain(&self) -> &[String] {
        match self {
            Self::Configuration { chain, .. }
            | Self::NoBinding { chain, .. }
            | Self::Cycle { chain, .. }
            | Self::Resolution { chain, .. } => chain,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

/// Result type for dependency resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Failure of a single answer. Logged by the response processor; never aborts
/// the invocation.
#[derive(Debug, Error)]
#[error("failed to process `{answer_type}` answer from handler `{handler}`: {source}")]
pub struct ResponseError {
    pub handler: String,
    pub answer_type: &'static str,
    #[source]
    pub source: ClientError,
}

/// Errors that abort a handler invocation.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// A parameter could not be resolved; the handler body never ran.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// No chat to answer in; the handler body never ran.
    #[error(transparent)]
    ChatIdNotFound(#[from] ChatIdNotFound),

    /// The handler returned an error.
    #[error("handler `{handler}` failed: {source}")]
    Handler {
        handler: String,
        #[source]
        source: BoxError,
    },

    /// The request's database session could not be committed.
    #[error("database session error: {0}")]
    Session(#[from] DatabaseError),

    /// The request scope was already used by another handler.
    #[error("request scope for handler `{0}` was already consumed")]
    ScopeConsumed(String),

    /// A route failed with an error that did not come from a handler invocation.
    #[error("route failed: {0}")]
    Route(BoxError),
}
