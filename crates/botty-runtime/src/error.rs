//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while building or running an [`Application`](crate::Application).
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// [`AppBuilder::build`](crate::AppBuilder::build) was called without a client.
    #[error("No bot client configured")]
    MissingClient,

    /// The application has no routes, so every update would be dropped.
    #[error("No routes registered")]
    NoRoutes,

    /// Installing the OS signal handlers failed.
    #[error("Failed to listen for shutdown signals: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
