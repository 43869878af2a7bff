//! Botty Runtime: turns a router into a running application.
//!
//! - [`config`]: layered configuration (`botty.toml`, `BOTTY_*` env vars)
//! - [`logging`]: `tracing-subscriber` setup driven by that configuration
//! - [`AppBuilder`] / [`Application`]: assemble the application context and
//!   router, then dispatch an update stream with bounded concurrency and
//!   graceful shutdown
//!
//! ```ignore
//! use botty_runtime::AppBuilder;
//! use botty_framework::{on_command, on_any};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = AppBuilder::new()
//!         .with_logging()
//!         .client(client)
//!         .route(on_command("start").handler(start))
//!         .route(on_any().handler(echo))
//!         .build()?;
//!
//!     app.run_until_signal(updates).await?;
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod config;
pub mod error;
pub mod logging;

pub use application::{AppBuilder, Application, RunStats, wait_for_signal};
pub use config::{BottyConfig, ConfigError, ConfigLoader, ConfigResult, Profile};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros and `Level`.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
