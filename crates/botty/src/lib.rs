//! # Botty
//!
//! Request dispatch for chat bots: handlers are plain async functions whose
//! parameters are resolved per update, and whose output is sent or edited in
//! place through a [`BotClient`](botty_core::BotClient).
//!
//! ```text
//! ┌──────────┐   ┌────────┐   ┌──────────────┐   ┌──────────┐   ┌───────────┐
//! │ updates  │──▶│ Router │──▶│ RequestScope │──▶│ handler  │──▶│ Response  │──▶ client
//! │ (stream) │   │        │   │  + resolver  │   │ (Answers)│   │ Processor │
//! └──────────┘   └────────┘   └──────────────┘   └──────────┘   └───────────┘
//!                                                                     │
//!                                                              MessageRegistry
//! ```
//!
//! - **Runtime**: configuration, logging, the update loop
//! - **Router**: first matching route wins; owns the scope lifecycle
//! - **Dependencies**: `Depends<T>`, `Inject<T>`, `Repo<R>`, sessions, all
//!   cached per update
//! - **Registry**: remembers sent messages per chat so later answers can edit
//!   them by key, by handler or by position
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use botty::prelude::*;
//!
//! async fn start(_: Arc<Update>, _: Arc<Context>, out: Answers) {
//!     out.send(Answer::text("Hello!").key("greeting")).await;
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = AppBuilder::new()
//!         .with_logging()
//!         .client(client)
//!         .route(on_command("start").handler(start))
//!         .build()?;
//!
//!     app.run_until_signal(updates).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*, `yaml-config`: configuration file formats
//! - `json-log`: JSON log lines
//! - `testing`: recording client and in-memory database doubles

pub use botty_core as core;
pub use botty_framework as framework;
pub use botty_runtime as runtime;

/// Commonly used types for writing handlers and starting an application.
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime
    pub use botty_runtime::{AppBuilder, Application, BottyConfig, ConfigLoader};

    // Routing
    pub use botty_framework::{
        Layer, Router, ServiceBuilderExt, on_any, on_callback, on_command, on_edited_message,
        on_message,
    };

    // Handler parameters
    pub use botty_framework::{
        Answers, AppContext, Context, ContainerBuilder, DependencyContainer, Depends, FromScope,
        Inject, Repo, Repository, RequestScope, ServiceRef,
    };

    // Core types
    pub use botty_core::{
        Answer, BotClient, BoxError, DatabaseProvider, MessageDescriptor, Session, Update,
    };
}
