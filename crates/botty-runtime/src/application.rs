//! Application assembly and the update loop.
//!
//! ```rust,ignore
//! let app = AppBuilder::new()
//!     .config_file("botty.toml")
//!     .with_logging()
//!     .client(client)
//!     .container(container)
//!     .route(on_command("start").handler(start))
//!     .route(on_any().handler(fallback))
//!     .build()?;
//!
//! let stats = app.run_until_signal(updates).await?;
//! ```
//!
//! [`Application::run`] spawns one task per update, at most
//! `runtime.max_in_flight` at a time. Once the shutdown token is cancelled no
//! further updates are taken from the stream; in-flight updates get
//! `runtime.shutdown_timeout_secs` to finish and are aborted after that.

use std::path::PathBuf;
use std::sync::Arc;

use botty_core::{BoxError, BoxedBotClient, BoxedDatabaseProvider, Update};
use botty_framework::{AppContext, BoxedRoute, DependencyContainer, RequestScope, Router};
use futures::{Stream, StreamExt};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tower::Service;
use tower::util::BoxCloneSyncService;
use tracing::{debug, error, info, warn};

use crate::config::{BottyConfig, ConfigLoader, RuntimeConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// Counters for one [`Application::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Updates taken from the stream.
    pub received: u64,
    /// Updates a route handled successfully.
    pub handled: u64,
    /// Updates no route matched.
    pub unmatched: u64,
    /// Updates whose dispatch returned an error or panicked.
    pub failed: u64,
    /// Updates still running when the shutdown timeout expired.
    pub aborted: u64,
}

impl RunStats {
    fn record(&mut self, outcome: Result<Outcome, JoinError>) {
        match outcome {
            Ok(Outcome::Handled) => self.handled += 1,
            Ok(Outcome::Unmatched) => self.unmatched += 1,
            Ok(Outcome::Failed) => self.failed += 1,
            Err(e) if e.is_cancelled() => self.aborted += 1,
            Err(e) => {
                error!(error = %e, "Update task panicked");
                self.failed += 1;
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Handled,
    Unmatched,
    Failed,
}

// =============================================================================
// AppBuilder
// =============================================================================

/// Builder for [`Application`].
///
/// Configuration comes from [`config`](Self::config) if given, otherwise it
/// is loaded with a [`ConfigLoader`] using [`config_file`](Self::config_file)
/// and [`profile`](Self::profile). Either way it is validated.
#[derive(Default)]
pub struct AppBuilder {
    config: Option<BottyConfig>,
    config_file: Option<PathBuf>,
    profile: Option<String>,
    init_logging: bool,
    client: Option<BoxedBotClient>,
    database: Option<BoxedDatabaseProvider>,
    container: Option<DependencyContainer>,
    routes: Vec<BoxedRoute>,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an already loaded configuration.
    pub fn from_config(config: BottyConfig) -> Self {
        Self::new().config(config)
    }

    pub fn config(mut self, config: BottyConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Installs the global subscriber from `logging` during [`build`](Self::build).
    pub fn with_logging(mut self) -> Self {
        self.init_logging = true;
        self
    }

    pub fn client(mut self, client: BoxedBotClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn database(mut self, provider: BoxedDatabaseProvider) -> Self {
        self.database = Some(provider);
        self
    }

    pub fn container(mut self, container: DependencyContainer) -> Self {
        self.container = Some(container);
        self
    }

    /// Appends a route. Routes are tried in the order they were added.
    pub fn route<S>(mut self, service: S) -> Self
    where
        S: Service<Arc<RequestScope>, Response = (), Error = BoxError>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        self.routes.push(BoxCloneSyncService::new(service));
        self
    }

    fn load_config(&mut self) -> RuntimeResult<BottyConfig> {
        if let Some(config) = self.config.take() {
            return Ok(config);
        }
        let mut loader = ConfigLoader::new();
        if let Some(profile) = &self.profile {
            loader = loader.profile(profile);
        }
        if let Some(path) = &self.config_file {
            loader = loader.file(path);
        }
        Ok(loader.load()?)
    }

    pub fn build(mut self) -> RuntimeResult<Application> {
        let config = self.load_config()?;
        validate_config(&config)?;

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let client = self.client.ok_or(RuntimeError::MissingClient)?;
        if self.routes.is_empty() {
            return Err(RuntimeError::NoRoutes);
        }

        let mut app = AppContext::builder(client)
            .container(self.container.unwrap_or_default())
            .max_per_chat(config.registry.max_per_chat);
        if let Some(database) = self.database {
            app = app.database(database);
        }

        let router = self
            .routes
            .into_iter()
            .fold(Router::new(app.build()), |router, route| router.route(route));

        info!(
            routes = router.len(),
            max_per_chat = config.registry.max_per_chat,
            max_in_flight = config.runtime.max_in_flight,
            "Application built"
        );

        Ok(Application {
            router: Arc::new(router),
            runtime: config.runtime,
            shutdown: CancellationToken::new(),
        })
    }
}

// =============================================================================
// Application
// =============================================================================

/// A built router plus the settings for running it over an update stream.
pub struct Application {
    router: Arc<Router>,
    runtime: RuntimeConfig,
    shutdown: CancellationToken,
}

impl Application {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn app(&self) -> &Arc<AppContext> {
        self.router.app()
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Dispatches every update from `updates` until the stream ends or the
    /// shutdown token is cancelled.
    pub async fn run<S>(&self, updates: S) -> RuntimeResult<RunStats>
    where
        S: Stream<Item = Update>,
    {
        let mut updates = std::pin::pin!(updates);
        let slots = Arc::new(Semaphore::new(self.runtime.max_in_flight));
        let mut tasks = JoinSet::new();
        let mut stats = RunStats::default();

        info!(max_in_flight = self.runtime.max_in_flight, "Accepting updates");

        loop {
            let update = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, no longer accepting updates");
                    break;
                }
                next = updates.next() => match next {
                    Some(update) => update,
                    None => {
                        debug!("Update stream ended");
                        break;
                    }
                },
            };

            let permit = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    debug!(update_id = update.update_id, "Dropping update received during shutdown");
                    break;
                }
                permit = Arc::clone(&slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            stats.received += 1;
            let router = Arc::clone(&self.router);
            tasks.spawn(async move {
                let _permit = permit;
                // The router has already logged the error.
                match router.handle(update).await {
                    Ok(true) => Outcome::Handled,
                    Ok(false) => Outcome::Unmatched,
                    Err(_) => Outcome::Failed,
                }
            });

            while let Some(done) = tasks.try_join_next() {
                stats.record(done);
            }
        }

        self.drain(&mut tasks, &mut stats).await;

        info!(
            received = stats.received,
            handled = stats.handled,
            unmatched = stats.unmatched,
            failed = stats.failed,
            aborted = stats.aborted,
            "Stopped"
        );
        Ok(stats)
    }

    /// Like [`run`](Self::run), also cancelling the shutdown token on Ctrl+C
    /// or SIGTERM.
    pub async fn run_until_signal<S>(&self, updates: S) -> RuntimeResult<RunStats>
    where
        S: Stream<Item = Update>,
    {
        let token = self.shutdown_token();
        let watcher = tokio::spawn(async move {
            tokio::select! {
                result = wait_for_signal() => match result {
                    Ok(()) => token.cancel(),
                    Err(e) => error!(error = %e, "Shutdown signals unavailable"),
                },
                _ = token.cancelled() => {}
            }
        });

        let stats = self.run(updates).await;
        watcher.abort();
        stats
    }

    async fn drain(&self, tasks: &mut JoinSet<Outcome>, stats: &mut RunStats) {
        if tasks.is_empty() {
            return;
        }
        let timeout = self.runtime.shutdown_timeout();
        info!(in_flight = tasks.len(), ?timeout, "Waiting for in-flight updates");

        let finished = tokio::time::timeout(timeout, async {
            while let Some(done) = tasks.join_next().await {
                stats.record(done);
            }
        })
        .await;

        if finished.is_err() {
            warn!(in_flight = tasks.len(), "Shutdown timeout expired, aborting updates");
            tasks.abort_all();
            while let Some(done) = tasks.join_next().await {
                stats.record(done);
            }
        }
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("router", &self.router)
            .field("runtime", &self.runtime)
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish()
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn wait_for_signal() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        result.map_err(RuntimeError::Signal)?;
                        info!("Received Ctrl+C, shutting down");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
                return Ok(());
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    tokio::signal::ctrl_c().await.map_err(RuntimeError::Signal)?;
    info!("Received Ctrl+C, shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use botty_framework::testing::RecordingClient;
    use botty_framework::{Answers, Context, ServiceBuilderExt, on_any, on_command};
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    async fn start(_: Arc<Update>, _: Arc<Context>, out: Answers) {
        out.send("welcome").await;
    }

    async fn broken(_: Arc<Update>, _: Arc<Context>) -> Result<(), BoxError> {
        Err("boom".into())
    }

    async fn stuck(_: Arc<Update>, _: Arc<Context>) {
        std::future::pending::<()>().await;
    }

    fn builder(client: Arc<RecordingClient>) -> AppBuilder {
        AppBuilder::from_config(BottyConfig::default()).client(client)
    }

    #[test]
    fn test_build_requires_client_and_routes() {
        let err = assert_err!(
            AppBuilder::from_config(BottyConfig::default())
                .route(on_any().handler(start))
                .build()
        );
        assert!(matches!(err, RuntimeError::MissingClient));

        let err = assert_err!(builder(Arc::new(RecordingClient::new())).build());
        assert!(matches!(err, RuntimeError::NoRoutes));
    }

    #[test]
    fn test_build_validates_config() {
        let mut config = BottyConfig::default();
        config.registry.max_per_chat = 0;
        let err = assert_err!(
            AppBuilder::from_config(config)
                .client(Arc::new(RecordingClient::new()))
                .route(on_any().handler(start))
                .build()
        );
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[test]
    fn test_registry_bound_from_config() {
        let mut config = BottyConfig::default();
        config.registry.max_per_chat = 7;
        let app = assert_ok!(
            AppBuilder::from_config(config)
                .client(Arc::new(RecordingClient::new()))
                .route(on_any().handler(start))
                .build()
        );
        assert_eq!(app.app().registry().max_per_chat(), 7);
        assert_eq!(app.router().len(), 1);
    }

    #[tokio::test]
    async fn test_run_counts_outcomes() {
        let client = Arc::new(RecordingClient::new());
        let app = assert_ok!(
            builder(client.clone())
                .route(on_command("start").handler(start))
                .route(on_command("fail").handler(broken))
                .build()
        );

        let updates = futures::stream::iter(vec![
            Update::text_message(1, 10, 1, "/start"),
            Update::text_message(2, 10, 2, "hello"),
            Update::text_message(3, 10, 3, "/fail"),
            Update::text_message(4, 11, 4, "/start"),
        ]);
        let stats = assert_ok!(app.run(updates).await);

        assert_eq!(
            stats,
            RunStats {
                received: 4,
                handled: 2,
                unmatched: 1,
                failed: 1,
                aborted: 0,
            }
        );
        assert_eq!(client.texts(), vec!["welcome", "welcome"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_run_takes_nothing() {
        let client = Arc::new(RecordingClient::new());
        let app = assert_ok!(builder(client.clone()).route(on_any().handler(start)).build());
        app.shutdown();

        let stats = assert_ok!(app.run(futures::stream::iter(vec![Update::new(1)])).await);
        assert_eq!(stats.received, 0);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_stream() {
        let app = assert_ok!(
            builder(Arc::new(RecordingClient::new()))
                .route(on_any().handler(start))
                .build()
        );
        let token = app.shutdown_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let stats = assert_ok!(app.run(futures::stream::pending::<Update>()).await);
        assert_eq!(stats, RunStats::default());
    }

    #[tokio::test]
    async fn test_shutdown_timeout_aborts_in_flight() {
        let mut config = BottyConfig::default();
        config.runtime.shutdown_timeout_secs = 0;
        let app = assert_ok!(
            AppBuilder::from_config(config)
                .client(Arc::new(RecordingClient::new()))
                .route(on_any().handler(stuck))
                .build()
        );

        let stats = assert_ok!(
            app.run(futures::stream::iter(vec![Update::text_message(1, 10, 1, "x")]))
                .await
        );
        assert_eq!(stats.received, 1);
        assert_eq!(stats.aborted, 1);
    }
}
