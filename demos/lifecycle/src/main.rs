//! Three services wired through the registry and driven by the lifecycle orchestrator.
//!
//! `Database` starts first, `HttpServer` and `Worker` depend on it and start together.
//! Press Ctrl+C to shut down gracefully, press it again to force the exit.
//!
//! Log verbosity follows `RUST_LOG`, e.g. `RUST_LOG=rivet_lifecycle=trace`.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use rivet_config::{Config, ConfigProvider};
use rivet_di::{DiError, Named, Registry, ServiceName};
use rivet_lifecycle::{async_trait, App, DynError, HookContext, Lifecycle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

struct DatabaseConfig {
    url: String,
}

struct HttpConfig {
    port: u16,
    tick: Duration,
}

struct Database {
    url: String,
    queries: AtomicU64,
}

impl Database {
    fn query(&self) -> u64 {
        self.queries.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl Lifecycle for Database {
    async fn on_start(&self, _ctx: HookContext) -> Result<(), DynError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tracing::info!(url = %self.url, "Database connected");
        Ok(())
    }

    async fn on_stop(&self, _ctx: HookContext) -> Result<(), DynError> {
        tracing::info!(queries = self.queries.load(Ordering::Relaxed), "Database closed");
        Ok(())
    }
}

/// Background loop owned by a service, stopped through its token
#[derive(Default)]
struct Background {
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Background {
    fn spawn(&self, task: impl std::future::Future<Output = ()> + Send + 'static) {
        let handle = tokio::spawn(task);
        if let Ok(mut slot) = self.task.lock() {
            *slot = Some(handle);
        }
    }

    async fn shutdown(&self) -> Result<(), DynError> {
        self.token.cancel();
        let task = self.task.lock().ok().and_then(|mut slot| slot.take());
        if let Some(task) = task {
            task.await?;
        }
        Ok(())
    }
}

struct HttpServer {
    config: Config<HttpConfig>,
    database: Arc<Database>,
    background: Background,
}

#[async_trait]
impl Lifecycle for HttpServer {
    async fn on_start(&self, _ctx: HookContext) -> Result<(), DynError> {
        let database = self.database.clone();
        let token = self.background.token.clone();
        let tick = self.config.tick;
        self.background.spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        tracing::debug!(query = database.query(), "Handled request");
                    }
                }
            }
        });
        tracing::info!(port = self.config.port, "HTTP server listening");
        Ok(())
    }

    async fn on_stop(&self, _ctx: HookContext) -> Result<(), DynError> {
        self.background.shutdown().await?;
        tracing::info!("HTTP server drained");
        Ok(())
    }
}

struct Jobs;
impl ServiceName for Jobs {
    const NAME: &'static str = "jobs";
}

struct Worker {
    database: Arc<Database>,
    queue: Arc<String>,
}

#[async_trait]
impl Lifecycle for Worker {
    async fn on_start(&self, _ctx: HookContext) -> Result<(), DynError> {
        tracing::info!(queue = %self.queue, first_query = self.database.query(), "Worker started");
        Ok(())
    }

    /// Simulates a slow drain that is cut short by its own stop timeout
    async fn on_stop(&self, ctx: HookContext) -> Result<(), DynError> {
        tokio::select! {
            _ = ctx.cancelled() => tracing::warn!("Worker drain cancelled"),
            _ = tokio::time::sleep(Duration::from_secs(3)) => tracing::info!("Worker drained"),
        }
        Ok(())
    }

    fn stop_timeout(&self) -> Option<Duration> {
        Some(Duration::from_secs(1))
    }
}

fn register(registry: &Registry) -> Result<(), DynError> {
    let mut configs = ConfigProvider::new();
    configs
        .add_config(DatabaseConfig {
            url: "postgres://localhost/demo".to_string(),
        })?
        .add_config(HttpConfig {
            port: 8080,
            tick: Duration::from_millis(500),
        })?;
    configs.register(registry)?;

    registry
        .instance("default".to_string())
        .named(Jobs::NAME)
        .register()?;

    registry
        .constructor(|(config,): (Config<DatabaseConfig>,)| {
            Ok::<_, DiError>(Database {
                url: config.url.clone(),
                queries: AtomicU64::new(0),
            })
        })
        .eager()
        .with_lifecycle()
        .register()?;

    registry
        .constructor(
            |(config, database): (Config<HttpConfig>, Arc<Database>)| {
                Ok::<_, DiError>(HttpServer {
                    config,
                    database,
                    background: Background::default(),
                })
            },
        )
        .with_lifecycle()
        .register()?;

    registry
        .constructor(
            |(database, queue): (Arc<Database>, Named<String, Jobs>)| {
                Ok::<_, DiError>(Worker {
                    database,
                    queue: queue.into_inner(),
                })
            },
        )
        .with_lifecycle()
        .register()?;

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rivet_di=debug,rivet_lifecycle=debug,lifecycle_demo=debug")),
        )
        .with_thread_names(true)
        .init();

    let registry = Registry::new();
    if let Err(error) = register(&registry) {
        tracing::error!(%error, "Registration failed");
        std::process::exit(1);
    }

    let app = App::builder(registry)
        .stop_timeout(Duration::from_secs(5))
        .shutdown_timeout(Duration::from_secs(15))
        .build();

    if let Err(errors) = app.run(CancellationToken::new()).await {
        tracing::error!(%errors, "Application finished with errors");
        std::process::exit(1);
    }
}
