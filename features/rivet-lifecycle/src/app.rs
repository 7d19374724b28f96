use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError},
    time::{Duration, Instant},
};

use futures::future::join_all;
use rivet_di::{BuildErrors, HookContext, Lifecycle, Registry};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::{
    config::LifecycleConfig,
    errors::{Hook, LifecycleError, LifecycleErrors},
    exit::{ExitStrategy, ProcessExit},
    order::{compute_shutdown_order, compute_startup_order, Layers},
    signals::{self, OsSignals, Signal, SignalSource},
    watchdog::Watchdog,
};

/// Where the application is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Created,
    Built,
    Running,
    ShuttingDown,
    Stopped,
}

/// What ended [App::run]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The token passed to `run` was cancelled
    Cancelled,
    /// `stop` or a [StopHandle] was used
    Requested,
    Signal(Signal),
}

pub struct AppBuilder {
    registry: Registry,
    config: LifecycleConfig,
    exit: Arc<dyn ExitStrategy>,
    signals: Arc<dyn SignalSource>,
}

impl AppBuilder {
    pub fn config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Default timeout of a single stop hook
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.config.stop_timeout = timeout;
        self
    }

    /// Timeout of the whole shutdown, exceeding it forces an exit
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    pub fn start_timeout(mut self, timeout: Duration) -> Self {
        self.config.start_timeout = Some(timeout);
        self
    }

    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.config.handle_signals = enabled;
        self
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.config.exit_code = code;
        self
    }

    /// Replace how the process is terminated when shutdown must be forced
    pub fn exit_strategy(mut self, exit: impl ExitStrategy) -> Self {
        self.exit = Arc::new(exit);
        self
    }

    /// Replace where shutdown signals come from, only used with `handle_signals`
    pub fn signal_source(mut self, signals: impl SignalSource) -> Self {
        self.signals = Arc::new(signals);
        self
    }

    pub fn build(self) -> App {
        App(Arc::new(AppInner {
            registry: self.registry,
            config: self.config,
            exit: self.exit,
            signals: self.signals,
            state: Mutex::new(AppState::Created),
            build_lock: Mutex::new(()),
            plan: OnceLock::new(),
            started: Mutex::new(Vec::new()),
            layers: tokio::sync::Mutex::new(()),
            stop_requested: CancellationToken::new(),
            root: CancellationToken::new(),
            stopped: OnceCell::new(),
        }))
    }
}

/// Drives the registered services through build, start and stop
///
/// Services registered with lifecycle hooks are started layer by layer in
/// dependency order, every member of a layer concurrently. Shutdown walks the
/// layers in reverse and stops services one at a time, each bounded by its
/// stop timeout, the whole shutdown bounded by the global timeout.
#[derive(Clone)]
pub struct App(Arc<AppInner>);

struct AppInner {
    registry: Registry,
    config: LifecycleConfig,
    exit: Arc<dyn ExitStrategy>,
    signals: Arc<dyn SignalSource>,
    state: Mutex<AppState>,
    build_lock: Mutex<()>,
    plan: OnceLock<Plan>,
    /// Services whose start hook succeeded, in completion order
    started: Mutex<Vec<String>>,
    /// Held while a startup layer runs and for the whole shutdown
    layers: tokio::sync::Mutex<()>,
    stop_requested: CancellationToken,
    /// Parent of every start hook token, cancelled once stopped
    root: CancellationToken,
    /// Outcome of the one shutdown, shared by every `stop` caller
    stopped: OnceCell<Result<(), LifecycleErrors>>,
}

struct Plan {
    startup: Layers,
    shutdown: Layers,
    hooks: BTreeMap<String, Arc<dyn Lifecycle>>,
}

impl App {
    pub fn builder(registry: Registry) -> AppBuilder {
        AppBuilder {
            registry,
            config: LifecycleConfig::default(),
            exit: Arc::new(ProcessExit),
            signals: Arc::new(OsSignals),
        }
    }

    pub fn new(registry: Registry) -> App {
        Self::builder(registry).build()
    }

    pub fn registry(&self) -> &Registry {
        &self.0.registry
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.0.config
    }

    pub fn state(&self) -> AppState {
        *self.lock_state()
    }

    /// Layers services are started in, available once built
    pub fn startup_order(&self) -> Option<&Layers> {
        self.0.plan.get().map(|plan| &plan.startup)
    }

    /// Layers services are stopped in, available once built
    pub fn shutdown_order(&self) -> Option<&Layers> {
        self.0.plan.get().map(|plan| &plan.shutdown)
    }

    /// Handle to request a stop of a running application from anywhere
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.0.stop_requested.clone())
    }

    /// Builds the registry, resolves every service with lifecycle hooks and computes
    /// startup and shutdown order
    ///
    /// Repeated calls after success are no-ops.
    pub fn build(&self) -> Result<(), LifecycleError> {
        let _build = self
            .0
            .build_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.0.plan.get().is_some() {
            return Ok(());
        }
        let state = self.state();
        if state != AppState::Created {
            return Err(LifecycleError::InvalidState {
                state,
                operation: "build",
            });
        }

        let registry = &self.0.registry;
        registry.build()?;

        let names = registry.names();
        let mut hooks = BTreeMap::new();
        let mut errors = Vec::new();
        for name in &names {
            match registry.lifecycle_of(name) {
                Ok(Some(hook)) => {
                    hooks.insert(name.clone(), hook);
                }
                Ok(None) => {}
                Err(error) => errors.push(error),
            }
        }
        if !errors.is_empty() {
            return Err(BuildErrors { errors }.into());
        }

        let services: BTreeSet<String> = names.into_iter().collect();
        let graph = registry.dependency_graph();
        let startup = compute_startup_order(&graph, &services, |name| hooks.contains_key(name))?;
        let shutdown = compute_shutdown_order(&startup);

        tracing::info!(
            services = services.len(),
            with_hooks = hooks.len(),
            layers = startup.len(),
            "Application built"
        );
        tracing::debug!(?startup, "Startup order");

        let _ = self.0.plan.set(Plan {
            startup,
            shutdown,
            hooks,
        });
        *self.lock_state() = AppState::Built;

        Ok(())
    }

    /// Starts every service, layer by layer
    ///
    /// If any start hook of a layer fails, later layers are not started, everything
    /// started so far is stopped again and the start errors are returned.
    ///
    /// A stop requested meanwhile lets the running layer finish, stops everything
    /// started and fails with [LifecycleError::Interrupted].
    pub async fn start(&self) -> Result<(), LifecycleErrors> {
        self.build()?;
        self.transition(AppState::Built, AppState::Running, "start")?;
        let plan = self.plan()?;

        tracing::info!("Starting application");
        for (index, layer) in plan.startup.iter().enumerate() {
            let layer_guard = self.0.layers.lock().await;
            if self.0.stop_requested.is_cancelled() {
                drop(layer_guard);
                return self.interrupted(index).await;
            }

            tracing::debug!(layer = index, services = ?layer, "Starting layer");
            let starting = layer
                .iter()
                .filter_map(|name| plan.hooks.get(name).map(|hook| (name, hook.clone())));
            let results = join_all(
                starting.map(|(name, hook)| async move { (name, self.start_service(name, hook).await) }),
            )
            .await;

            let mut errors = Vec::new();
            for (name, result) in results {
                match result {
                    Ok(()) => self.lock_started().push(name.clone()),
                    Err(error) => errors.push(error),
                }
            }
            // Rollback goes through shutdown, which takes the lock itself
            drop(layer_guard);

            if !errors.is_empty() {
                tracing::error!(
                    layer = index,
                    failures = errors.len(),
                    "Startup failed, stopping started services"
                );
                if let Err(rollback) = self.stop().await {
                    tracing::warn!(error = %rollback, "Rollback after failed startup reported errors");
                }
                return Err(LifecycleErrors { errors });
            }
        }

        if self.0.stop_requested.is_cancelled() {
            return self.interrupted(plan.startup.len()).await;
        }

        tracing::info!("Application started");
        Ok(())
    }

    async fn interrupted(&self, layer: usize) -> Result<(), LifecycleErrors> {
        tracing::warn!(layer, "Stop requested during startup");
        match self.stop().await {
            Ok(()) => Err(LifecycleError::Interrupted.into()),
            Err(mut errors) => {
                errors.errors.insert(0, LifecycleError::Interrupted);
                Err(errors)
            }
        }
    }

    /// Starts the application and blocks until it should stop, then stops it
    ///
    /// Stopping is triggered by the first of: `cancel` being cancelled, a stop
    /// request, an interrupt or a terminate signal. All of them end up in the
    /// same [App::stop].
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), LifecycleErrors> {
        self.start().await?;

        let reason = self.wait_for_stop(&cancel).await;
        tracing::info!(?reason, "Shutdown triggered");

        let escalation = match reason {
            StopReason::Signal(Signal::Interrupt) => {
                tracing::warn!("Shutting down gracefully, interrupt again to force exit");
                Some(signals::arm_second_interrupt(
                    self.0.signals.clone(),
                    self.0.exit.clone(),
                ))
            }
            _ => None,
        };

        let result = self.stop().await;
        if let Some(escalation) = escalation {
            escalation.abort();
        }
        result
    }

    /// Stops every started service in reverse startup order
    ///
    /// Only the first call performs the shutdown, every caller receives its outcome.
    pub async fn stop(&self) -> Result<(), LifecycleErrors> {
        self.0.stop_requested.cancel();
        self.0
            .stopped
            .get_or_init(|| self.shutdown())
            .await
            .clone()
    }

    async fn wait_for_stop(&self, cancel: &CancellationToken) -> StopReason {
        let handle_signals = self.0.config.handle_signals;
        tokio::select! {
            _ = cancel.cancelled() => StopReason::Cancelled,
            _ = self.0.stop_requested.cancelled() => StopReason::Requested,
            signal = self.0.signals.shutdown(), if handle_signals => StopReason::Signal(signal),
        }
    }

    async fn shutdown(&self) -> Result<(), LifecycleErrors> {
        let previous = std::mem::replace(&mut *self.lock_state(), AppState::ShuttingDown);

        let Some(plan) = self.0.plan.get() else {
            *self.lock_state() = AppState::Stopped;
            return Ok(());
        };
        let began = Instant::now();
        let watchdog = Watchdog::arm(
            self.0.config.shutdown_timeout,
            self.0.exit.clone(),
            self.0.config.exit_code,
        );

        // A layer still starting finishes first, its services are then stopped too
        let _layers = self.0.layers.lock().await;
        let started: HashSet<String> = std::mem::take(&mut *self.lock_started())
            .into_iter()
            .collect();
        tracing::info!(?previous, services = started.len(), "Shutting down");

        let mut errors = Vec::new();
        for layer in &plan.shutdown {
            // Sequential, so a slow or failing hook is attributed to exactly one service
            for name in layer {
                if !started.contains(name) {
                    continue;
                }
                let Some(hook) = plan.hooks.get(name) else {
                    continue;
                };
                if let Err(error) = self.stop_service(name, hook.clone()).await {
                    errors.push(error);
                }
            }
        }

        drop(watchdog);
        self.0.root.cancel();
        *self.lock_state() = AppState::Stopped;

        if errors.is_empty() {
            tracing::info!(elapsed = ?began.elapsed(), "Shutdown complete");
            Ok(())
        } else {
            tracing::warn!(
                elapsed = ?began.elapsed(),
                failures = errors.len(),
                "Shutdown completed with errors"
            );
            Err(LifecycleErrors { errors })
        }
    }

    async fn start_service(
        &self,
        name: &str,
        hook: Arc<dyn Lifecycle>,
    ) -> Result<(), LifecycleError> {
        let timeout = self.0.config.start_timeout;
        let token = self.0.root.child_token();
        let began = Instant::now();
        let ctx = HookContext::new(name, token.clone(), timeout.map(|limit| began + limit));

        let task = tokio::spawn(async move { hook.on_start(ctx).await });
        let joined = match timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    token.cancel();
                    return Err(deadline_exceeded(name, Hook::Start, limit, began.elapsed()));
                }
            },
            None => task.await,
        };

        match joined {
            Ok(Ok(())) => {
                tracing::debug!(service = name, elapsed = ?began.elapsed(), "Service started");
                Ok(())
            }
            Ok(Err(cause)) => {
                tracing::error!(service = name, error = %cause, "Service failed to start");
                Err(LifecycleError::Start {
                    service: name.to_string(),
                    cause: Arc::new(cause),
                })
            }
            Err(join_error) => {
                tracing::error!(service = name, error = %join_error, "Start hook panicked");
                Err(LifecycleError::Panicked {
                    service: name.to_string(),
                    hook: Hook::Start,
                })
            }
        }
    }

    async fn stop_service(&self, name: &str, hook: Arc<dyn Lifecycle>) -> Result<(), LifecycleError> {
        let timeout = hook.stop_timeout().unwrap_or(self.0.config.stop_timeout);
        let token = CancellationToken::new();
        let began = Instant::now();
        let ctx = HookContext::new(name, token.clone(), Some(began + timeout));

        tracing::debug!(service = name, ?timeout, "Stopping service");
        let task = tokio::spawn(async move { hook.on_stop(ctx).await });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(()))) => {
                tracing::debug!(service = name, elapsed = ?began.elapsed(), "Service stopped");
                Ok(())
            }
            Ok(Ok(Err(cause))) => {
                tracing::error!(service = name, error = %cause, "Service failed to stop");
                Err(LifecycleError::Stop {
                    service: name.to_string(),
                    cause: Arc::new(cause),
                })
            }
            Ok(Err(join_error)) => {
                tracing::error!(service = name, error = %join_error, "Stop hook panicked");
                Err(LifecycleError::Panicked {
                    service: name.to_string(),
                    hook: Hook::Stop,
                })
            }
            // The task is detached, not killed: it keeps running until it notices the token
            Err(_) => {
                token.cancel();
                Err(deadline_exceeded(name, Hook::Stop, timeout, began.elapsed()))
            }
        }
    }

    fn plan(&self) -> Result<&Plan, LifecycleError> {
        self.0.plan.get().ok_or_else(|| LifecycleError::InvalidState {
            state: self.state(),
            operation: "start",
        })
    }

    fn transition(
        &self,
        from: AppState,
        to: AppState,
        operation: &'static str,
    ) -> Result<(), LifecycleError> {
        let mut state = self.lock_state();
        match *state {
            current if current == from => {
                *state = to;
                Ok(())
            }
            AppState::Running if to == AppState::Running => Err(LifecycleError::AlreadyRunning),
            current => Err(LifecycleError::InvalidState {
                state: current,
                operation,
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, AppState> {
        self.0.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_started(&self) -> MutexGuard<'_, Vec<String>> {
        self.0.started.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Blame entry for a hook that did not finish in time
fn deadline_exceeded(name: &str, hook: Hook, timeout: Duration, elapsed: Duration) -> LifecycleError {
    tracing::warn!(
        service = name,
        %hook,
        ?timeout,
        ?elapsed,
        "Hook exceeded its timeout, abandoning it"
    );
    LifecycleError::DeadlineExceeded {
        service: name.to_string(),
        hook,
        timeout,
        elapsed,
    }
}

/// Requests a stop of a running [App]
#[derive(Debug, Clone)]
pub struct StopHandle(CancellationToken);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.cancel();
    }

    pub fn is_requested(&self) -> bool {
        self.0.is_cancelled()
    }
}
