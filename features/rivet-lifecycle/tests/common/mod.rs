#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rivet_di::{DiError, DiHandle};
use rivet_lifecycle::{
    async_trait, App, AppBuilder, DynError, ExitStrategy, HookContext, Lifecycle, Registry, Signal,
    SignalSource,
};
use tokio::sync::mpsc;

/// Shared log of hook invocations, in call order
#[derive(Clone, Default)]
pub struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    pub fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == event).count()
    }
}

/// Exit strategy that only records the requested codes
#[derive(Clone, Default)]
pub struct RecordingExit(Arc<Mutex<Vec<i32>>>);

impl RecordingExit {
    pub fn codes(&self) -> Vec<i32> {
        self.0.lock().unwrap().clone()
    }
}

impl ExitStrategy for RecordingExit {
    fn exit(&self, code: i32) {
        self.0.lock().unwrap().push(code);
    }
}

/// Signal source fed by hand through the returned sender
pub struct ChannelSignals(tokio::sync::Mutex<mpsc::UnboundedReceiver<Signal>>);

impl ChannelSignals {
    pub fn new() -> (mpsc::UnboundedSender<Signal>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, ChannelSignals(tokio::sync::Mutex::new(receiver)))
    }
}

#[async_trait]
impl SignalSource for ChannelSignals {
    async fn shutdown(&self) -> Signal {
        match self.0.lock().await.recv().await {
            Some(signal) => signal,
            None => std::future::pending().await,
        }
    }

    async fn interrupt(&self) {
        let mut receiver = self.0.lock().await;
        loop {
            match receiver.recv().await {
                Some(Signal::Interrupt) => return,
                Some(Signal::Terminate) => continue,
                None => std::future::pending::<()>().await,
            }
        }
    }
}

#[derive(Clone, Copy, Default)]
pub struct Behaviour {
    pub start_delay: Duration,
    pub stop_delay: Duration,
    pub stop_timeout: Option<Duration>,
    pub fail_start: bool,
    pub fail_stop: bool,
    pub panic_on_stop: bool,
}

pub struct Tracked {
    name: &'static str,
    events: Events,
    behaviour: Behaviour,
}

impl Tracked {
    pub fn new(name: &'static str, events: &Events, behaviour: Behaviour) -> Self {
        Tracked {
            name,
            events: events.clone(),
            behaviour,
        }
    }
}

#[async_trait]
impl Lifecycle for Tracked {
    async fn on_start(&self, _ctx: HookContext) -> Result<(), DynError> {
        tokio::time::sleep(self.behaviour.start_delay).await;
        if self.behaviour.fail_start {
            return Err(format!("{} refused to start", self.name).into());
        }
        self.events.push(format!("start:{}", self.name));
        Ok(())
    }

    async fn on_stop(&self, ctx: HookContext) -> Result<(), DynError> {
        assert_eq!(ctx.service(), self.name);
        tokio::time::sleep(self.behaviour.stop_delay).await;
        self.events.push(format!("stop:{}", self.name));
        if self.behaviour.panic_on_stop {
            panic!("{} panicked while stopping", self.name);
        }
        if self.behaviour.fail_stop {
            return Err(format!("{} refused to stop", self.name).into());
        }
        Ok(())
    }

    fn stop_timeout(&self) -> Option<Duration> {
        self.behaviour.stop_timeout
    }
}

/// Registers a `Tracked` service named `name` that resolves `deps` in its provider
pub fn tracked(
    registry: &Registry,
    events: &Events,
    name: &'static str,
    deps: &'static [&'static str],
    behaviour: Behaviour,
) {
    let events = events.clone();
    registry
        .singleton(move |di: &mut DiHandle| {
            for dep in deps {
                di.resolve_named::<Tracked>(dep)?;
            }
            Ok::<_, DiError>(Tracked::new(name, &events, behaviour))
        })
        .named(name)
        .with_lifecycle()
        .register()
        .unwrap();
}

pub fn app(registry: Registry, exit: &RecordingExit) -> AppBuilder {
    App::builder(registry)
        .handle_signals(false)
        .exit_strategy(exit.clone())
}

pub fn layers(expected: &[&[&str]]) -> Vec<Vec<String>> {
    expected
        .iter()
        .map(|layer| layer.iter().map(|name| name.to_string()).collect())
        .collect()
}
