mod common;

use std::time::Duration;

use common::{app, tracked, Behaviour, ChannelSignals, Events, RecordingExit};
use rivet_lifecycle::{App, AppState, Registry, Signal, INTERRUPT_EXIT_CODE};
use tokio_util::sync::CancellationToken;

async fn wait_until_running(app: &App) {
    for _ in 0..200 {
        if app.state() == AppState::Running {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("application never reached Running, state is {:?}", app.state());
}

fn slow_stopping(registry: &Registry, events: &Events) {
    tracked(
        registry,
        events,
        "slow",
        &[],
        Behaviour {
            stop_delay: Duration::from_millis(500),
            stop_timeout: Some(Duration::from_secs(5)),
            ..Behaviour::default()
        },
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn interrupt_stops_the_application() {
    let registry = Registry::new();
    let events = Events::default();
    tracked(&registry, &events, "a", &[], Behaviour::default());
    let exit = RecordingExit::default();
    let (signals, source) = ChannelSignals::new();
    let app = app(registry, &exit)
        .handle_signals(true)
        .signal_source(source)
        .build();

    let running = tokio::spawn({
        let app = app.clone();
        async move { app.run(CancellationToken::new()).await }
    });
    wait_until_running(&app).await;
    signals.send(Signal::Interrupt).unwrap();

    running.await.unwrap().unwrap();
    assert_eq!(app.state(), AppState::Stopped);
    assert_eq!(events.snapshot(), vec!["start:a", "stop:a"]);
    assert!(exit.codes().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn second_interrupt_during_shutdown_forces_exit() {
    let registry = Registry::new();
    let events = Events::default();
    slow_stopping(&registry, &events);
    let exit = RecordingExit::default();
    let (signals, source) = ChannelSignals::new();
    let app = app(registry, &exit)
        .handle_signals(true)
        .signal_source(source)
        .build();

    let running = tokio::spawn({
        let app = app.clone();
        async move { app.run(CancellationToken::new()).await }
    });
    wait_until_running(&app).await;
    signals.send(Signal::Interrupt).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    signals.send(Signal::Interrupt).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(exit.codes(), vec![INTERRUPT_EXIT_CODE]);

    // The recorded exit does not end the process, the shutdown carries on
    running.await.unwrap().unwrap();
    assert_eq!(events.snapshot(), vec!["start:slow", "stop:slow"]);
    assert_eq!(exit.codes(), vec![INTERRUPT_EXIT_CODE]);
}

#[tokio::test(flavor = "multi_thread")]
async fn terminate_does_not_arm_the_forced_exit() {
    let registry = Registry::new();
    let events = Events::default();
    slow_stopping(&registry, &events);
    let exit = RecordingExit::default();
    let (signals, source) = ChannelSignals::new();
    let app = app(registry, &exit)
        .handle_signals(true)
        .signal_source(source)
        .build();

    let running = tokio::spawn({
        let app = app.clone();
        async move { app.run(CancellationToken::new()).await }
    });
    wait_until_running(&app).await;
    signals.send(Signal::Terminate).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    signals.send(Signal::Interrupt).unwrap();

    running.await.unwrap().unwrap();
    assert_eq!(events.snapshot(), vec!["start:slow", "stop:slow"]);
    assert!(exit.codes().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn signals_are_ignored_unless_handled() {
    let registry = Registry::new();
    let events = Events::default();
    tracked(&registry, &events, "a", &[], Behaviour::default());
    let (signals, source) = ChannelSignals::new();
    let app = app(registry, &RecordingExit::default())
        .signal_source(source)
        .build();
    let cancel = CancellationToken::new();

    let running = tokio::spawn({
        let app = app.clone();
        let cancel = cancel.clone();
        async move { app.run(cancel).await }
    });
    wait_until_running(&app).await;
    signals.send(Signal::Interrupt).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(app.state(), AppState::Running);
    cancel.cancel();
    running.await.unwrap().unwrap();
}
