use std::{
    convert::Infallible,
    sync::{mpsc, Arc},
    thread,
    time::Duration,
};

use rivet_di::{DiError, DiHandle, Lazy, Named, Registry, ServiceName};

#[derive(Debug)]
struct Settings {
    url: String,
}

#[derive(Debug)]
struct Metrics;

struct Database {
    settings: Arc<Settings>,
    metrics: Option<Arc<Metrics>>,
}

fn register_database(registry: &Registry) {
    registry
        .constructor(
            |(settings, metrics): (Arc<Settings>, Option<Arc<Metrics>>)| {
                Ok::<_, Infallible>(Database { settings, metrics })
            },
        )
        .register()
        .unwrap();
}

#[test]
fn constructor_receives_its_dependencies() {
    let registry = Registry::new();
    registry
        .instance(Settings {
            url: "postgres://localhost".into(),
        })
        .register()
        .unwrap();
    registry.instance(Metrics).register().unwrap();
    register_database(&registry);

    let database = registry.resolve::<Database>().unwrap();

    assert_eq!(database.settings.url, "postgres://localhost");
    assert!(database.metrics.is_some());
}

#[test]
fn missing_optional_dependency_resolves_to_none() {
    let registry = Registry::new();
    registry
        .instance(Settings { url: "x".into() })
        .register()
        .unwrap();
    register_database(&registry);

    let database = registry.resolve::<Database>().unwrap();

    assert!(database.metrics.is_none());
}

#[test]
fn missing_required_dependency_fails_with_not_found() {
    let registry = Registry::new();
    registry.instance(Metrics).register().unwrap();
    register_database(&registry);

    let err = registry.resolve::<Database>().err().unwrap();

    assert!(err.is_not_found(), "{err:?}");
    assert!(
        err.to_string().contains(std::any::type_name::<Settings>()),
        "{err}"
    );
}

#[test]
fn optional_dependency_that_closes_a_cycle_is_none() {
    struct A {
        b: Option<Arc<B>>,
    }
    struct B;

    let registry = Registry::new();
    registry
        .constructor(|(b,): (Option<Arc<B>>,)| Ok::<_, Infallible>(A { b }))
        .register()
        .unwrap();
    registry
        .constructor(|(_a,): (Arc<A>,)| Ok::<_, Infallible>(B))
        .register()
        .unwrap();

    let a = registry.resolve::<A>().ok().unwrap();

    assert!(a.b.is_none());
}

#[test]
fn optional_dependency_whose_provider_fails_is_none() {
    let registry = Registry::new();
    registry
        .instance(Settings { url: "x".into() })
        .register()
        .unwrap();
    registry
        .singleton(|_: &mut DiHandle| Err::<Metrics, _>("metrics backend down"))
        .register()
        .unwrap();
    register_database(&registry);

    let database = registry.resolve::<Database>().ok().unwrap();

    assert!(database.metrics.is_none());
    // The failure is not cached, the optional target is retried on its own
    let err = registry.resolve::<Metrics>().unwrap_err();
    assert!(err.to_string().contains("metrics backend down"), "{err}");
}

#[test]
fn optional_dependency_missing_its_own_dependency_is_none() {
    struct Exporter;
    struct Tracer {
        exporter: Option<Arc<Exporter>>,
    }

    let registry = Registry::new();
    registry
        .constructor(|(_settings,): (Arc<Settings>,)| Ok::<_, Infallible>(Exporter))
        .register()
        .unwrap();
    registry
        .constructor(|(exporter,): (Option<Arc<Exporter>>,)| {
            Ok::<_, Infallible>(Tracer { exporter })
        })
        .register()
        .unwrap();

    let tracer = registry.resolve::<Tracer>().ok().unwrap();

    assert!(tracer.exporter.is_none());
    // A required dependency on the same service still fails
    assert!(registry.resolve::<Exporter>().err().unwrap().is_not_found());
}

struct Primary;
impl ServiceName for Primary {
    const NAME: &'static str = "settings.primary";
}

#[test]
fn named_dependency_uses_the_explicit_name() {
    struct Client {
        settings: Named<Settings, Primary>,
    }

    let registry = Registry::new();
    registry
        .instance(Settings {
            url: "primary".into(),
        })
        .named(Primary::NAME)
        .register()
        .unwrap();
    registry
        .instance(Settings {
            url: "default".into(),
        })
        .register()
        .unwrap();
    registry
        .constructor(|(settings,): (Named<Settings, Primary>,)| {
            Ok::<_, Infallible>(Client { settings })
        })
        .register()
        .unwrap();

    let client = registry.resolve::<Client>().unwrap();

    assert_eq!(client.settings.url, "primary");
}

struct Parent {
    child: Arc<Child>,
}
struct Child {
    parent: Lazy<Parent>,
}

#[test]
fn lazy_dependency_breaks_a_cycle() {
    let registry = Registry::new();
    registry
        .constructor(|(child,): (Arc<Child>,)| Ok::<_, Infallible>(Parent { child }))
        .register()
        .unwrap();
    registry
        .constructor(|(parent,): (Lazy<Parent>,)| Ok::<_, Infallible>(Child { parent }))
        .register()
        .unwrap();
    registry.build().unwrap();

    let parent = registry.resolve::<Parent>().unwrap();
    let back = parent.child.parent.get().unwrap();

    assert!(Arc::ptr_eq(&parent, &back));
    // Lazy edges take no part in ordering
    let graph = registry.dependency_graph();
    assert_eq!(
        graph.dependencies_of(std::any::type_name::<Child>()).count(),
        0
    );
}

struct Session {
    _store: Arc<Store>,
}
struct Store {
    _session: Arc<Session>,
}

#[test]
fn lazy_get_inside_the_constructor_it_points_back_to_is_a_cycle() {
    let registry = Registry::new();
    registry
        .constructor(|(store,): (Lazy<Store>,)| {
            Ok::<_, DiError>(Session {
                _store: store.get()?,
            })
        })
        .register()
        .unwrap();
    registry
        .constructor(|(session,): (Arc<Session>,)| Ok::<_, Infallible>(Store { _session: session }))
        .register()
        .unwrap();

    // Run on a helper thread so a regression shows up as a failure instead of a hung test
    let (tx, rx) = mpsc::channel();
    let resolving = registry.clone();
    thread::spawn(move || {
        let _ = tx.send(resolving.resolve::<Session>().err());
    });
    let err = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("resolution did not finish")
        .expect("resolution unexpectedly succeeded");

    assert!(err.is_cycle(), "{err}");
    let session = std::any::type_name::<Session>();
    match err.root() {
        DiError::Cycle { chain } => {
            assert_eq!(chain.first().map(String::as_str), Some(session));
            assert_eq!(chain.last().map(String::as_str), Some(session));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // The failed attempt left nothing behind, the thread can resolve again
    assert!(registry.resolve::<Session>().err().unwrap().is_cycle());
}

#[test]
fn lazy_dependency_on_a_missing_service_fails_immediately() {
    struct Holder;

    let registry = Registry::new();
    registry
        .constructor(|(_missing,): (Lazy<Settings>,)| Ok::<_, Infallible>(Holder))
        .register()
        .unwrap();

    let err = registry.resolve::<Holder>().err().unwrap();
    assert!(err.is_not_found());
}

#[test]
fn constructor_dependencies_are_part_of_the_graph_before_resolution() {
    let registry = Registry::new();
    registry
        .instance(Settings { url: "x".into() })
        .register()
        .unwrap();
    register_database(&registry);

    let graph = registry.dependency_graph();
    let deps: Vec<&str> = graph
        .dependencies_of(std::any::type_name::<Database>())
        .collect();

    // The optional Metrics is not registered, so it is no edge
    assert_eq!(deps, vec![std::any::type_name::<Settings>()]);
}

#[test]
fn constructor_error_is_reported_as_provider_failure() {
    struct Broken;

    let registry = Registry::new();
    registry
        .constructor(|(): ()| Err::<Broken, _>("cannot connect"))
        .register()
        .unwrap();

    let err = registry.resolve::<Broken>().err().unwrap();

    match err.root() {
        DiError::ProviderFailed { name, cause } => {
            assert_eq!(name, std::any::type_name::<Broken>());
            assert_eq!(cause.to_string(), "cannot connect");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
