use std::{convert::Infallible, sync::Arc};

use rivet_config::{Config, ConfigProvider};
use rivet_di::{DiError, Registry};

#[derive(Debug)]
struct HttpConfig {
    port: u16,
}

struct Server {
    config: Config<HttpConfig>,
}

fn register_server(registry: &Registry) {
    registry
        .constructor(|(config,): (Config<HttpConfig>,)| Ok::<_, Infallible>(Server { config }))
        .register()
        .unwrap();
}

#[test]
fn config_is_injected_into_constructors() {
    let registry = Registry::new();
    let mut configs = ConfigProvider::new();
    configs.add_config(HttpConfig { port: 8080 }).unwrap();
    configs.register(&registry).unwrap();
    register_server(&registry);
    registry.build().unwrap();

    let server = registry.resolve::<Server>().unwrap();

    assert_eq!(server.config.port, 8080);
    let provider = registry.resolve::<ConfigProvider>().unwrap();
    assert!(Arc::ptr_eq(
        &server.config.inner(),
        &provider.get_config::<HttpConfig>().unwrap()
    ));
}

#[test]
fn missing_config_is_not_found() {
    let registry = Registry::new();
    ConfigProvider::new().register(&registry).unwrap();
    register_server(&registry);

    let err = registry.resolve::<Server>().err().unwrap();

    assert!(err.is_not_found());
    assert!(err.to_string().contains("HttpConfig"), "{err}");
}

#[test]
fn optional_config_resolves_to_none_when_missing() {
    struct Tuning {
        config: Option<Config<HttpConfig>>,
    }

    let registry = Registry::new();
    ConfigProvider::new().register(&registry).unwrap();
    registry
        .constructor(|(config,): (Option<Config<HttpConfig>>,)| {
            Ok::<_, Infallible>(Tuning { config })
        })
        .register()
        .unwrap();

    let tuning = registry.resolve::<Tuning>().unwrap();

    assert!(tuning.config.is_none());
}

#[test]
fn config_injection_requires_a_registered_provider() {
    let registry = Registry::new();
    register_server(&registry);

    let err = registry.build().unwrap_err();

    match &err.errors[..] {
        [DiError::DependencyGraph(graph)] => {
            assert!(graph.to_string().contains("ConfigProvider"), "{graph}")
        }
        other => panic!("unexpected errors: {other:?}"),
    }
}
