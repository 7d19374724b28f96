//! Layered startup and shutdown order computed from the dependency graph.
//!
//! A layer holds services whose dependencies all live in earlier layers,
//! so every member of a layer may be started (or stopped) concurrently.

use std::collections::{BTreeMap, BTreeSet};

use rivet_di::DependencyGraph;

use crate::errors::LifecycleError;

/// Layers in dependency-first order
pub type Layers = Vec<Vec<String>>;

/// Computes the startup layers of `services`
///
/// Nodes are `services` plus every node of `graph`. Layers are built with Kahn's
/// algorithm, each layer sorted by name. Afterwards only services for which
/// `has_hooks` holds are kept and empty layers are dropped.
///
/// Fails with `CircularDependency` if some nodes can never be placed.
pub fn compute_startup_order(
    graph: &DependencyGraph,
    services: &BTreeSet<String>,
    has_hooks: impl Fn(&str) -> bool,
) -> Result<Layers, LifecycleError> {
    let mut nodes: BTreeSet<&str> = services.iter().map(String::as_str).collect();
    nodes.extend(graph.nodes());

    // dependency -> dependents, and how many dependencies each node still waits on
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut pending: BTreeMap<&str, usize> = BTreeMap::new();
    for &node in &nodes {
        let dependencies: BTreeSet<&str> = graph.dependencies_of(node).collect();
        pending.insert(node, dependencies.len());
        for dependency in dependencies {
            dependents.entry(dependency).or_default().push(node);
        }
    }

    let mut layers: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(&node, _)| node)
        .collect();

    let mut emitted = 0;
    while !current.is_empty() {
        let mut next = BTreeSet::new();
        for node in &current {
            for dependent in dependents.get(node).into_iter().flatten() {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        next.insert(*dependent);
                    }
                }
            }
        }

        emitted += current.len();
        layers.push(current);
        current = next.into_iter().collect();
    }

    if emitted < nodes.len() {
        let remaining = pending
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(node, _)| node.to_string())
            .collect();
        return Err(LifecycleError::CircularDependency { remaining });
    }

    Ok(layers
        .into_iter()
        .map(|layer| {
            layer
                .into_iter()
                .filter(|node| has_hooks(node))
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|layer| !layer.is_empty())
        .collect())
}

/// Shutdown order: startup layers reversed, dependents stop before their dependencies
pub fn compute_shutdown_order(startup: &[Vec<String>]) -> Layers {
    startup.iter().rev().cloned().collect()
}
