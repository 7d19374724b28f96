use std::collections::{BTreeMap, BTreeSet, HashSet};

use thiserror::Error;

use crate::types::DependencyInfo;

/// Adjacency map of the application: service name -> names it depends on
///
/// Filled from two sources: dependencies declared by constructor registrations,
/// and edges recorded while resolving (parent -> child).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    map: BTreeMap<String, BTreeSet<String>>,
}
impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: &str) {
        if !self.map.contains_key(name) {
            self.map.insert(name.to_string(), BTreeSet::new());
        }
    }

    /// Records that `from` depends on `to`
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.add_node(to);
        match self.map.get_mut(from) {
            Some(dependencies) => {
                dependencies.insert(to.to_string());
            }
            None => {
                self.map
                    .insert(from.to_string(), BTreeSet::from([to.to_string()]));
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn dependencies_of(&self, name: &str) -> impl Iterator<Item = &str> {
        self.map
            .get(name)
            .into_iter()
            .flat_map(|deps| deps.iter().map(String::as_str))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map
            .iter()
            .flat_map(|(from, deps)| deps.iter().map(move |to| (from.as_str(), to.as_str())))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn merge(&mut self, other: &DependencyGraph) {
        for (from, deps) in &other.map {
            self.add_node(from);
            for to in deps {
                self.add_edge(from, to);
            }
        }
    }
}

/// Validate dependencies declared up front by registrations
///
/// Returns a list of all issues: required dependencies which are not registered,
/// and cycles through non-lazy dependencies.
pub(crate) fn check_declared(
    declared: &BTreeMap<String, Vec<DependencyInfo>>,
) -> Result<(), DependencyGraphErrors> {
    let mut checked = HashSet::new();
    let mut errors = Vec::new();
    for name in declared.keys() {
        let mut dependency_chain = Vec::new();
        check_recurse(
            declared,
            &mut checked,
            &mut errors,
            &mut dependency_chain,
            name,
        );
    }

    if !errors.is_empty() {
        return Err(DependencyGraphErrors { errors });
    }

    return Ok(());

    fn check_recurse<'a>(
        declared: &'a BTreeMap<String, Vec<DependencyInfo>>,
        checked: &mut HashSet<&'a str>,
        errors: &mut Vec<DependencyGraphError>,
        dependency_chain: &mut Vec<&'a str>,
        name: &'a str,
    ) {
        // Circular Dependency Check
        if let Some(start) = dependency_chain.iter().position(|entry| *entry == name) {
            let mut chain: Vec<String> = dependency_chain[start..]
                .iter()
                .map(|entry| entry.to_string())
                .collect();
            chain.push(name.to_string());

            errors.push(DependencyGraphError::CircularDependency {
                from: dependency_chain[start].to_string(),
                to: dependency_chain
                    .last()
                    .map(|entry| entry.to_string())
                    .unwrap_or_default(),
                chain,
            });
            return;
        }

        // Skip other checks if already checked
        if !checked.insert(name) {
            return;
        };

        let Some(dependencies) = declared.get(name) else {
            return;
        };

        dependency_chain.push(name);

        for dependency in dependencies {
            if !declared.contains_key(&dependency.name) {
                if !dependency.optional {
                    errors.push(DependencyGraphError::MissingDependency {
                        dependency: dependency.name.clone(),
                        required_by: name.to_string(),
                    });
                }

                continue;
            }

            if dependency.lazy {
                // Don't recurse, lazy dependencies never take part in construction order
                continue;
            }

            check_recurse(
                declared,
                checked,
                errors,
                dependency_chain,
                dependency.name.as_str(),
            );
        }

        dependency_chain.pop();
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DependencyGraphError {
    #[error("'{required_by}' needs '{dependency}' but it is missing")]
    MissingDependency {
        dependency: String,
        required_by: String,
    },
    #[error("A Circular Dependency exists between '{from}' and '{to}' through {} - Consider using `Lazy`", chain.join(" → "))]
    CircularDependency {
        from: String,
        to: String,
        chain: Vec<String>,
    },
}
impl std::fmt::Display for DependencyGraphErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("The dependency graph had one or more errors:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}

#[derive(Error, Debug, Clone)]
pub struct DependencyGraphErrors {
    pub errors: Vec<DependencyGraphError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DependencyInfo;

    fn declared(entries: &[(&str, Vec<DependencyInfo>)]) -> BTreeMap<String, Vec<DependencyInfo>> {
        entries
            .iter()
            .map(|(name, deps)| (name.to_string(), deps.clone()))
            .collect()
    }

    #[test]
    fn edges_are_recorded_with_both_endpoints_as_nodes() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("b", "a");
        graph.add_edge("c", "b");

        assert_eq!(graph.nodes().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(graph.dependencies_of("c").collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(graph.dependencies_of("a").count(), 0);
        assert_eq!(graph.edges().count(), 2);
    }

    #[test]
    fn missing_required_dependency_is_reported() {
        let graph = declared(&[("b", vec![DependencyInfo::named::<u8>("a")])]);

        let errors = check_declared(&graph).unwrap_err().errors;
        assert_eq!(
            errors,
            vec![DependencyGraphError::MissingDependency {
                dependency: "a".into(),
                required_by: "b".into(),
            }]
        );
    }

    #[test]
    fn missing_optional_dependency_is_fine() {
        let mut dependency = DependencyInfo::named::<u8>("a");
        dependency.optional = true;
        let graph = declared(&[("b", vec![dependency])]);

        assert!(check_declared(&graph).is_ok());
    }

    #[test]
    fn declared_cycle_is_reported_with_chain() {
        let graph = declared(&[
            ("a", vec![DependencyInfo::named::<u8>("b")]),
            ("b", vec![DependencyInfo::named::<u8>("a")]),
        ]);

        let errors = check_declared(&graph).unwrap_err().errors;
        assert_eq!(errors.len(), 1);
        let message = errors[0].to_string();
        assert!(message.contains("a → b → a"), "{message}");
    }

    #[test]
    fn lazy_edges_do_not_form_cycles() {
        let mut lazy = DependencyInfo::named::<u8>("a");
        lazy.lazy = true;
        let graph = declared(&[
            ("a", vec![DependencyInfo::named::<u8>("b")]),
            ("b", vec![lazy]),
        ]);

        assert!(check_declared(&graph).is_ok());
    }
}
