//! Dependency graph between stacks
//!
//! The graph maps each stack name to the set of names that must reach a
//! terminal state before it may run. For creation that set is the stack's
//! requirements; for destruction the relation is inverted, so a stack waits
//! for everything that depends on it.

use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::types::Stack;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Read-only view of which stacks must finish before which
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure `name` is a node, leaving any existing edges alone
    pub fn add_node(&mut self, name: &str) {
        self.edges.entry(name.to_string()).or_default();
    }

    /// Record that `before` must finish before `name` runs
    pub fn add_edge(&mut self, name: &str, before: &str) {
        self.edges
            .entry(name.to_string())
            .or_default()
            .insert(before.to_string());
    }

    /// Names that must finish before `name`, if it is a node
    pub fn get(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    /// Node names in lexical order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Total order in which every name comes after everything it waits on
    ///
    /// Uses Kahn's algorithm with a lexically sorted ready set, so ties
    /// between independent stacks always break the same way. Names that only
    /// appear inside an edge set are ordered as nodes too.
    pub fn execution_order(&self) -> Result<Vec<String>> {
        topological_order(&self.edges)
    }
}

/// Order the nodes of `edges`, where `edges[k]` must all come before `k`
pub(crate) fn topological_order(edges: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>> {
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut unblocks: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (name, before) in edges {
        *in_degree.entry(name.as_str()).or_default() += before.len();
        for dep in before {
            in_degree.entry(dep.as_str()).or_default();
            unblocks.entry(dep.as_str()).or_default().push(name.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(&name, _)| name)
        .collect();

    let mut order = Vec::with_capacity(in_degree.len());
    while let Some(current) = ready.pop_first() {
        order.push(current.to_string());

        for &next in unblocks.get(current).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(next);
                }
            }
        }
    }

    if order.len() != in_degree.len() {
        let stacks = in_degree
            .keys()
            .filter(|name| !order.iter().any(|o| o == *name))
            .map(|name| name.to_string())
            .collect();
        return Err(Error::CyclicDependency { stacks });
    }

    Ok(order)
}

/// Build the destroy-direction graph from provider-reported requirements
///
/// If stack A requires B, then B waits for A: B must not be destroyed while
/// A still exists. Every local stack becomes a node even when it has no
/// remote counterpart; requirements naming stacks that are not known
/// locally get a node on demand.
pub fn destroy_dependencies(stacks: &[Arc<Stack>], provider: &dyn Provider) -> Result<DependencyGraph> {
    let mut graph = DependencyGraph::new();

    for stack in stacks {
        graph.add_node(&stack.name);

        let Some(remote) = provider.get_stack(&stack.fqn).map_err(Error::Provider)? else {
            continue;
        };

        for requirement in provider.required_stacks(&remote).map_err(Error::Provider)? {
            graph.add_edge(&requirement, &stack.name);
        }
    }

    Ok(graph)
}

/// Build the creation-direction graph from locally declared requirements
pub fn build_dependencies(stacks: &[Arc<Stack>]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for stack in stacks {
        graph.add_node(&stack.name);
        for requirement in &stack.requires {
            graph.add_edge(&stack.name, requirement);
        }
    }
    graph
}
