//! Dependency graph between entry points
//!
//! Edges point from a dependent to its dependency. Ordering uses Tarjan's
//! strongly connected components, which come out dependencies first, so a
//! cycle collapses into one component instead of failing the sort.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

/// Dependency graph keyed by entry-point path
#[derive(Debug, Default)]
pub struct DepGraph {
    graph: DiGraph<PathBuf, ()>,
    nodes: HashMap<PathBuf, NodeIndex>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; adding the same path twice is a no-op.
    pub fn add_node(&mut self, path: PathBuf) {
        if !self.nodes.contains_key(&path) {
            let index = self.graph.add_node(path.clone());
            self.nodes.insert(path, index);
        }
    }

    /// Record that `dependent` depends on `dependency`. Both must be nodes.
    pub fn add_dependency(&mut self, dependent: &Path, dependency: &Path) {
        if dependent == dependency {
            return;
        }
        if let (Some(&from), Some(&to)) = (self.nodes.get(dependent), self.nodes.get(dependency)) {
            self.graph.update_edge(from, to, ());
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    /// Strongly connected components, dependencies first.
    ///
    /// Members of one component keep the order their nodes were added in.
    pub fn components(&self) -> Vec<Vec<PathBuf>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .map(|mut component| {
                component.sort();
                component
                    .into_iter()
                    .map(|index| self.graph[index].clone())
                    .collect()
            })
            .collect()
    }

    /// Every node, each placed after the nodes its outgoing edges reach.
    pub fn topological_sort(&self) -> Vec<PathBuf> {
        self.components().into_iter().flatten().collect()
    }

    /// Every component of more than one node.
    pub fn cycles(&self) -> Vec<Vec<PathBuf>> {
        self.components()
            .into_iter()
            .filter(|component| component.len() > 1)
            .collect()
    }
}
