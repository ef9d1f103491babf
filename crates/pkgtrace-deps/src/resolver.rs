//! Dependency resolver
//!
//! Attaches dependency information to entry points and orders them so every
//! entry point comes after the entry points it depends on.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use log::warn;
use pkgtrace_packages::EntryPoint;

use crate::dep_graph::DepGraph;
use crate::dependency_host::{DependencyHost, DependencyInfo};
use crate::module_resolver::is_builtin;

#[derive(Debug, Clone, PartialEq)]
pub struct EntryPointWithDependencies {
    pub entry_point: EntryPoint,
    pub dep_info: DependencyInfo,
}

/// An entry point that cannot be processed, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidEntryPoint {
    pub entry_point: EntryPoint,
    /// Unresolvable specifiers, or the path of an invalid dependency.
    pub missing_dependencies: Vec<String>,
}

/// A dependency on something outside the set being sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct IgnoredDependency {
    pub entry_point: EntryPoint,
    pub dependency_path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortedEntryPoints {
    /// Valid entry points, dependencies first.
    pub entry_points: Vec<EntryPointWithDependencies>,
    pub invalid_entry_points: Vec<InvalidEntryPoint>,
    pub ignored_dependencies: Vec<IgnoredDependency>,
    /// Each dependency cycle, as the paths of its members.
    pub cycles: Vec<Vec<PathBuf>>,
}

impl SortedEntryPoints {
    pub fn find_invalid(&self, path: &Path) -> Option<&InvalidEntryPoint> {
        self.invalid_entry_points
            .iter()
            .find(|invalid| invalid.entry_point.path == path)
    }
}

pub struct DependencyResolver<'a> {
    host: Box<dyn DependencyHost + 'a>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(host: impl DependencyHost + 'a) -> Self {
        Self { host: Box::new(host) }
    }

    pub fn get_entry_point_with_dependencies(&self, entry_point: EntryPoint) -> EntryPointWithDependencies {
        let dep_info = self.host.collect_dependencies(&entry_point);
        if !dep_info.deep_imports.is_empty() {
            let imports: Vec<String> = dep_info
                .deep_imports
                .iter()
                .map(|path| format!("- {}", path.display()))
                .collect();
            warn!(
                "Entry point '{}' contains deep imports into\n{}\nThis is probably not a problem, but may cause the compilation of entry points to be out of order.",
                entry_point.name,
                imports.join("\n")
            );
        }
        EntryPointWithDependencies { entry_point, dep_info }
    }

    /// Sort `entry_points` so dependencies come first.
    pub fn sort_entry_points_by_dependency(&self, entry_points: Vec<EntryPointWithDependencies>) -> SortedEntryPoints {
        let index_of: HashMap<PathBuf, usize> = entry_points
            .iter()
            .enumerate()
            .map(|(i, ep)| (ep.entry_point.path.clone(), i))
            .collect();

        let mut dependants: Vec<Vec<usize>> = vec![Vec::new(); entry_points.len()];
        for (i, ep) in entry_points.iter().enumerate() {
            for dependency in &ep.dep_info.dependencies {
                if let Some(&j) = index_of.get(dependency) {
                    if j != i {
                        dependants[j].push(i);
                    }
                }
            }
        }

        // Entry points with unresolvable imports, then everything that depends on them.
        let mut missing: Vec<Option<Vec<String>>> = entry_points
            .iter()
            .map(|ep| {
                let unresolved: Vec<String> = ep
                    .dep_info
                    .missing
                    .iter()
                    .filter(|specifier| !is_builtin(specifier))
                    .cloned()
                    .collect();
                (!unresolved.is_empty() && !ep.entry_point.ignore_missing_dependencies).then_some(unresolved)
            })
            .collect();
        let mut queue: VecDeque<usize> = (0..entry_points.len()).filter(|&i| missing[i].is_some()).collect();
        while let Some(invalid) = queue.pop_front() {
            for &dependant in &dependants[invalid] {
                if missing[dependant].is_none() {
                    let path = entry_points[invalid].entry_point.path.display().to_string();
                    missing[dependant] = Some(vec![path]);
                    queue.push_back(dependant);
                }
            }
        }

        let mut graph = DepGraph::new();
        for (i, ep) in entry_points.iter().enumerate() {
            if missing[i].is_none() {
                graph.add_node(ep.entry_point.path.clone());
            }
        }

        let mut ignored_dependencies = Vec::new();
        for (i, ep) in entry_points.iter().enumerate() {
            if missing[i].is_some() {
                continue;
            }
            for dependency in &ep.dep_info.dependencies {
                if graph.contains(dependency) {
                    graph.add_dependency(&ep.entry_point.path, dependency);
                } else if !index_of.contains_key(dependency) {
                    ignored_dependencies.push(IgnoredDependency {
                        entry_point: ep.entry_point.clone(),
                        dependency_path: dependency.clone(),
                    });
                }
            }
        }

        let cycles = graph.cycles();
        for cycle in &cycles {
            let members: Vec<String> = cycle.iter().map(|p| p.display().to_string()).collect();
            warn!("Circular dependency between entry points: {}", members.join(" -> "));
        }

        let order = graph.topological_sort();

        let mut invalid_entry_points = Vec::new();
        let mut slots: Vec<Option<EntryPointWithDependencies>> = Vec::with_capacity(entry_points.len());
        for (ep, missing_dependencies) in entry_points.into_iter().zip(missing) {
            match missing_dependencies {
                Some(missing_dependencies) => {
                    invalid_entry_points.push(InvalidEntryPoint {
                        entry_point: ep.entry_point,
                        missing_dependencies,
                    });
                    slots.push(None);
                }
                None => slots.push(Some(ep)),
            }
        }

        let sorted = order
            .iter()
            .filter_map(|path| index_of.get(path).and_then(|&i| slots[i].take()))
            .collect();

        SortedEntryPoints {
            entry_points: sorted,
            invalid_entry_points,
            ignored_dependencies,
            cycles,
        }
    }
}
