//! Dependency tracing
//!
//! Discovers entry points by following dependency edges outward from a set
//! of starting paths instead of walking the whole tree.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use pkgtrace_deps::{DependencyResolver, EntryPointWithDependencies, SortedEntryPoints};

use crate::context::RunContext;

/// Supplies the starting points of a trace and resolves each visited path.
pub trait TracingStrategy {
    fn initial_paths(&self) -> Vec<PathBuf>;

    /// Resolve `path` to an entry point with its dependencies, or `None` if
    /// it is not a valid entry point.
    fn resolve_one(&self, ctx: &mut RunContext, path: &Path) -> Option<EntryPointWithDependencies>;
}

/// Resolve paths breadth-first until no unvisited dependency remains, then sort.
pub fn trace(
    strategy: &impl TracingStrategy,
    ctx: &mut RunContext,
    resolver: &DependencyResolver<'_>,
) -> SortedEntryPoints {
    let mut unsorted = Vec::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut pending: VecDeque<PathBuf> = strategy.initial_paths().into();

    while let Some(path) = pending.pop_front() {
        if !visited.insert(path.clone()) {
            continue;
        }
        let Some(entry_point) = strategy.resolve_one(ctx, &path) else {
            continue;
        };
        pending.extend(
            entry_point
                .dep_info
                .dependencies
                .iter()
                .filter(|dependency| !visited.contains(*dependency))
                .cloned(),
        );
        unsorted.push(entry_point);
    }

    resolver.sort_entry_points_by_dependency(unsorted)
}
