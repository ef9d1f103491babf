//! Dependency discovery and ordering for entry points

pub mod dep_graph;
pub mod dependency_host;
pub mod import_scanner;
pub mod module_resolver;
pub mod resolver;

pub use dep_graph::DepGraph;
pub use dependency_host::{DependencyHost, DependencyInfo, EsmDependencyHost};
pub use import_scanner::ImportScanner;
pub use module_resolver::{ModuleResolver, ResolvedModule};
pub use resolver::{
    DependencyResolver, EntryPointWithDependencies, IgnoredDependency, InvalidEntryPoint, SortedEntryPoints,
};
