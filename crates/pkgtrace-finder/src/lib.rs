//! Entry-point discovery
//!
//! Two finders share one collection pipeline: the directory walker scans
//! every search root, while the targeted finder traces outward from a single
//! entry point and visits only what it depends on.

pub mod collector;
pub mod context;
pub mod directory_walker;
pub mod error;
pub mod manifest;
pub mod search_roots;
pub mod targeted;
pub mod tracing;

pub use collector::EntryPointCollector;
pub use context::RunContext;
pub use directory_walker::DirectoryWalkerFinder;
pub use error::FinderError;
pub use manifest::{EntryPointManifest, InvalidatingManifest, Manifest, MANIFEST_FILE};
pub use search_roots::get_base_paths;
pub use targeted::TargetedEntryPointFinder;
pub use tracing::{trace, TracingStrategy};
