//! Filesystem access for pkgtrace
//!
//! Every discovery pass reaches the disk through the [`FileSystem`] trait so
//! the same traversal code runs against the real filesystem
//! ([`OsFileSystem`]) or an in-memory tree ([`MemoryFileSystem`]).
//! Path arithmetic lives in [`paths`] as free functions.

pub mod file_system;
pub mod memory;
pub mod os;
pub mod paths;

pub use file_system::{FileKind, FileSystem};
pub use memory::MemoryFileSystem;
pub use os::OsFileSystem;
