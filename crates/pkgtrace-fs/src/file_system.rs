//! The filesystem seam

use std::io;
use std::path::Path;

/// What a path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Symlink,
}

/// Minimal filesystem surface needed by discovery.
///
/// All paths are expected to be absolute. Implementations must return
/// directory listings sorted by name so that walks are reproducible.
pub trait FileSystem {
    /// Whether anything exists at `path` (symlinks are followed).
    fn exists(&self, path: &Path) -> bool;

    /// Kind of the entry at `path`, following symlinks.
    fn stat(&self, path: &Path) -> io::Result<FileKind>;

    /// Kind of the entry at `path` without following a final symlink.
    fn lstat(&self, path: &Path) -> io::Result<FileKind>;

    /// Names of the entries directly inside `path`, sorted.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<String>>;

    /// Read a whole file as UTF-8.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Create or replace a file.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.stat(path), Ok(FileKind::File))
    }

    fn is_directory(&self, path: &Path) -> bool {
        matches!(self.stat(path), Ok(FileKind::Directory))
    }
}
