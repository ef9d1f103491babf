//! In-memory filesystem
//!
//! Used by tests across the workspace to build package trees without touching
//! the disk. Symlinks are stored as absolute targets and resolved on access.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::file_system::{FileKind, FileSystem};
use crate::paths;

/// Upper bound on symlink hops before a lookup is treated as a loop.
const MAX_SYMLINK_HOPS: usize = 40;

#[derive(Debug, Clone)]
enum Node {
    File(String),
    Directory,
    Symlink(PathBuf),
}

#[derive(Debug)]
pub struct MemoryFileSystem {
    nodes: RefCell<BTreeMap<PathBuf, Node>>,
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

impl MemoryFileSystem {
    /// Create a filesystem holding only the root directory.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::from("/"), Node::Directory);
        Self {
            nodes: RefCell::new(nodes),
        }
    }

    /// Add a file, creating any missing parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>, contents: &str) {
        let path = paths::normalize(path.as_ref());
        self.ensure_parents(&path);
        self.nodes
            .borrow_mut()
            .insert(path, Node::File(contents.to_string()));
    }

    /// Add a directory (and its parents).
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = paths::normalize(path.as_ref());
        self.ensure_parents(&path);
        self.nodes.borrow_mut().insert(path, Node::Directory);
    }

    /// Add a symlink at `path` pointing at the absolute `target`.
    pub fn add_symlink(&self, path: impl AsRef<Path>, target: impl AsRef<Path>) {
        let path = paths::normalize(path.as_ref());
        self.ensure_parents(&path);
        self.nodes
            .borrow_mut()
            .insert(path, Node::Symlink(paths::normalize(target.as_ref())));
    }

    fn ensure_parents(&self, path: &Path) {
        let mut nodes = self.nodes.borrow_mut();
        let mut current = path.parent();
        while let Some(dir) = current {
            nodes.entry(dir.to_path_buf()).or_insert(Node::Directory);
            current = dir.parent();
        }
    }

    /// Resolve every symlink along `path`, including a final one when
    /// `follow_last` is set.
    fn canonical(&self, path: &Path, follow_last: bool) -> io::Result<PathBuf> {
        let nodes = self.nodes.borrow();
        let mut hops = 0;
        let mut resolved = PathBuf::new();
        let normalized = paths::normalize(path);
        let components: Vec<Component<'_>> = normalized.components().collect();

        for (index, component) in components.iter().enumerate() {
            resolved.push(component.as_os_str());
            let is_last = index + 1 == components.len();
            while let Some(Node::Symlink(target)) = nodes.get(&resolved) {
                if is_last && !follow_last {
                    break;
                }
                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        format!("too many levels of symbolic links: {}", path.display()),
                    ));
                }
                resolved = target.clone();
            }
        }
        Ok(resolved)
    }

    fn node(&self, path: &Path, follow_last: bool) -> io::Result<Node> {
        let resolved = self.canonical(path, follow_last)?;
        self.nodes
            .borrow()
            .get(&resolved)
            .cloned()
            .ok_or_else(|| not_found(path))
    }
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.node(path, true).is_ok()
    }

    fn stat(&self, path: &Path) -> io::Result<FileKind> {
        match self.node(path, true)? {
            Node::File(_) => Ok(FileKind::File),
            Node::Directory => Ok(FileKind::Directory),
            Node::Symlink(_) => Err(not_found(path)),
        }
    }

    fn lstat(&self, path: &Path) -> io::Result<FileKind> {
        match self.node(path, false)? {
            Node::File(_) => Ok(FileKind::File),
            Node::Directory => Ok(FileKind::Directory),
            Node::Symlink(_) => Ok(FileKind::Symlink),
        }
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let dir = self.canonical(path, true)?;
        let nodes = self.nodes.borrow();
        match nodes.get(&dir) {
            Some(Node::Directory) => {}
            Some(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("not a directory: {}", path.display()),
                ))
            }
            None => return Err(not_found(path)),
        }

        let mut names: Vec<String> = nodes
            .keys()
            .filter(|candidate| candidate.parent() == Some(dir.as_path()))
            .filter_map(|candidate| candidate.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        match self.node(path, true)? {
            Node::File(contents) => Ok(contents),
            _ => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("not a file: {}", path.display()),
            )),
        }
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        self.add_file(path, contents);
        Ok(())
    }
}
