//! Path arithmetic shared by the finders
//!
//! These helpers are purely lexical: none of them touch the filesystem.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Lexically normalize `path`, folding `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if normalized.file_name().is_some() {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Resolve `segment` against `base`. An absolute `segment` replaces `base`.
pub fn resolve(base: &Path, segment: impl AsRef<Path>) -> PathBuf {
    normalize(&base.join(segment))
}

/// Relative path leading from `from` to `to`.
pub fn relative(from: &Path, to: &Path) -> PathBuf {
    pathdiff::diff_paths(to, from).unwrap_or_else(|| to.to_path_buf())
}

/// The containing directory of `path`; the root is its own parent.
pub fn dirname(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.to_path_buf())
}

/// Final segment of `path`, or the empty string for the root.
pub fn basename(path: &Path) -> &str {
    path.file_name().and_then(|name| name.to_str()).unwrap_or("")
}

/// `name` without its `.js` suffix, or `None` if it has none.
pub fn strip_js_extension(name: &str) -> Option<&str> {
    name.strip_suffix(".js")
}

pub fn is_root(path: &Path) -> bool {
    path.parent().is_none()
}

/// Split `path` into its named segments, in order.
///
/// Works by repeatedly taking the basename and stepping to the parent, so it
/// behaves the same for relative and absolute paths. Root and `.`/`..`
/// components carry no name and are not returned.
pub fn split_path(path: &Path) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = path;
    while let Some(parent) = current.parent() {
        if let Some(name) = current.file_name() {
            segments.push(name.to_string_lossy().into_owned());
        }
        current = parent;
    }
    segments.reverse();
    segments
}

/// Whether `test` is `base` or lies below it.
///
/// The cheap string prefix check runs first; the relative path is only
/// computed when it passes, which also rejects siblings such as `a/b/c-x`
/// for a base of `a/b/c`.
pub fn is_path_contained_by(base: &Path, test: &Path) -> bool {
    if test == base {
        return true;
    }
    let base_str = base.to_string_lossy();
    let test_str = test.to_string_lossy();
    test_str.starts_with(base_str.as_ref()) && !relative(base, test).starts_with("..")
}

/// Remove every path that is contained by another path in the list.
///
/// For example `['/a/b/c', '/a/b/x', '/a/b', '/d/e', '/d/f']` becomes
/// `['/a/b', '/d/e', '/d/f']`. Note that `/d` is not produced: only paths
/// from the input survive. Surviving paths keep their first-insertion order.
pub fn dedupe_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut trie = PathTrie::new();
    for path in paths {
        trie.add(path);
    }
    trie.flatten()
}

#[derive(Debug, Default)]
struct TrieNode {
    children: Vec<(OsString, usize)>,
    leaf: Option<PathBuf>,
}

/// Segment-indexed trie stored as an arena of nodes.
#[derive(Debug)]
struct PathTrie {
    nodes: Vec<TrieNode>,
}

impl PathTrie {
    fn new() -> Self {
        Self {
            nodes: vec![TrieNode::default()],
        }
    }

    fn child(&mut self, node: usize, segment: &OsString) -> usize {
        if let Some((_, index)) = self.nodes[node]
            .children
            .iter()
            .find(|(name, _)| name == segment)
        {
            return *index;
        }
        let index = self.nodes.len();
        self.nodes.push(TrieNode::default());
        self.nodes[node].children.push((segment.clone(), index));
        index
    }

    fn add(&mut self, path: &Path) {
        let mut node = 0;
        if !is_root(path) {
            for component in path.components() {
                if self.nodes[node].leaf.is_some() {
                    // An ancestor is already present.
                    return;
                }
                let segment = component.as_os_str().to_os_string();
                node = self.child(node, &segment);
            }
        }
        self.nodes[node].leaf = Some(path.to_path_buf());
    }

    fn flatten(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        let mut stack = vec![0];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            match &node.leaf {
                Some(path) => paths.push(path.clone()),
                None => stack.extend(node.children.iter().rev().map(|(_, child)| *child)),
            }
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(list: &[&str]) -> Vec<PathBuf> {
        list.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(resolve(Path::new("/a/b"), "../c"), PathBuf::from("/a/c"));
        assert_eq!(resolve(Path::new("/a/b"), "/x"), PathBuf::from("/x"));
    }

    #[test]
    fn test_relative() {
        assert_eq!(
            relative(Path::new("/a/b"), Path::new("/a/b/c/d")),
            PathBuf::from("c/d")
        );
        assert_eq!(
            relative(Path::new("/a/b/c"), Path::new("/a/b/c-x")),
            PathBuf::from("../c-x")
        );
    }

    #[test]
    fn test_dirname_and_basename() {
        assert_eq!(dirname(Path::new("/a/b")), PathBuf::from("/a"));
        assert_eq!(dirname(Path::new("/")), PathBuf::from("/"));
        assert_eq!(basename(Path::new("/a/node_modules")), "node_modules");
        assert_eq!(basename(Path::new("/")), "");
        assert!(is_root(Path::new("/")));
        assert!(!is_root(Path::new("/a")));
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path(Path::new("a/b/c")), vec!["a", "b", "c"]);
        assert_eq!(split_path(Path::new("/x/node_modules/y")), vec!["x", "node_modules", "y"]);
        assert!(split_path(Path::new("/")).is_empty());
        assert!(split_path(Path::new("")).is_empty());
    }

    #[test]
    fn test_is_path_contained_by() {
        assert!(is_path_contained_by(Path::new("/a/b"), Path::new("/a/b")));
        assert!(is_path_contained_by(Path::new("/a/b"), Path::new("/a/b/c/d")));
        assert!(!is_path_contained_by(Path::new("/a/b/c"), Path::new("/a/b/c-x")));
        assert!(!is_path_contained_by(Path::new("/a/b/c"), Path::new("/a/b")));
        assert!(!is_path_contained_by(Path::new("/x"), Path::new("/a/b")));
    }

    #[test]
    fn test_dedupe_paths() {
        let deduped = dedupe_paths(&paths(&["/a/b/c", "/a/b/x", "/a/b", "/d/e", "/d/f"]));
        assert_eq!(deduped, paths(&["/a/b", "/d/e", "/d/f"]));
    }

    #[test]
    fn test_dedupe_paths_keeps_first_insertion_order() {
        let deduped = dedupe_paths(&paths(&["/proj/node_modules", "/proj/dist/lib", "/proj/node_modules/x"]));
        assert_eq!(deduped, paths(&["/proj/node_modules", "/proj/dist/lib"]));

        let deduped = dedupe_paths(&paths(&["/z/deep/root", "/a"]));
        assert_eq!(deduped, paths(&["/z/deep/root", "/a"]));
    }

    #[test]
    fn test_dedupe_paths_drops_duplicates_and_root_wins() {
        assert_eq!(dedupe_paths(&paths(&["/a", "/a"])), paths(&["/a"]));
        assert_eq!(dedupe_paths(&paths(&["/a/b", "/", "/c"])), paths(&["/"]));
    }

    #[test]
    fn test_dedupe_paths_never_returns_nested_paths() {
        let input = paths(&["/r/a/b", "/r/a", "/r/c", "/r/c/d/e", "/s", "/r/ab"]);
        let deduped = dedupe_paths(&input);

        for (i, left) in deduped.iter().enumerate() {
            for (j, right) in deduped.iter().enumerate() {
                if i != j {
                    assert!(!is_path_contained_by(left, right), "{:?} contains {:?}", left, right);
                }
            }
        }
        for path in &input {
            let kept = deduped.contains(path);
            let covered = deduped.iter().any(|kept| is_path_contained_by(kept, path));
            assert!(kept || covered, "{:?} dropped without an ancestor", path);
        }
    }
}
