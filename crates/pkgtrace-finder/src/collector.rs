//! Entry-point collector
//!
//! Walks a directory tree and collects every entry point below it. Package
//! directories are searched for secondary entry points; a package's nested
//! `node_modules` is only entered once something in that package is known
//! to have been processed before.
//!
//! The walk runs on an explicit stack of [`Frame`]s. Frames are pushed so
//! that the output order matches a depth-first, parent-before-children
//! recursion over sorted directory listings.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::debug;
use pkgtrace_deps::{DependencyResolver, EntryPointWithDependencies};
use pkgtrace_fs::{paths, FileKind, FileSystem};
use pkgtrace_packages::{EntryPoint, EntryPointInfo, ProjectConfig, NODE_MODULES, TOOL_DIRECTORY};

use crate::context::RunContext;
use crate::error::FinderError;

enum Frame {
    /// Classify a directory and schedule the work it implies.
    Enter(PathBuf),
    /// Remaining subdirectories of a directory that is not an entry point.
    Scan {
        dir: PathBuf,
        children: Vec<String>,
        next: usize,
    },
    /// Remaining children while searching a package for secondary entry points.
    Secondary {
        package_path: PathBuf,
        dir: PathBuf,
        children: Vec<String>,
        next: usize,
    },
    /// Runs after a package's secondary search; may enter its nested cache.
    NestedCache {
        package_dir: PathBuf,
        first_index: usize,
    },
}

struct Walk<'w> {
    root: &'w Path,
    stack: Vec<Frame>,
    entry_points: Vec<EntryPointWithDependencies>,
    recorded: HashSet<PathBuf>,
}

pub struct EntryPointCollector<'a> {
    fs: &'a dyn FileSystem,
    config: &'a ProjectConfig,
    resolver: &'a DependencyResolver<'a>,
}

impl<'a> EntryPointCollector<'a> {
    pub fn new(fs: &'a dyn FileSystem, config: &'a ProjectConfig, resolver: &'a DependencyResolver<'a>) -> Self {
        Self { fs, config, resolver }
    }

    /// Collect every entry point at or below `source_directory`.
    ///
    /// Fails only when `source_directory` itself cannot be read.
    pub fn walk_directory_for_packages(
        &self,
        ctx: &mut RunContext,
        source_directory: &Path,
    ) -> Result<Vec<EntryPointWithDependencies>, FinderError> {
        let mut walk = Walk {
            root: source_directory,
            stack: vec![Frame::Enter(source_directory.to_path_buf())],
            entry_points: Vec::new(),
            recorded: HashSet::new(),
        };

        while let Some(frame) = walk.stack.pop() {
            match frame {
                Frame::Enter(dir) => self.enter(ctx, &mut walk, dir)?,
                Frame::Scan { dir, children, next } => {
                    let Some(name) = children.get(next).cloned() else {
                        continue;
                    };
                    walk.stack.push(Frame::Scan {
                        dir: dir.clone(),
                        children,
                        next: next + 1,
                    });
                    if is_ignorable_path(&name) {
                        continue;
                    }
                    let child = dir.join(&name);
                    if matches!(self.fs.lstat(&child), Ok(FileKind::Directory)) {
                        walk.stack.push(Frame::Enter(child));
                    }
                }
                Frame::Secondary {
                    package_path,
                    dir,
                    children,
                    next,
                } => {
                    let Some(name) = children.get(next).cloned() else {
                        continue;
                    };
                    walk.stack.push(Frame::Secondary {
                        package_path: package_path.clone(),
                        dir: dir.clone(),
                        children,
                        next: next + 1,
                    });
                    self.visit_secondary_candidate(ctx, &mut walk, package_path, &dir, &name);
                }
                Frame::NestedCache {
                    package_dir,
                    first_index,
                } => {
                    let has_processed = walk.entry_points[first_index..]
                        .iter()
                        .any(|e| e.entry_point.is_processed());
                    let nested = package_dir.join(NODE_MODULES);
                    if has_processed && self.fs.exists(&nested) {
                        walk.stack.push(Frame::Enter(nested));
                    }
                }
            }
        }

        Ok(walk.entry_points)
    }

    fn enter(&self, ctx: &mut RunContext, walk: &mut Walk<'_>, dir: PathBuf) -> Result<(), FinderError> {
        let info = ctx.entry_point_info(self.fs, self.config, &dir, &dir);
        match info {
            EntryPointInfo::Incompatible => {}
            EntryPointInfo::NotAUnit => {
                if let Some(children) = self.read_children(walk, &dir)? {
                    walk.stack.push(Frame::Scan {
                        dir,
                        children,
                        next: 0,
                    });
                }
            }
            EntryPointInfo::Valid(_) | EntryPointInfo::Ignored => {
                let first_index = walk.entry_points.len();
                if let EntryPointInfo::Valid(entry_point) = info {
                    self.record(ctx, walk, entry_point);
                }
                walk.stack.push(Frame::NestedCache {
                    package_dir: dir.clone(),
                    first_index,
                });
                if let Some(children) = self.read_children(walk, &dir)? {
                    walk.stack.push(Frame::Secondary {
                        package_path: dir.clone(),
                        dir,
                        children,
                        next: 0,
                    });
                }
            }
        }
        Ok(())
    }

    fn visit_secondary_candidate(
        &self,
        ctx: &mut RunContext,
        walk: &mut Walk<'_>,
        package_path: PathBuf,
        dir: &Path,
        name: &str,
    ) {
        if is_ignorable_path(name) {
            return;
        }
        let absolute_path = dir.join(name);
        let is_directory = match self.fs.lstat(&absolute_path) {
            Ok(FileKind::Symlink) => return,
            Ok(kind) => kind == FileKind::Directory,
            Err(e) => {
                debug!("Skipping {}: {}", absolute_path.display(), e);
                return;
            }
        };

        let candidate = if is_directory {
            absolute_path.clone()
        } else {
            match paths::strip_js_extension(name) {
                Some(stem) => dir.join(stem),
                None => return,
            }
        };

        let info = ctx.entry_point_info(self.fs, self.config, &package_path, &candidate);
        let can_contain_entry_points = info.can_contain_entry_points();
        if let EntryPointInfo::Valid(entry_point) = info {
            self.record(ctx, walk, entry_point);
        }
        if !is_directory {
            return;
        }

        let child_paths = match self.fs.read_dir(&absolute_path) {
            Ok(children) => children,
            Err(e) => {
                debug!("Could not read {}: {}", absolute_path.display(), e);
                return;
            }
        };
        // A plain directory of bundle files is the inside of a format, not a
        // container of entry points.
        if can_contain_entry_points
            && child_paths.iter().any(|child| {
                child.ends_with(".js") && self.fs.is_file(&absolute_path.join(child))
            })
        {
            return;
        }

        walk.stack.push(Frame::Secondary {
            package_path,
            dir: absolute_path,
            children: child_paths,
            next: 0,
        });
    }

    fn record(&self, ctx: &mut RunContext, walk: &mut Walk<'_>, entry_point: EntryPoint) {
        if walk.recorded.insert(entry_point.path.clone()) {
            let with_deps = ctx.entry_point_with_dependencies(self.resolver, entry_point);
            walk.entry_points.push(with_deps);
        }
    }

    /// List `dir`. Failure is fatal for the walk root and skipped below it.
    fn read_children(&self, walk: &Walk<'_>, dir: &Path) -> Result<Option<Vec<String>>, FinderError> {
        match self.fs.read_dir(dir) {
            Ok(children) => Ok(Some(children)),
            Err(e) if dir == walk.root => Err(FinderError::io(dir, e)),
            Err(e) => {
                debug!("Could not read {}: {}", dir.display(), e);
                Ok(None)
            }
        }
    }
}

fn is_ignorable_path(name: &str) -> bool {
    name.starts_with('.') || name == NODE_MODULES || name == TOOL_DIRECTORY
}
