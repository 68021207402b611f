//! Candidate file enumeration.
//!
//! Walks one or more root directories and yields files whose extension is on
//! the allow-list, skipping excluded directories (dependency caches, build
//! output, VCS metadata). An optional priority list is yielded first; the
//! tree walk never yields those files a second time. Output order is
//! deterministic for an unchanged tree: priority files in the given order,
//! then each root in order with entries sorted by file name.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Extensions processed when the caller does not supply any.
pub const DEFAULT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx"];

/// Directory names skipped at any depth unless default excludes are disabled.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    ".next",
    "coverage",
    "out",
];

/// Bound on directory depth below each root.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Problems encountered while enumerating files. None of them is fatal.
#[derive(Debug, Error)]
pub enum SelectError {
    #[error("root {} does not exist, skipping", .0.display())]
    MissingRoot(PathBuf),
    #[error("priority file {} not found, skipping", .0.display())]
    MissingPriority(PathBuf),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Exclusion predicates applied during the walk.
#[derive(Debug, Clone)]
pub struct Exclusions {
    dir_names: BTreeSet<String>,
    globs: Vec<glob::Pattern>,
    skip_hidden: bool,
}

impl Default for Exclusions {
    fn default() -> Self {
        Self {
            dir_names: DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect(),
            globs: Vec::new(),
            skip_hidden: true,
        }
    }
}

impl Exclusions {
    /// No exclusions at all.
    pub fn none() -> Self {
        Self {
            dir_names: BTreeSet::new(),
            globs: Vec::new(),
            skip_hidden: false,
        }
    }

    pub fn with_dir_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dir_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Adds glob patterns matched against entry names and root-relative paths.
    pub fn with_globs<I, S>(mut self, patterns: I) -> Result<Self, glob::PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            self.globs.push(glob::Pattern::new(pattern.as_ref())?);
        }
        Ok(self)
    }

    /// Whether the entry at `relative` (path below its root) is excluded.
    pub fn is_excluded(&self, relative: &Path, is_dir: bool) -> bool {
        let Some(name) = relative.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if self.skip_hidden && name.starts_with('.') && name.len() > 1 {
            return true;
        }
        if is_dir && self.dir_names.contains(name) {
            return true;
        }
        self.globs
            .iter()
            .any(|g| g.matches(name) || g.matches_path(relative))
    }
}

/// Enumerates files to rewrite.
#[derive(Debug, Clone)]
pub struct FileSelector {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
    exclusions: Exclusions,
    priority: Vec<PathBuf>,
    max_depth: usize,
    follow_links: bool,
}

impl FileSelector {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            exclusions: Exclusions::default(),
            priority: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            follow_links: false,
        }
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_string())
            .collect();
        self
    }

    pub fn with_exclusions(mut self, exclusions: Exclusions) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn with_priority<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.priority = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Follow symlinks during the walk. Loops are detected by walkdir and
    /// reported as walk errors; the depth bound still applies.
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Fails when none of the roots is an existing directory.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.roots.iter().any(|r| r.is_dir()) {
            return Ok(());
        }
        let listed = self
            .roots
            .iter()
            .map(|r| r.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        anyhow::bail!("no root directory exists (checked: {})", listed)
    }

    fn has_allowed_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| allowed == ext))
    }

    /// A fresh pass over the tree. Each call starts from scratch.
    pub fn files(&self) -> Files<'_> {
        Files {
            selector: self,
            priority: self.priority.iter(),
            roots: self.roots.iter(),
            walker: None,
            seen: HashSet::new(),
        }
    }
}

/// Lazy sequence of selected files. See [`FileSelector::files`].
pub struct Files<'a> {
    selector: &'a FileSelector,
    priority: std::slice::Iter<'a, PathBuf>,
    roots: std::slice::Iter<'a, PathBuf>,
    walker: Option<Box<dyn Iterator<Item = walkdir::Result<DirEntry>> + 'a>>,
    seen: HashSet<PathBuf>,
}

impl Files<'_> {
    /// Records `path` and reports whether it was new.
    fn first_visit(&mut self, path: &Path) -> bool {
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.seen.insert(key)
    }
}

/// Walks one root, pruning excluded entries below it.
fn walk<'a>(
    selector: &'a FileSelector,
    root: &Path,
) -> Box<dyn Iterator<Item = walkdir::Result<DirEntry>> + 'a> {
    let exclusions = &selector.exclusions;
    let root_owned = root.to_path_buf();
    Box::new(
        WalkDir::new(root)
            .follow_links(selector.follow_links)
            .max_depth(selector.max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| {
                if e.depth() == 0 {
                    return true;
                }
                let relative = e.path().strip_prefix(&root_owned).unwrap_or(e.path());
                !exclusions.is_excluded(relative, e.file_type().is_dir())
            }),
    )
}

impl<'a> Iterator for Files<'a> {
    type Item = Result<PathBuf, SelectError>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(path) = self.priority.next() {
            if !path.is_file() {
                return Some(Err(SelectError::MissingPriority(path.clone())));
            }
            if self.first_visit(path) {
                return Some(Ok(path.clone()));
            }
        }

        loop {
            if let Some(walker) = self.walker.as_mut() {
                match walker.next() {
                    Some(Ok(entry)) => {
                        if entry.file_type().is_file()
                            && self.selector.has_allowed_extension(entry.path())
                            && self.first_visit(entry.path())
                        {
                            return Some(Ok(entry.into_path()));
                        }
                        continue;
                    }
                    Some(Err(err)) => return Some(Err(SelectError::Walk(err))),
                    None => self.walker = None,
                }
            }

            let root = self.roots.next()?;
            if !root.is_dir() {
                return Some(Err(SelectError::MissingRoot(root.clone())));
            }
            self.walker = Some(walk(self.selector, root));
        }
    }
}
