//! Pairing of two trees by relative path.
//!
//! [`TreeWalker`] is the sequential walk: it pops relative paths off a stack,
//! classifies both sides, and only lists children where both sides are
//! directories. Children are pushed in reverse name order so pairs come out
//! in pre-order, sorted component-wise.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::engine::CancelToken;
use crate::entry::{classify, Entry};
use crate::error::{CheckError, Side};
use crate::traits::Filter;

// ---------------------------------------------------------------------------
// Roots
// ---------------------------------------------------------------------------

/// The two absolute roots of one comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roots {
    left:  PathBuf,
    right: PathBuf,
}

impl Roots {
    /// Resolve both roots to canonical absolute paths.
    ///
    /// A root that cannot be resolved (missing, unreadable parent, dangling
    /// link) is rejected before any entry is compared.
    ///
    /// A root that is itself a symbolic link is dereferenced: the walk starts
    /// at the link's target, not at the link.
    pub fn resolve(left: impl AsRef<Path>, right: impl AsRef<Path>) -> Result<Self, CheckError> {
        Ok(Self {
            left:  resolve_root(left.as_ref())?,
            right: resolve_root(right.as_ref())?,
        })
    }

    pub fn left(&self) -> &Path {
        &self.left
    }

    pub fn right(&self) -> &Path {
        &self.right
    }

    pub fn root(&self, side: Side) -> &Path {
        match side {
            Side::Left  => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Absolute path of `rel_path` under the root on `side`.
    ///
    /// The empty relative path is the root itself. It is never joined, since a
    /// trailing separator would make `lstat` follow a link.
    pub fn path_of(&self, side: Side, rel_path: &Path) -> PathBuf {
        let root = self.root(side);
        if rel_path.as_os_str().is_empty() {
            root.to_path_buf()
        } else {
            root.join(rel_path)
        }
    }

    pub(crate) fn classify(&self, side: Side, rel_path: &Path) -> Result<Entry, CheckError> {
        classify(&self.path_of(side, rel_path)).map_err(|e| CheckError::from_io(side, rel_path, e))
    }

    /// Classify both sides at `rel_path`.
    pub fn pair(&self, rel_path: &Path) -> Result<ComparisonPair, CheckError> {
        Ok(ComparisonPair {
            rel_path: rel_path.to_path_buf(),
            left:     self.classify(Side::Left, rel_path)?,
            right:    self.classify(Side::Right, rel_path)?,
        })
    }

    /// Union of child names under `rel_path` on both sides, sorted.
    ///
    /// Only meaningful when both sides are directories.
    pub(crate) fn children(&self, rel_path: &Path) -> Result<BTreeSet<OsString>, CheckError> {
        let mut names = BTreeSet::new();
        for side in [Side::Left, Side::Right] {
            let dir = self.path_of(side, rel_path);
            let read = fs::read_dir(&dir).map_err(|e| CheckError::from_io(side, rel_path, e))?;
            for entry in read {
                let entry = entry.map_err(|e| CheckError::from_io(side, rel_path, e))?;
                names.insert(entry.file_name());
            }
        }
        Ok(names)
    }
}

fn resolve_root(path: &Path) -> Result<PathBuf, CheckError> {
    if path.as_os_str().is_empty() {
        return Err(CheckError::invalid_root(path, "empty path"));
    }
    fs::canonicalize(path).map_err(|e| CheckError::invalid_root(path, e.to_string()))
}

// ---------------------------------------------------------------------------
// ComparisonPair
// ---------------------------------------------------------------------------

/// Both sides' entries at one relative path.
#[derive(Debug, Clone)]
pub struct ComparisonPair {
    /// Path relative to both roots. Empty for the roots themselves.
    pub rel_path: PathBuf,

    pub left: Entry,

    pub right: Entry,
}

impl ComparisonPair {
    /// Whether the walk descends below this pair.
    pub fn both_dirs(&self) -> bool {
        self.left.is_dir() && self.right.is_dir()
    }

    pub(crate) fn is_excluded_by(&self, filter: Option<&dyn Filter>) -> bool {
        match filter {
            Some(f) if !self.rel_path.as_os_str().is_empty() => {
                f.is_excluded(&self.rel_path, self.left.is_dir() || self.right.is_dir())
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// TreeWalker
// ---------------------------------------------------------------------------

/// Lazy, sequential walk over two trees.
///
/// Yields every [`ComparisonPair`] exactly once, roots first. The first error
/// ends the iteration; nothing after it is yielded.
pub struct TreeWalker {
    roots:  Roots,
    filter: Option<Arc<dyn Filter>>,
    cancel: CancelToken,
    stack:  Vec<PathBuf>,
    done:   bool,
}

impl TreeWalker {
    pub fn new(roots: Roots) -> Self {
        Self {
            roots,
            filter: None,
            cancel: CancelToken::default(),
            stack:  vec![PathBuf::new()],
            done:   false,
        }
    }

    pub(crate) fn with_options(roots: Roots, filter: Option<Arc<dyn Filter>>, cancel: CancelToken) -> Self {
        Self { filter, cancel, ..Self::new(roots) }
    }

    pub fn roots(&self) -> &Roots {
        &self.roots
    }

    fn fail(&mut self, err: CheckError) -> Option<Result<ComparisonPair, CheckError>> {
        self.done = true;
        self.stack.clear();
        Some(Err(err))
    }
}

impl Iterator for TreeWalker {
    type Item = Result<ComparisonPair, CheckError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if self.cancel.is_cancelled() {
                return self.fail(CheckError::Cancelled);
            }

            let Some(rel) = self.stack.pop() else {
                self.done = true;
                return None;
            };

            let pair = match self.roots.pair(&rel) {
                Ok(p)  => p,
                Err(e) => return self.fail(e),
            };

            if pair.is_excluded_by(self.filter.as_deref()) {
                debug!(path = %rel.display(), "excluded");
                continue;
            }

            if pair.both_dirs() {
                match self.roots.children(&rel) {
                    Ok(names) => self.stack.extend(names.into_iter().rev().map(|n| rel.join(n))),
                    Err(e)    => return self.fail(e),
                }
            }

            return Some(Ok(pair));
        }
    }
}

impl FusedIterator for TreeWalker {}

/// Walk `left` and `right` side by side with no exclusions.
pub fn walk(left: impl AsRef<Path>, right: impl AsRef<Path>) -> Result<TreeWalker, CheckError> {
    Ok(TreeWalker::new(Roots::resolve(left, right)?))
}
