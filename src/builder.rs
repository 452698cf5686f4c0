use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::overrides::{Override, OverrideBuilder};

use crate::comparator::CompareOptions;
use crate::engine::{run, CancelToken, EngineOptions};
use crate::error::CheckError;
use crate::report::Report;
use crate::traits::Filter;
use crate::walker::{Roots, TreeWalker};

// ---------------------------------------------------------------------------
// CompareBuilder
// ---------------------------------------------------------------------------

/// Entry point for configuring and executing a comparison.
///
/// Created via [`backup_chk::compare()`](crate::compare). Configure with
/// chained builder methods, then call [`run()`](CompareBuilder::run) for a
/// [`Report`] or [`walk()`](CompareBuilder::walk) for the raw pairs.
///
/// # Example
///
/// ```rust,ignore
/// let report = backup_chk::compare("/home/me", "/mnt/backup/me")
///     .exclude(".cache")
///     .threads(8)
///     .run()?;
/// ```
pub struct CompareBuilder {
    left:     PathBuf,
    right:    PathBuf,
    excludes: Vec<String>,
    filter:   Option<Box<dyn Filter>>,
    threads:  usize,
    compare:  CompareOptions,
    cancel:   CancelToken,
}

impl CompareBuilder {
    pub(crate) fn new(left: impl Into<PathBuf>, right: impl Into<PathBuf>) -> Self {
        Self {
            left:     left.into(),
            right:    right.into(),
            excludes: Vec::new(),
            filter:   None,
            threads:  num_cpus(),
            compare:  CompareOptions::default(),
            cancel:   CancelToken::default(),
        }
    }

    // ── Exclusions ────────────────────────────────────────────────────────

    /// Skip relative paths matching a gitignore-style glob.
    ///
    /// A glob without a `/` matches a name at any depth (`.Trash`); a glob
    /// with one is anchored at the roots (`Library/Logs`). Excluded
    /// directories are not descended into. May be called repeatedly.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    /// Set a custom filter. Combined with any `.exclude()` globs: a path is
    /// skipped if either excludes it.
    pub fn with_filter(mut self, f: impl Filter + 'static) -> Self {
        self.filter = Some(Box::new(f));
        self
    }

    // ── Options ───────────────────────────────────────────────────────────

    /// Number of threads to use. `1` walks sequentially.
    ///
    /// Defaults to the number of logical CPU cores. The report does not
    /// depend on this value.
    pub fn threads(mut self, n: usize) -> Self {
        self.threads = n;
        self
    }

    /// Also report regular files whose permission bits differ.
    pub fn check_permissions(mut self, yes: bool) -> Self {
        self.compare.check_permissions = yes;
        self
    }

    /// Accept entries whose left side was modified after the right side.
    ///
    /// Off by default: it hides real divergence whenever clocks or copies
    /// disagree about modification times.
    pub fn skip_modified_since_backup(mut self, yes: bool) -> Self {
        self.compare.skip_modified_since_backup = yes;
        self
    }

    /// Attach a token that can cancel the run from another thread.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    // ── Execute ───────────────────────────────────────────────────────────

    /// Execute the comparison and return the report.
    ///
    /// Blocks until the walk completes.
    ///
    /// # Errors
    ///
    /// Argument errors (unresolvable root, bad glob, zero threads) are
    /// returned before anything is compared. Any I/O failure during the walk
    /// other than absence aborts the whole run; there is no partial report.
    pub fn run(self) -> Result<Report, CheckError> {
        if self.threads == 0 {
            return Err(CheckError::InvalidThreadCount(0));
        }
        let filter = build_filter(&self.excludes, self.filter)?;
        let roots = Roots::resolve(&self.left, &self.right)?;

        let opts = EngineOptions {
            threads: self.threads,
            filter,
            compare: self.compare,
            cancel:  self.cancel,
        };

        run(&roots, opts)
    }

    /// Resolve the roots and return the sequential pair walker.
    ///
    /// Honours exclusions and the cancel token; ignores `threads`.
    pub fn walk(self) -> Result<TreeWalker, CheckError> {
        let filter = build_filter(&self.excludes, self.filter)?;
        let roots = Roots::resolve(&self.left, &self.right)?;
        Ok(TreeWalker::with_options(roots, filter, self.cancel))
    }
}

fn build_filter(
    excludes: &[String],
    custom: Option<Box<dyn Filter>>,
) -> Result<Option<Arc<dyn Filter>>, CheckError> {
    let globs = if excludes.is_empty() {
        None
    } else {
        Some(ExcludeGlobs::new(excludes)?)
    };

    let filter: Option<Arc<dyn Filter>> = match (globs, custom) {
        (None, None)       => None,
        (Some(g), None)    => Some(Arc::new(g)),
        (None, Some(f))    => Some(Arc::from(f)),
        (Some(g), Some(f)) => {
            let globs: Box<dyn Filter> = Box::new(g);
            Some(Arc::new(AnyOf(vec![globs, f])))
        }
    };
    Ok(filter)
}

// ---------------------------------------------------------------------------
// Built-in filters
// ---------------------------------------------------------------------------

/// Gitignore-style exclusion globs, matched against relative paths.
pub struct ExcludeGlobs {
    overrides: Override,
}

impl ExcludeGlobs {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, CheckError> {
        let mut builder = OverrideBuilder::new(".");
        for pattern in patterns {
            let pattern = pattern.as_ref();
            // Overrides whitelist by default; a leading `!` turns a glob
            // into an exclusion.
            builder
                .add(&format!("!{pattern}"))
                .map_err(|e| CheckError::InvalidPattern(format!("{pattern}: {e}")))?;
        }
        let overrides = builder
            .build()
            .map_err(|e| CheckError::InvalidPattern(e.to_string()))?;
        Ok(Self { overrides })
    }
}

impl Filter for ExcludeGlobs {
    fn is_excluded(&self, rel_path: &Path, is_dir: bool) -> bool {
        self.overrides.matched(rel_path, is_dir).is_ignore()
    }
}

/// Excludes a path when any inner filter does.
struct AnyOf(Vec<Box<dyn Filter>>);

impl Filter for AnyOf {
    fn is_excluded(&self, rel_path: &Path, is_dir: bool) -> bool {
        self.0.iter().any(|f| f.is_excluded(rel_path, is_dir))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Get the logical CPU count, with a safe fallback.
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unanchored_glob_matches_at_any_depth() {
        let globs = ExcludeGlobs::new(&[".Trash"]).unwrap();
        assert!(globs.is_excluded(Path::new(".Trash"), true));
        assert!(globs.is_excluded(Path::new("a/b/.Trash"), true));
        assert!(!globs.is_excluded(Path::new("a/Trash"), true));
    }

    #[test]
    fn anchored_glob_matches_from_the_root() {
        let globs = ExcludeGlobs::new(&["Library/Logs", "*.tmp"]).unwrap();
        assert!(globs.is_excluded(Path::new("Library/Logs"), true));
        assert!(!globs.is_excluded(Path::new("x/Library/Logs"), true));
        assert!(globs.is_excluded(Path::new("deep/file.tmp"), false));
        assert!(!globs.is_excluded(Path::new("Library"), true));
    }

    #[test]
    fn directory_only_glob() {
        let globs = ExcludeGlobs::new(&["cache/"]).unwrap();
        assert!(globs.is_excluded(Path::new("cache"), true));
        assert!(!globs.is_excluded(Path::new("cache"), false));
    }

    #[test]
    fn bad_glob_is_rejected() {
        let err = ExcludeGlobs::new(&["a[b"]).err().unwrap();
        assert!(matches!(err, CheckError::InvalidPattern(_)));
    }

    #[test]
    fn zero_threads_is_rejected_before_walking() {
        let err = CompareBuilder::new("/definitely/not/here", "/nor/here")
            .threads(0)
            .run()
            .unwrap_err();
        assert!(matches!(err, CheckError::InvalidThreadCount(0)));
        assert!(err.is_argument_error());
    }

    #[test]
    fn custom_filter_combines_with_globs() {
        struct NamedX;
        impl Filter for NamedX {
            fn is_excluded(&self, rel_path: &Path, _is_dir: bool) -> bool {
                rel_path == Path::new("x")
            }
        }

        let f = build_filter(&["y".to_string()], Some(Box::new(NamedX))).unwrap().unwrap();
        assert!(f.is_excluded(Path::new("x"), false));
        assert!(f.is_excluded(Path::new("y"), false));
        assert!(!f.is_excluded(Path::new("z"), false));
    }
}
