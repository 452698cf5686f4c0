use std::path::Path;

/// Decides which relative paths are left out of a comparison.
///
/// An excluded path produces no pair on either side and is never descended
/// into. The roots themselves are never offered to a filter.
///
/// # Consistency
///
/// Both engines ask the filter the same question for a given relative path:
/// `is_dir` is `true` when either side holds a directory there. A filter must
/// answer from its arguments alone so sequential and parallel runs agree.
///
/// # Thread Safety
///
/// `Send + Sync` are required: filters are shared across walker threads.
///
/// # Example
///
/// ```rust
/// use backup_chk::Filter;
/// use std::path::Path;
///
/// struct SkipCaches;
///
/// impl Filter for SkipCaches {
///     fn is_excluded(&self, rel_path: &Path, _is_dir: bool) -> bool {
///         rel_path.file_name().map(|n| n == "Cache").unwrap_or(false)
///     }
/// }
/// ```
pub trait Filter: Send + Sync {
    /// Returns `true` if `rel_path` should be skipped.
    fn is_excluded(&self, rel_path: &Path, is_dir: bool) -> bool;
}
