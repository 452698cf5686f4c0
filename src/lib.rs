//! # backup_chk
//!
//! Verify that a backup tree matches its source.
//!
//! backup_chk walks two roots side by side, pairs their entries by relative
//! path, and reports every divergence: entries present on one side only,
//! entries of different kinds, symlinks with different targets, and regular
//! files whose sizes or bytes differ. Symbolic links are never followed.
//! Any read failure other than absence aborts the run: a partial report
//! could pass for a clean one.
//!
//! # Quick Start
//!
//! ```rust
//! use std::fs;
//!
//! let left = tempfile::tempdir().unwrap();
//! let right = tempfile::tempdir().unwrap();
//! fs::write(left.path().join("notes.txt"), "foo").unwrap();
//! fs::write(right.path().join("notes.txt"), "bar").unwrap();
//!
//! let report = backup_chk::compare(left.path(), right.path())
//!     .threads(1)
//!     .run()
//!     .unwrap();
//!
//! let lines: Vec<String> = report.lines().collect();
//! assert_eq!(lines, vec!["notes.txt: ContentMismatch: first difference at byte 0"]);
//! ```
//!
//! # Components
//!
//! Each stage is usable on its own:
//!
//! - [`classify`]: what is at one path, without following links
//! - [`differs`] / [`first_difference`]: byte comparison of two files
//! - [`walk`]: the lazy sequence of [`ComparisonPair`]s for two roots
//! - [`compare_pair`]: the rule table applied to one pair
//! - [`Report::from_differences`]: sorting and rendering
//!
//! # Custom Filters
//!
//! Implement [`Filter`] to leave paths out of a comparison:
//!
//! ```rust
//! use backup_chk::Filter;
//! use std::path::Path;
//!
//! struct SkipTrash;
//!
//! impl Filter for SkipTrash {
//!     fn is_excluded(&self, rel_path: &Path, is_dir: bool) -> bool {
//!         is_dir && rel_path.ends_with(".Trash")
//!     }
//! }
//! ```

#![forbid(unsafe_code)]

pub mod logging;

mod builder;
mod comparator;
mod content;
mod engine;
mod entry;
mod error;
mod report;
mod traits;
mod walker;

// ── Public re-exports ─────────────────────────────────────────────────────────

pub use builder::{CompareBuilder, ExcludeGlobs};
pub use comparator::{compare_pair, CompareOptions, Difference, Reason};
pub use content::{differs, first_difference, ContentComparison};
pub use engine::CancelToken;
pub use entry::{classify, Entry, EntryKind, OtherKind};
pub use error::{CheckError, Side};
pub use report::{Report, ScanStats};
pub use traits::Filter;
pub use walker::{walk, ComparisonPair, Roots, TreeWalker};

// ── Entry point ───────────────────────────────────────────────────────────────

/// Create a new [`CompareBuilder`] for `left` (the source) and `right`
/// (the backup).
///
/// # Example
///
/// ```rust
/// let dir = tempfile::tempdir().unwrap();
///
/// let report = backup_chk::compare(dir.path(), dir.path())
///     .exclude("*.tmp")
///     .run()
///     .unwrap();
///
/// assert!(report.is_identical());
/// ```
pub fn compare(left: impl Into<std::path::PathBuf>, right: impl Into<std::path::PathBuf>) -> CompareBuilder {
    CompareBuilder::new(left, right)
}
