use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::content::compare_files;
use crate::engine::CancelToken;
use crate::entry::{Entry, EntryKind, OtherKind};
use crate::error::{display_rel, CheckError};
use crate::walker::ComparisonPair;

/// Why two entries at the same relative path disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reason {
    KindMismatch,
    ContentMismatch,
    SizeMismatch,
    SymlinkTargetMismatch,
    OnlyOnLeft,
    OnlyOnRight,
    /// Permission bits differ. Only reported with `check_permissions`.
    ModeMismatch,
}

impl Reason {
    /// Stable tag used in rendered output.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::KindMismatch          => "KindMismatch",
            Self::ContentMismatch       => "ContentMismatch",
            Self::SizeMismatch          => "SizeMismatch",
            Self::SymlinkTargetMismatch => "SymlinkTargetMismatch",
            Self::OnlyOnLeft            => "OnlyOnLeft",
            Self::OnlyOnRight           => "OnlyOnRight",
            Self::ModeMismatch          => "ModeMismatch",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One reported divergence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Difference {
    /// Relative path, empty for the roots.
    pub rel_path: PathBuf,
    pub reason:   Reason,
    pub detail:   Option<String>,
}

impl Difference {
    fn new(rel_path: &Path, reason: Reason, detail: impl Into<String>) -> Self {
        Self {
            rel_path: rel_path.to_path_buf(),
            reason,
            detail: Some(detail.into()),
        }
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", display_rel(&self.rel_path), self.reason)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

/// Opt-in checks layered on top of the base rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompareOptions {
    /// Report regular files whose permission bits differ.
    pub check_permissions: bool,

    /// Accept any pair whose left entry was modified after its right entry.
    /// Such entries changed after the backup was taken and can't be expected
    /// to match.
    pub skip_modified_since_backup: bool,
}

/// Counters fed by the comparator, summed into the run statistics.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Tally {
    pub files_compared: usize,
    pub bytes_compared: u64,
}

/// Compare one pair with the default options.
///
/// Returns at most one difference. Only I/O failures while reading file
/// contents produce an `Err`.
pub fn compare_pair(pair: &ComparisonPair) -> Result<Option<Difference>, CheckError> {
    compare_with(pair, &CompareOptions::default(), &CancelToken::new(), &mut Tally::default())
}

/// Apply the rule table to `pair`. Content reads stop at the next chunk once
/// `cancel` fires.
pub(crate) fn compare_with(
    pair: &ComparisonPair,
    opts: &CompareOptions,
    cancel: &CancelToken,
    tally: &mut Tally,
) -> Result<Option<Difference>, CheckError> {
    let (left, right, rel) = (&pair.left, &pair.right, pair.rel_path.as_path());

    match (left.kind, right.kind) {
        (EntryKind::Missing, EntryKind::Missing) => return Ok(None),
        (_, EntryKind::Missing) => {
            return Ok(Some(Difference::new(rel, Reason::OnlyOnLeft, left.kind.describe())));
        }
        (EntryKind::Missing, _) => {
            return Ok(Some(Difference::new(rel, Reason::OnlyOnRight, right.kind.describe())));
        }
        _ => {}
    }

    if opts.skip_modified_since_backup && modified_since_backup(left, right) {
        return Ok(None);
    }

    if left.kind != right.kind {
        return Ok(Some(kind_mismatch(rel, left.kind, right.kind)));
    }

    match left.kind {
        // Missing can't reach here; directories are judged by their children.
        EntryKind::Dir | EntryKind::Missing => Ok(None),
        EntryKind::Symlink => Ok(symlink_mismatch(rel, left, right)),
        EntryKind::File => compare_files_at(pair, opts, cancel, tally),
        EntryKind::Other(OtherKind::Unknown) => {
            Ok(Some(Difference::new(rel, Reason::KindMismatch, "unsupported entry type")))
        }
        // Equal known special files (same fifo/socket/device kind and number).
        EntryKind::Other(_) => Ok(None),
    }
}

fn modified_since_backup(left: &Entry, right: &Entry) -> bool {
    match (left.modified(), right.modified()) {
        (Some(l), Some(r)) => l > r,
        _ => false,
    }
}

fn kind_mismatch(rel: &Path, left: EntryKind, right: EntryKind) -> Difference {
    let detail = match (left, right) {
        (EntryKind::Other(OtherKind::BlockDevice(a)), EntryKind::Other(OtherKind::BlockDevice(b)))
        | (EntryKind::Other(OtherKind::CharDevice(a)), EntryKind::Other(OtherKind::CharDevice(b))) => {
            format!("device number {a} != {b}")
        }
        _ => format!("{} != {}", left.describe(), right.describe()),
    };
    Difference::new(rel, Reason::KindMismatch, detail)
}

fn symlink_mismatch(rel: &Path, left: &Entry, right: &Entry) -> Option<Difference> {
    // Raw bytes: `Path` equality would treat `dir/` and `dir` as the same.
    fn raw(e: &Entry) -> Option<&OsStr> {
        e.link_target.as_deref().map(Path::as_os_str)
    }
    if raw(left) == raw(right) {
        return None;
    }
    let show = |e: &Entry| {
        e.link_target
            .as_deref()
            .map(|t| t.display().to_string())
            .unwrap_or_default()
    };
    Some(Difference::new(
        rel,
        Reason::SymlinkTargetMismatch,
        format!("{} != {}", show(left), show(right)),
    ))
}

fn compare_files_at(
    pair: &ComparisonPair,
    opts: &CompareOptions,
    cancel: &CancelToken,
    tally: &mut Tally,
) -> Result<Option<Difference>, CheckError> {
    let (left, right, rel) = (&pair.left, &pair.right, pair.rel_path.as_path());

    if opts.check_permissions {
        if let (Some(l), Some(r)) = (mode_of(left), mode_of(right)) {
            if l != r {
                return Ok(Some(Difference::new(
                    rel,
                    Reason::ModeMismatch,
                    format!("{l:o} != {r:o}"),
                )));
            }
        }
    }

    let (ls, rs) = (left.size.unwrap_or(0), right.size.unwrap_or(0));
    if ls != rs {
        return Ok(Some(Difference::new(
            rel,
            Reason::SizeMismatch,
            format!("{ls} != {rs} bytes"),
        )));
    }

    let cmp = compare_files(&left.path, &right.path, rel, cancel)?;
    tally.files_compared += 1;
    tally.bytes_compared += cmp.bytes_read;

    Ok(cmp.first_difference.map(|offset| {
        Difference::new(
            rel,
            Reason::ContentMismatch,
            format!("first difference at byte {offset}"),
        )
    }))
}

#[cfg(unix)]
fn mode_of(entry: &Entry) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    entry.metadata.as_ref().map(|m| m.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn mode_of(entry: &Entry) -> Option<u32> {
    entry.metadata.as_ref().map(|m| u32::from(m.permissions().readonly()))
}
