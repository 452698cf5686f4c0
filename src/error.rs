use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Which of the two compared roots an entry or error belongs to.
///
/// `Left` is the reference (the source being backed up), `Right` the backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left  => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CheckError {
    // Arguments
    #[error("invalid root {}: {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: String },

    #[error("invalid exclude pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid thread count: {0}")]
    InvalidThreadCount(usize),

    // Traversal
    #[error("permission denied on {side} side at {}", display_rel(path))]
    PermissionDenied { side: Side, path: PathBuf },

    #[error("IO error on {side} side at {}", display_rel(path))]
    Io {
        side: Side,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    // Runtime
    #[error("comparison cancelled")]
    Cancelled,
}

impl CheckError {
    /// Map an I/O failure at `path` (relative to the root on `side`) to the
    /// matching variant. Absence is not an error and must be handled by the
    /// caller before reaching this point.
    pub(crate) fn from_io(side: Side, path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { side, path: path.to_path_buf() }
        } else {
            Self::Io { side, path: path.to_path_buf(), source }
        }
    }

    pub(crate) fn invalid_root(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidRoot { path: path.into(), reason: reason.into() }
    }

    /// The relative path this error occurred at, if applicable.
    /// For `InvalidRoot` this is the root as given by the caller.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::PermissionDenied { path, .. }
            | Self::Io { path, .. }
            | Self::InvalidRoot { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The side the error occurred on, for traversal errors.
    pub fn side(&self) -> Option<Side> {
        match self {
            Self::PermissionDenied { side, .. } | Self::Io { side, .. } => Some(*side),
            _ => None,
        }
    }

    /// Whether the error was raised before any entry was compared.
    ///
    /// Argument errors are the caller's fault; everything else aborted a walk
    /// already in progress.
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRoot { .. } | Self::InvalidPattern(_) | Self::InvalidThreadCount(_)
        )
    }
}

pub(crate) fn display_rel(path: &Path) -> std::path::Display<'_> {
    if path.as_os_str().is_empty() {
        Path::new(".").display()
    } else {
        path.display()
    }
}
