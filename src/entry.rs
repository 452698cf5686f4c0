use std::fs::{self, FileType, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// What one side holds at a given relative path.
///
/// Produced by [`classify`]. Symbolic links are never dereferenced: a link to
/// a directory is a [`EntryKind::Symlink`], not a [`EntryKind::Dir`].
///
/// `size` is only set for regular files and `link_target` only for symlinks.
/// `metadata` is kept for every present entry so opt-in checks (permissions,
/// modification times) don't need a second `lstat`.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Absolute path that was inspected.
    pub path: PathBuf,

    /// What kind of entry this is.
    pub kind: EntryKind,

    /// Byte length, regular files only.
    pub size: Option<u64>,

    /// Raw link target, symlinks only.
    pub link_target: Option<PathBuf>,

    /// `lstat` result; `None` when the entry is missing.
    pub metadata: Option<Metadata>,
}

/// The kind of a classified entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Nothing exists at this path.
    Missing,

    /// A directory.
    Dir,

    /// A regular file.
    File,

    /// A symbolic link.
    Symlink,

    /// Anything else (device files, pipes, sockets, etc.).
    Other(OtherKind),
}

/// Sub-classification of [`EntryKind::Other`].
///
/// Two `Other` entries only count as equal when both carry the same known
/// kind (and, for devices, the same device number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OtherKind {
    Fifo,
    Socket,
    BlockDevice(u64),
    CharDevice(u64),
    Unknown,
}

impl EntryKind {
    /// Short human-readable name, used in difference details.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Missing                          => "nothing",
            Self::Dir                              => "directory",
            Self::File                             => "regular file",
            Self::Symlink                          => "symlink",
            Self::Other(OtherKind::Fifo)           => "fifo",
            Self::Other(OtherKind::Socket)         => "socket",
            Self::Other(OtherKind::BlockDevice(_)) => "block device",
            Self::Other(OtherKind::CharDevice(_))  => "character device",
            Self::Other(OtherKind::Unknown)        => "unknown entry",
        }
    }
}

impl Entry {
    fn missing(path: PathBuf) -> Self {
        Self {
            path,
            kind: EntryKind::Missing,
            size: None,
            link_target: None,
            metadata: None,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.kind == EntryKind::Missing
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    /// Modification time, if the entry exists and the platform reports one.
    pub fn modified(&self) -> Option<SystemTime> {
        self.metadata.as_ref().and_then(|m| m.modified().ok())
    }
}

/// Inspect `path` without following symbolic links.
///
/// A path that does not exist yields [`EntryKind::Missing`]. Every other
/// failure (permission denied, I/O errors, reading a link target) is returned
/// as `Err` so the caller can abort: an unreadable entry must never pass as
/// absent.
pub fn classify(path: &Path) -> io::Result<Entry> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(Entry::missing(path.to_path_buf()));
        }
        Err(e) => return Err(e),
    };

    let ft = metadata.file_type();
    let kind = kind_of(&ft, &metadata);

    let size = match kind {
        EntryKind::File => Some(metadata.len()),
        _               => None,
    };

    let link_target = match kind {
        EntryKind::Symlink => Some(fs::read_link(path)?),
        _                  => None,
    };

    Ok(Entry {
        path: path.to_path_buf(),
        kind,
        size,
        link_target,
        metadata: Some(metadata),
    })
}

fn kind_of(ft: &FileType, metadata: &Metadata) -> EntryKind {
    if ft.is_symlink() {
        EntryKind::Symlink
    } else if ft.is_dir() {
        EntryKind::Dir
    } else if ft.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other(other_kind(ft, metadata))
    }
}

#[cfg(unix)]
fn other_kind(ft: &FileType, metadata: &Metadata) -> OtherKind {
    use std::os::unix::fs::{FileTypeExt, MetadataExt};

    if ft.is_fifo() {
        OtherKind::Fifo
    } else if ft.is_socket() {
        OtherKind::Socket
    } else if ft.is_block_device() {
        OtherKind::BlockDevice(metadata.rdev())
    } else if ft.is_char_device() {
        OtherKind::CharDevice(metadata.rdev())
    } else {
        OtherKind::Unknown
    }
}

#[cfg(not(unix))]
fn other_kind(_ft: &FileType, _metadata: &Metadata) -> OtherKind {
    OtherKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_path_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let entry = classify(&dir.path().join("nope")).unwrap();
        assert_eq!(entry.kind, EntryKind::Missing);
        assert!(entry.metadata.is_none());
    }

    #[test]
    fn regular_file_carries_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, "xx").unwrap();

        let entry = classify(&path).unwrap();
        assert_eq!(entry.kind, EntryKind::File);
        assert_eq!(entry.size, Some(2));
        assert!(entry.link_target.is_none());
    }

    #[test]
    fn directory_has_no_size() {
        let dir = tempfile::tempdir().unwrap();
        let entry = classify(dir.path()).unwrap();
        assert_eq!(entry.kind, EntryKind::Dir);
        assert_eq!(entry.size, None);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_is_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("target")).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink("target", &link).unwrap();

        let entry = classify(&link).unwrap();
        assert_eq!(entry.kind, EntryKind::Symlink);
        assert_eq!(entry.link_target.as_deref(), Some(Path::new("target")));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_present() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("dangling");
        std::os::unix::fs::symlink("does-not-exist", &link).unwrap();

        let entry = classify(&link).unwrap();
        assert_eq!(entry.kind, EntryKind::Symlink);
    }

    #[cfg(unix)]
    #[test]
    fn socket_is_other() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sock");
        let _listener = std::os::unix::net::UnixListener::bind(&path).unwrap();

        let entry = classify(&path).unwrap();
        assert_eq!(entry.kind, EntryKind::Other(OtherKind::Socket));
        assert_eq!(entry.kind.describe(), "socket");
        assert_eq!(entry.size, None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn character_device_carries_its_number() {
        let entry = classify(Path::new("/dev/null")).unwrap();
        assert!(matches!(entry.kind, EntryKind::Other(OtherKind::CharDevice(_))));
        assert_ne!(entry.kind, classify(Path::new("/dev/zero")).unwrap().kind);
    }

    #[cfg(unix)]
    #[test]
    fn child_of_a_file_is_an_error_not_missing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, "x").unwrap();

        // ENOTDIR is an I/O failure, not absence.
        assert!(classify(&file.join("child")).is_err());
    }
}
