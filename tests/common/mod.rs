#![allow(dead_code)]

use std::fs;
use std::io;
use std::path::Path;

/// The fixture kinds the acceptance matrix is built from.
///
/// Each fixture is a directory holding (or, for `Nothing`, not holding) a
/// single entry named `testfile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fixture {
    Mkdir,
    Empty,
    Nothing,
    SymlinkA,
    SymlinkB,
    ContainsFoo,
    ContainsBar,
    Size1,
    Size2,
}

pub const FIXTURE_ENTRY: &str = "testfile";

type Constructor = fn(&Path) -> io::Result<()>;

/// Fixture kind -> directory name -> constructor for the `testfile` entry.
pub const FIXTURES: [(Fixture, &str, Constructor); 9] = [
    (Fixture::Mkdir,       "mkdir",         |p| fs::create_dir(p)),
    (Fixture::Empty,       "empty",         |p| fs::write(p, "")),
    (Fixture::Nothing,     "nothing",       |_| Ok(())),
    (Fixture::SymlinkA,    "symlink-a",     |p| symlink("a", p)),
    (Fixture::SymlinkB,    "symlink-b",     |p| symlink("b", p)),
    (Fixture::ContainsFoo, "contains-foo",  |p| fs::write(p, "foo")),
    (Fixture::ContainsBar, "contains-bar",  |p| fs::write(p, "bar")),
    (Fixture::Size1,       "size-1",        |p| fs::write(p, "x".repeat(1))),
    (Fixture::Size2,       "size-2",        |p| fs::write(p, "x".repeat(2))),
];

impl Fixture {
    pub fn all() -> impl Iterator<Item = Fixture> {
        FIXTURES.iter().map(|(f, _, _)| *f)
    }

    pub fn dir_name(self) -> &'static str {
        Self::lookup(self).1
    }

    /// Create `<parent>/<dir_name>/testfile` for this fixture and return the
    /// fixture directory.
    pub fn build(self, parent: &Path) -> io::Result<std::path::PathBuf> {
        let (_, name, construct) = Self::lookup(self);
        let dir = parent.join(name);
        fs::create_dir(&dir)?;
        construct(&dir.join(FIXTURE_ENTRY))?;
        Ok(dir)
    }

    fn lookup(self) -> (Fixture, &'static str, Constructor) {
        FIXTURES
            .iter()
            .copied()
            .find(|(f, _, _)| *f == self)
            .expect("every fixture has a table entry")
    }
}

#[cfg(unix)]
fn symlink(target: &str, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &str, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Copy a tree without following links, so the copy is entry-for-entry
/// identical to the original.
pub fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    for entry in walkdir::WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry.path().strip_prefix(from).map_err(io::Error::other)?;
        let dest = to.join(rel);
        let ft = entry.file_type();

        if ft.is_dir() {
            fs::create_dir_all(&dest)?;
        } else if ft.is_symlink() {
            let target = fs::read_link(entry.path())?;
            symlink(&target.to_string_lossy(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// Create files from `(relative path, contents)` pairs under `root`.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }
}
