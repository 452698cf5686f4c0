//! Byte-level comparison of two regular files.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::engine::CancelToken;
use crate::error::{CheckError, Side};

const CHUNK_SIZE: usize = 64 * 1024;

/// Outcome of a content comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentComparison {
    /// Offset of the first differing byte, or `None` if the files are equal.
    pub first_difference: Option<u64>,

    /// Bytes read from the left file.
    pub bytes_read: u64,
}

/// Returns `true` unless both files have the same length and the same bytes.
pub fn differs(left: &Path, right: &Path) -> io::Result<bool> {
    Ok(first_difference(left, right)?.first_difference.is_some())
}

/// Stream both files chunk by chunk and stop at the first mismatch.
///
/// Lengths are compared first from metadata. A file that grows or shrinks
/// while being read shows up as a mismatch at the offset where the two
/// streams stop agreeing.
pub fn first_difference(left: &Path, right: &Path) -> io::Result<ContentComparison> {
    compare_paths(left, right, None).map_err(|stop| match stop {
        Stop::Io(_, e) => e,
        Stop::Cancelled => io::Error::other("comparison cancelled"),
    })
}

/// Same as [`first_difference`], with failures attributed to a side and to
/// `rel_path`. `cancel` is checked before every chunk.
pub(crate) fn compare_files(
    left: &Path,
    right: &Path,
    rel_path: &Path,
    cancel: &CancelToken,
) -> Result<ContentComparison, CheckError> {
    compare_paths(left, right, Some(cancel)).map_err(|stop| match stop {
        Stop::Io(side, e) => CheckError::from_io(side, rel_path, e),
        Stop::Cancelled => CheckError::Cancelled,
    })
}

/// Why a comparison ended without a result.
enum Stop {
    Io(Side, io::Error),
    Cancelled,
}

fn on(side: Side) -> impl Fn(io::Error) -> Stop {
    move |e| Stop::Io(side, e)
}

fn compare_paths(
    left: &Path,
    right: &Path,
    cancel: Option<&CancelToken>,
) -> Result<ContentComparison, Stop> {
    let mut lf = File::open(left).map_err(on(Side::Left))?;
    let mut rf = File::open(right).map_err(on(Side::Right))?;

    let ll = lf.metadata().map_err(on(Side::Left))?.len();
    let rl = rf.metadata().map_err(on(Side::Right))?.len();
    if ll != rl {
        return Ok(ContentComparison {
            first_difference: Some(ll.min(rl)),
            bytes_read: 0,
        });
    }

    let mut lbuf = vec![0u8; CHUNK_SIZE];
    let mut rbuf = vec![0u8; CHUNK_SIZE];
    let mut offset = 0u64;

    loop {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(Stop::Cancelled);
        }

        let ln = read_chunk(&mut lf, &mut lbuf).map_err(on(Side::Left))?;
        let rn = read_chunk(&mut rf, &mut rbuf).map_err(on(Side::Right))?;

        let common = ln.min(rn);
        if let Some(i) = lbuf[..common].iter().zip(&rbuf[..common]).position(|(a, b)| a != b) {
            return Ok(ContentComparison {
                first_difference: Some(offset + i as u64),
                bytes_read: offset + ln as u64,
            });
        }
        if ln != rn {
            return Ok(ContentComparison {
                first_difference: Some(offset + common as u64),
                bytes_read: offset + ln as u64,
            });
        }

        offset += ln as u64;
        if ln == 0 {
            return Ok(ContentComparison { first_difference: None, bytes_read: offset });
        }
    }
}

/// Fill `buf` as far as the reader allows. Short only at end of file.
fn read_chunk(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn pair(left: &[u8], right: &[u8]) -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let l = dir.path().join("l");
        let r = dir.path().join("r");
        fs::write(&l, left).unwrap();
        fs::write(&r, right).unwrap();
        (dir, l, r)
    }

    #[test]
    fn same_length_different_bytes() {
        let (_dir, l, r) = pair(b"foo", b"bar");
        assert!(differs(&l, &r).unwrap());
        assert_eq!(first_difference(&l, &r).unwrap().first_difference, Some(0));
    }

    #[test]
    fn identical_files() {
        let (_dir, l, r) = pair(b"same bytes", b"same bytes");
        let cmp = first_difference(&l, &r).unwrap();
        assert_eq!(cmp.first_difference, None);
        assert_eq!(cmp.bytes_read, 10);
    }

    #[test]
    fn empty_files_are_equal() {
        let (_dir, l, r) = pair(b"", b"");
        assert!(!differs(&l, &r).unwrap());
    }

    #[test]
    fn length_mismatch_without_reading() {
        let (_dir, l, r) = pair(b"x", b"xx");
        let cmp = first_difference(&l, &r).unwrap();
        assert_eq!(cmp.first_difference, Some(1));
        assert_eq!(cmp.bytes_read, 0);
    }

    #[test]
    fn mismatch_past_the_first_chunk() {
        let mut left = vec![7u8; CHUNK_SIZE * 2 + 10];
        let right = left.clone();
        left[CHUNK_SIZE + 3] = 8;
        let (_dir, l, r) = pair(&left, &right);

        let cmp = first_difference(&l, &r).unwrap();
        assert_eq!(cmp.first_difference, Some(CHUNK_SIZE as u64 + 3));
    }

    #[test]
    fn missing_file_is_an_error() {
        let (dir, l, _r) = pair(b"a", b"a");
        assert!(differs(&l, &dir.path().join("gone")).is_err());
    }

    #[test]
    fn failures_are_attributed_to_their_side() {
        let (dir, _l, r) = pair(b"a", b"a");
        let err = compare_files(&dir.path().join("gone"), &r, Path::new("sub/f"), &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.side(), Some(Side::Left));
        assert_eq!(err.path(), Some(Path::new("sub/f")));
    }

    #[test]
    fn cancellation_stops_between_chunks() {
        let data = vec![1u8; CHUNK_SIZE * 3];
        let (_dir, l, r) = pair(&data, &data);
        let token = CancelToken::new();
        token.cancel();

        let err = compare_files(&l, &r, Path::new("big"), &token).unwrap_err();
        assert!(matches!(err, CheckError::Cancelled));
    }
}
