use std::io::{self, Write};
use std::time::Duration;

use crate::comparator::Difference;

/// The output of a completed comparison.
///
/// `differences` is sorted by relative path (component-wise), so two runs
/// over the same trees render identically regardless of engine or thread
/// count. An empty list means the trees are identical.
#[derive(Debug, Clone)]
pub struct Report {
    /// Every divergence found, sorted by relative path.
    pub differences: Vec<Difference>,

    /// Scan statistics. Never part of the rendered output.
    pub stats: ScanStats,
}

/// Statistics for a completed comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanStats {
    /// Number of relative paths compared (roots included).
    pub pairs: usize,

    /// Regular files whose contents were read.
    pub files_compared: usize,

    /// Bytes read from the left side during content comparison.
    pub bytes_compared: u64,

    /// Wall-clock time from start to completion.
    pub duration: Duration,

    /// Pairs compared per second, clamped to 0 on zero-duration runs.
    pub pairs_per_sec: usize,
}

impl ScanStats {
    /// Compute `pairs_per_sec` from raw counts and duration.
    pub(crate) fn compute(pairs: usize, files_compared: usize, bytes_compared: u64, duration: Duration) -> Self {
        let pps = if duration.as_secs_f64() > 0.0 {
            (pairs as f64 / duration.as_secs_f64()) as usize
        } else {
            0
        };
        Self {
            pairs,
            files_compared,
            bytes_compared,
            duration,
            pairs_per_sec: pps,
        }
    }
}

impl Report {
    /// Sort `differences` into report order.
    pub fn from_differences(mut differences: Vec<Difference>, stats: ScanStats) -> Self {
        differences.sort_by(|a, b| a.rel_path.cmp(&b.rel_path).then(a.reason.cmp(&b.reason)));
        Self { differences, stats }
    }

    pub fn is_identical(&self) -> bool {
        self.differences.is_empty()
    }

    /// One line per difference, in report order.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.differences.iter().map(|d| d.to_string())
    }

    /// Write every line to `out`, each prefixed with `prefix`.
    pub fn render(&self, out: &mut impl Write, prefix: &str) -> io::Result<()> {
        for line in self.lines() {
            writeln!(out, "{prefix}{line}")?;
        }
        Ok(())
    }
}
