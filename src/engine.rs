use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use ignore::{DirEntry, WalkBuilder, WalkState};
use tracing::{debug, info};

use crate::comparator::{compare_with, CompareOptions, Difference, Tally};
use crate::error::{CheckError, Side};
use crate::report::{Report, ScanStats};
use crate::traits::Filter;
use crate::walker::{Roots, TreeWalker};

// ---------------------------------------------------------------------------
// CancelToken
// ---------------------------------------------------------------------------

/// Cooperative cancellation for a running comparison.
///
/// Clone it, hand one copy to the builder, and call [`cancel`](Self::cancel)
/// from anywhere. Both engines check it before every pair; a cancelled run
/// returns [`CheckError::Cancelled`] and no report.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Engine options
// ---------------------------------------------------------------------------

/// Internal options passed from the builder to `run()`.
pub(crate) struct EngineOptions {
    pub threads: usize,
    pub filter:  Option<Arc<dyn Filter>>,
    pub compare: CompareOptions,
    pub cancel:  CancelToken,
}

// ---------------------------------------------------------------------------
// run()
// ---------------------------------------------------------------------------

/// Compare the two roots and build a report.
///
/// One thread walks sequentially with [`TreeWalker`]; more threads use the
/// parallel walker. Both produce the same report.
pub(crate) fn run(roots: &Roots, opts: EngineOptions) -> Result<Report, CheckError> {
    info!(
        left = %roots.left().display(),
        right = %roots.right().display(),
        threads = opts.threads,
        "checking"
    );

    let start = Instant::now();
    let (differences, pairs, tally) = if opts.threads <= 1 {
        run_sequential(roots, &opts)?
    } else {
        run_parallel(roots, &opts)?
    };

    let stats = ScanStats::compute(pairs, tally.files_compared, tally.bytes_compared, start.elapsed());
    let report = Report::from_differences(differences, stats);

    info!(
        pairs = report.stats.pairs,
        differences = report.differences.len(),
        bytes = report.stats.bytes_compared,
        elapsed_ms = report.stats.duration.as_millis() as u64,
        "finished"
    );
    Ok(report)
}

type Collected = (Vec<Difference>, usize, Tally);

fn run_sequential(roots: &Roots, opts: &EngineOptions) -> Result<Collected, CheckError> {
    let walker = TreeWalker::with_options(roots.clone(), opts.filter.clone(), opts.cancel.clone());

    let mut differences = Vec::new();
    let mut tally = Tally::default();
    let mut pairs = 0;

    for pair in walker {
        let pair = pair?;
        pairs += 1;
        debug!(path = %pair.rel_path.display(), "checking");
        if let Some(diff) = compare_with(&pair, &opts.compare, &opts.cancel, &mut tally)? {
            info!("{diff}");
            differences.push(diff);
        }
    }

    Ok((differences, pairs, tally))
}

// ---------------------------------------------------------------------------
// Parallel engine
// ---------------------------------------------------------------------------

/// State shared across walker threads. Only `differences` and `error` are
/// locked; both are written once per difference or once per run.
#[derive(Default)]
struct Shared {
    differences: Mutex<Vec<Difference>>,
    error:       Mutex<Option<CheckError>>,
    abort:       AtomicBool,
    pairs:       AtomicUsize,
    files:       AtomicUsize,
    bytes:       AtomicU64,
}

impl Shared {
    /// Record the first fatal error and stop every thread.
    fn fail(&self, err: CheckError) -> WalkState {
        if let Ok(mut slot) = self.error.lock() {
            if slot.is_none() {
                *slot = Some(err);
            }
        }
        self.abort.store(true, Ordering::Relaxed);
        WalkState::Quit
    }
}

/// Two parallel passes. The left pass emits every pair whose left side
/// exists; the right pass emits only pairs missing on the left. Neither pass
/// descends below a pair unless both sides are directories, so every relative
/// path is compared exactly once.
fn run_parallel(roots: &Roots, opts: &EngineOptions) -> Result<Collected, CheckError> {
    let shared = Arc::new(Shared::default());

    for side in [Side::Left, Side::Right] {
        walk_side(roots, side, opts, &shared);
        if shared.abort.load(Ordering::Relaxed) {
            break;
        }
    }

    let shared = Arc::try_unwrap(shared).unwrap_or_default();
    if let Some(err) = shared.error.into_inner().unwrap_or_default() {
        return Err(err);
    }
    if opts.cancel.is_cancelled() {
        return Err(CheckError::Cancelled);
    }

    let tally = Tally {
        files_compared: shared.files.load(Ordering::Relaxed),
        bytes_compared: shared.bytes.load(Ordering::Relaxed),
    };
    Ok((
        shared.differences.into_inner().unwrap_or_default(),
        shared.pairs.load(Ordering::Relaxed),
        tally,
    ))
}

fn walk_side(roots: &Roots, side: Side, opts: &EngineOptions, shared: &Arc<Shared>) {
    let root = roots.root(side).to_path_buf();

    let mut builder = WalkBuilder::new(&root);
    builder
        .standard_filters(false)
        .ignore(false)
        .parents(false)
        .hidden(false)
        .follow_links(false)
        .same_file_system(false)
        .threads(opts.threads);

    let walker = builder.build_parallel();

    walker.run(|| {
        let shared  = Arc::clone(shared);
        let roots   = roots.clone();
        let root    = root.clone();
        let filter  = opts.filter.clone();
        let compare = opts.compare;
        let cancel  = opts.cancel.clone();

        Box::new(move |res: Result<DirEntry, ignore::Error>| -> WalkState {
            if shared.abort.load(Ordering::Relaxed) {
                return WalkState::Quit;
            }
            if cancel.is_cancelled() {
                shared.abort.store(true, Ordering::Relaxed);
                return WalkState::Quit;
            }

            let entry = match res {
                Ok(e)  => e,
                Err(e) => return shared.fail(map_ignore_error(&root, side, e)),
            };

            let rel = match entry.path().strip_prefix(&root) {
                Ok(r)  => r.to_path_buf(),
                Err(_) => return WalkState::Continue,
            };

            visit(&roots, side, &rel, filter.as_deref(), &compare, &cancel, &shared)
        })
    });
}

fn visit(
    roots: &Roots,
    side: Side,
    rel: &Path,
    filter: Option<&dyn Filter>,
    compare: &CompareOptions,
    cancel: &CancelToken,
    shared: &Shared,
) -> WalkState {
    let pair = match roots.pair(rel) {
        Ok(p)  => p,
        Err(e) => return shared.fail(e),
    };

    if pair.is_excluded_by(filter) {
        debug!(path = %rel.display(), "excluded");
        return WalkState::Skip;
    }

    // The left pass owns every pair with a left entry.
    let owned = side == Side::Left || pair.left.is_missing();
    if owned {
        shared.pairs.fetch_add(1, Ordering::Relaxed);
        debug!(path = %rel.display(), "checking");

        let mut tally = Tally::default();
        match compare_with(&pair, compare, cancel, &mut tally) {
            Ok(Some(diff)) => {
                info!("{diff}");
                if let Ok(mut d) = shared.differences.lock() {
                    d.push(diff);
                }
            }
            Ok(None) => {}
            Err(e) => return shared.fail(e),
        }
        shared.files.fetch_add(tally.files_compared, Ordering::Relaxed);
        shared.bytes.fetch_add(tally.bytes_compared, Ordering::Relaxed);
    }

    if pair.both_dirs() {
        WalkState::Continue
    } else {
        WalkState::Skip
    }
}

// ---------------------------------------------------------------------------
// Map ignore::Error to CheckError
// ---------------------------------------------------------------------------

fn map_ignore_error(root: &Path, side: Side, e: ignore::Error) -> CheckError {
    match e {
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            map_ignore_error(root, side, *err)
        }
        ignore::Error::WithPath { path, err } => match *err {
            ignore::Error::Io(io_err) => CheckError::from_io(side, &relative(root, &path), io_err),
            other => map_ignore_error(root, side, other),
        },
        ignore::Error::Io(io_err) => CheckError::from_io(side, Path::new(""), io_err),
        other => CheckError::Io {
            side,
            path:   PathBuf::new(),
            source: std::io::Error::other(other.to_string()),
        },
    }
}

fn relative(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
}
