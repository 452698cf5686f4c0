use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use backup_chk::logging::init_logging;
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "backup-chk",
    version,
    about = "Check that a backup matches its source",
    long_about = "Walks REFERENCE and BACKUP side by side and prints one line per divergence. \
    No output means the trees are identical.\n\n\
    Exit status: 0 identical, 1 differences found, 2 error.",
    after_help = "Example:\n  $ backup-chk /Users/me:/Volumes/Backup/Users/me -x .Trash -x 'Library/Caches'"
)]
struct Cli {
    #[arg(
        value_name = "REFERENCE:BACKUP",
        required = true,
        value_parser = parse_pair,
        help = "Pair of roots to compare, separated by a colon"
    )]
    pairs: Vec<RootPair>,

    #[arg(
        short = 'x',
        long = "exclude",
        value_name = "GLOB",
        help = "Skip relative paths matching this gitignore-style glob (repeatable)"
    )]
    excludes: Vec<String>,

    #[arg(short = 'j', long, help = "Worker threads (default: logical CPUs, 1 = sequential)")]
    threads: Option<usize>,

    #[arg(short = 'p', long, help = "Also report regular files whose permission bits differ")]
    check_permissions: bool,

    #[arg(long, help = "Ignore entries modified in the reference after the backup copy")]
    skip_newer: bool,

    #[arg(short, long, action = clap::ArgAction::Count, help = "Log more to stderr (-v info, -vv debug)")]
    verbose: u8,
}

#[derive(Clone, Debug)]
struct RootPair {
    raw:   String,
    left:  PathBuf,
    right: PathBuf,
}

fn parse_pair(raw: &str) -> Result<RootPair, String> {
    match raw.split(':').collect::<Vec<_>>().as_slice() {
        [left, right] if !left.is_empty() && !right.is_empty() => Ok(RootPair {
            raw:   raw.to_string(),
            left:  PathBuf::from(left),
            right: PathBuf::from(right),
        }),
        _ => Err(format!(
            "expected REFERENCE:BACKUP, got '{raw}' (hint: /Users/:/Volumes/Backup/Users)"
        )),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::from(2);
    }

    match check(&cli) {
        Ok(true)  => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("backup-chk: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Compare every pair. `Ok(true)` when all pairs are identical.
///
/// Each pair is compared in full before anything is printed for it, so a
/// fatal error never leaves a partial report for that pair on stdout.
fn check(cli: &Cli) -> Result<bool> {
    let stdout = io::stdout();
    let prefixed = cli.pairs.len() > 1;
    let mut identical = true;

    for pair in &cli.pairs {
        let mut builder = backup_chk::compare(&pair.left, &pair.right)
            .check_permissions(cli.check_permissions)
            .skip_modified_since_backup(cli.skip_newer);
        for pattern in &cli.excludes {
            builder = builder.exclude(pattern.as_str());
        }
        if let Some(n) = cli.threads {
            builder = builder.threads(n);
        }

        let report = builder
            .run()
            .with_context(|| format!("checking {}", pair.raw))?;

        let prefix = if prefixed { format!("{} ", pair.raw) } else { String::new() };
        let mut out = stdout.lock();
        report.render(&mut out, &prefix)?;
        out.flush()?;

        identical &= report.is_identical();
    }

    Ok(identical)
}
