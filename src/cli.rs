//! Command-line interface definitions.
//!
//! Defines the argument parser and subcommands using clap's derive API.
//! Each subcommand corresponds to a distinct operation: detecting broken
//! references, applying fixes, listing every reference, or listing scan targets.

use clap::{Parser, Subcommand, ValueEnum};
use ref_fixer::ReferenceStyle;
use std::path::PathBuf;

/// Detect and fix broken file references after files are moved or renamed.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Log debug details to stderr. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan files and report broken references with candidate fixes.
    Detect {
        #[command(flatten)]
        scan: ScanOptions,

        /// Emit JSON instead of human-readable output.
        #[arg(long)]
        json: bool,

        /// Also list the files that contain references (sources).
        #[arg(short, long)]
        sources: bool,

        /// Also list the files that are referenced by other files (targets).
        #[arg(short, long)]
        targets: bool,
    },

    /// Correct broken references. Dry-run unless `--write` is given.
    Apply {
        #[command(flatten)]
        scan: ScanOptions,

        /// Actually modify files.
        #[arg(short, long)]
        write: bool,

        /// Choose among ambiguous candidates interactively and confirm before writing.
        #[arg(short, long)]
        interactive: bool,

        /// Resolve ambiguous references to the single candidate under this directory.
        #[arg(long)]
        prefer: Option<PathBuf>,
    },

    /// List every reference found and whether it resolves.
    References {
        #[command(flatten)]
        scan: ScanOptions,

        /// Emit JSON instead of human-readable output.
        #[arg(long)]
        json: bool,
    },

    /// List files that would be scanned for references without processing them.
    Scan {
        #[command(flatten)]
        scan: ScanOptions,
    },
}

/// Options shared by every subcommand that scans the tree.
#[derive(Debug, clap::Args)]
pub struct ScanOptions {
    /// Working directory to scan. Defaults to the current directory.
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Kind of references to look for.
    #[arg(short, long, value_enum)]
    pub mode: Option<Mode>,

    /// Directory names to exclude (e.g., "test,bin"). Repeatable.
    /// `.git` and `node_modules` are excluded by default.
    #[arg(short, long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Disable the default directory exclusions.
    #[arg(long)]
    pub no_default_excludes: bool,

    /// Only scan referencing files matching these globs (e.g., "*.js,*.jsx").
    #[arg(short = 'g', long = "sources-glob", value_delimiter = ',')]
    pub sources_glob: Vec<String>,

    /// Match file names case-sensitively regardless of platform.
    #[arg(long, conflicts_with = "ignore_case")]
    pub case_sensitive: bool,

    /// Match file names case-insensitively regardless of platform.
    #[arg(long)]
    pub ignore_case: bool,

    /// Maximum number of scanner threads.
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Relative import/require paths.
    #[value(alias = "default")]
    Module,
    /// HTML `href`/`src` attributes.
    #[value(alias = "html")]
    Link,
}

impl From<Mode> for ReferenceStyle {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Module => ReferenceStyle::Module,
            Mode::Link => ReferenceStyle::Link,
        }
    }
}
