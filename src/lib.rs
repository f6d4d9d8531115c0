//! ref-fixer library for detecting and fixing broken file references.
//!
//! After files are moved or renamed, imports and links elsewhere in the tree
//! keep pointing at the old locations. This library finds those references
//! and proposes or applies corrections by matching file names against the
//! files that actually exist. The workflow has four phases:
//!
//! 1. **Indexing**: Walk the working directory and record every file by path and basename
//! 2. **Scanning**: Extract module imports or `href`/`src` links from source files
//! 3. **Analysis**: Classify references as valid or broken and rank candidate targets
//! 4. **Rewriting**: Apply chosen corrections to the referencing files
//!
//! # Example
//!
//! ```no_run
//! use ref_fixer::{Config, apply, auto_corrections, modified_files, resolve_candidates, scan};
//!
//! let config = Config::load(".").unwrap();
//! let scanned = scan(&config).unwrap();
//! let broken = resolve_candidates(scanned.broken, &scanned.index, &config);
//!
//! // Only references with exactly one candidate are fixed without asking.
//! let corrections = auto_corrections(&broken);
//! let results = apply(&corrections, &scanned.index, &config);
//!
//! println!("Updated {} files", modified_files(&results).len());
//! ```

pub mod analyzer;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod matcher;
pub mod rewriter;
pub mod scanner;

// Re-export commonly used types at crate root
pub use analyzer::{BrokenReference, Diagnostics, Resolution};
pub use config::{Config, ReferenceStyle};
pub use engine::{
    ScanResult, apply, apply_with, auto_corrections, modified_files, resolve_candidates, scan,
};
pub use error::{Error, Result};
pub use index::{FileEntry, FileIndex};
pub use matcher::{Candidate, MatchRank};
pub use rewriter::{Correction, CorrectionResult, FileWriter};
pub use scanner::Reference;
