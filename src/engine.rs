//! Pipeline entry points.
//!
//! [`scan`] indexes the working directory, extracts references and
//! classifies them. [`resolve_candidates`] attaches ranked corrections.
//! Choosing a correction for ambiguous references happens outside this
//! crate's core; [`apply`] then rewrites the files for a completed list.

use crate::analyzer::{BrokenReference, Diagnostics, Resolution, classify};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::index::FileIndex;
use crate::matcher::find_candidates;
use crate::rewriter::{AtomicWriter, Correction, CorrectionResult, FileWriter, apply_corrections};
use crate::scanner::{Reference, scan_sources};
use std::path::PathBuf;
use tracing::info;

/// Snapshot produced by one scan.
#[derive(Debug)]
pub struct ScanResult {
    pub index: FileIndex,
    /// Every extracted reference, valid or not, in scan order.
    pub references: Vec<Reference>,
    /// Broken targets. Candidates are empty until [`resolve_candidates`] runs.
    pub broken: Vec<BrokenReference>,
    /// Files that could not be read during extraction.
    pub failures: Vec<Error>,
    pub diagnostics: Diagnostics,
}

/// Indexes, extracts and classifies.
///
/// Only an unreadable working directory or invalid configuration fails the
/// whole scan.
pub fn scan(config: &Config) -> Result<ScanResult> {
    let index = FileIndex::build(&config.working_dir, &config.exclude)?;
    let (references, failures) = scan_sources(&index, config)?;
    let (broken, valid_refs) = classify(&references, &index, config);

    let diagnostics = Diagnostics {
        files_indexed: index.len(),
        total_refs: references.len(),
        valid_refs,
        broken_targets: broken.len(),
        broken_refs: broken.iter().map(|b| b.occurrences.len()).sum(),
        failures: failures.len(),
        ..Diagnostics::default()
    };
    info!(
        files = diagnostics.files_indexed,
        references = diagnostics.total_refs,
        broken = diagnostics.broken_targets,
        "scan complete"
    );

    Ok(ScanResult {
        index,
        references,
        broken,
        failures,
        diagnostics,
    })
}

/// Attaches ranked candidates to every broken reference.
pub fn resolve_candidates(
    broken: Vec<BrokenReference>,
    index: &FileIndex,
    config: &Config,
) -> Vec<BrokenReference> {
    broken
        .into_iter()
        .map(|mut b| {
            b.candidates = find_candidates(&b, index, config);
            b
        })
        .collect()
}

/// Corrections for every reference with exactly one candidate.
pub fn auto_corrections(broken: &[BrokenReference]) -> Vec<Correction> {
    broken
        .iter()
        .filter(|b| b.resolution() == Resolution::AutoResolvable)
        .filter_map(|b| {
            let candidate = b.candidates.first()?;
            Some(Correction::new(b.clone(), candidate.path.clone()))
        })
        .collect()
}

/// Rewrites every referencing file for `corrections`, atomically per file.
pub fn apply(corrections: &[Correction], index: &FileIndex, config: &Config) -> Vec<CorrectionResult> {
    apply_with(corrections, index, config, &AtomicWriter)
}

/// [`apply`] with a caller-supplied writer.
pub fn apply_with(
    corrections: &[Correction],
    index: &FileIndex,
    config: &Config,
    writer: &dyn FileWriter,
) -> Vec<CorrectionResult> {
    apply_corrections(corrections, index, config, writer)
}

/// Distinct files actually changed, in the order they were written.
pub fn modified_files(results: &[CorrectionResult]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    for result in results.iter().filter(|r| r.is_success() && r.rewritten > 0) {
        if !files.contains(&result.file) {
            files.push(result.file.clone());
        }
    }
    files
}
