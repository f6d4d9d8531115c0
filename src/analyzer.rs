//! Reference classification.
//!
//! Resolves each extracted reference against the file index, trying the
//! configured default extensions when the literal path is missing, and
//! groups the ones that resolve to nothing into [`BrokenReference`]s keyed by
//! their resolved target.

use crate::config::{Config, ReferenceStyle};
use crate::index::{FileEntry, FileIndex};
use crate::matcher::Candidate;
use crate::scanner::Reference;
use serde::Serialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// A target that no indexed file satisfies, with every reference to it.
#[derive(Debug, Clone, Serialize)]
pub struct BrokenReference {
    /// Resolved target path relative to the working directory.
    pub target: PathBuf,
    /// Occurrences in first-seen order.
    pub occurrences: Vec<Reference>,
    /// Ranked correction candidates, best first. Empty until matched.
    pub candidates: Vec<Candidate>,
}

/// How a broken reference can be corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Exactly one candidate.
    AutoResolvable,
    /// Several candidates; an external decision must pick one.
    Ambiguous,
    /// No candidate shares the target's name.
    Unfixable,
}

impl BrokenReference {
    /// Distinct referencing files, in first-seen order.
    pub fn referencing_files(&self) -> Vec<&Path> {
        let mut files: Vec<&Path> = Vec::new();
        for occurrence in &self.occurrences {
            if !files.contains(&occurrence.file.as_path()) {
                files.push(&occurrence.file);
            }
        }
        files
    }

    pub fn resolution(&self) -> Resolution {
        match self.candidates.len() {
            0 => Resolution::Unfixable,
            1 => Resolution::AutoResolvable,
            _ => Resolution::Ambiguous,
        }
    }

    /// Final path segment of the target.
    pub fn basename(&self) -> String {
        self.target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Explains why the reference cannot be fixed automatically.
    pub fn reason(&self) -> Option<String> {
        match self.resolution() {
            Resolution::AutoResolvable => None,
            Resolution::Unfixable => Some(format!("no file named '{}' exists", self.basename())),
            Resolution::Ambiguous => {
                let shown: Vec<_> = self
                    .candidates
                    .iter()
                    .take(3)
                    .map(|c| c.path.display().to_string())
                    .collect();
                Some(format!(
                    "ambiguous: {} files match '{}': {}",
                    self.candidates.len(),
                    self.basename(),
                    shown.join(", ")
                ))
            }
        }
    }
}

/// Summary statistics from a detection run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Diagnostics {
    pub files_indexed: usize,
    pub total_refs: usize,
    pub valid_refs: usize,
    pub broken_targets: usize,
    pub broken_refs: usize,
    pub auto_resolvable: usize,
    pub ambiguous: usize,
    pub unfixable: usize,
    pub failures: usize,
}

impl Diagnostics {
    /// Recounts the resolution buckets after candidates have been matched.
    pub fn count_resolutions(&mut self, broken: &[BrokenReference]) {
        let count = |r: Resolution| broken.iter().filter(|b| b.resolution() == r).count();
        self.auto_resolvable = count(Resolution::AutoResolvable);
        self.ambiguous = count(Resolution::Ambiguous);
        self.unfixable = count(Resolution::Unfixable);
    }
}

/// Splits `refs` into broken targets and a count of valid references.
///
/// Broken references are grouped by resolved target and ordered by the first
/// occurrence of each target in `refs`.
pub fn classify(
    refs: &[Reference],
    index: &FileIndex,
    config: &Config,
) -> (Vec<BrokenReference>, usize) {
    let mut broken: Vec<BrokenReference> = Vec::new();
    let mut slots: HashMap<&Path, usize> = HashMap::new();
    let mut valid_count = 0;

    for reference in refs {
        if resolve(&reference.target, index, config).is_some() {
            valid_count += 1;
            continue;
        }
        let slot = *slots.entry(reference.target.as_path()).or_insert_with(|| {
            broken.push(BrokenReference {
                target: reference.target.clone(),
                occurrences: Vec::new(),
                candidates: Vec::new(),
            });
            broken.len() - 1
        });
        broken[slot].occurrences.push(reference.clone());
    }

    (broken, valid_count)
}

/// Finds the indexed file a resolved target refers to, if any.
pub fn resolve<'a>(target: &Path, index: &'a FileIndex, config: &Config) -> Option<&'a FileEntry> {
    resolution_paths(target, config)
        .iter()
        .find_map(|p| index.get(p, config.case_sensitive))
}

/// Files served for a link that names a directory.
const DIRECTORY_INDEXES: [&str; 2] = ["index.html", "index.htm"];

/// Paths tried, in order, when resolving `target`.
///
/// The literal path comes first. Unless it already carries a default
/// extension, each default extension is then appended. Module references
/// may also name a directory containing an `index` file, and links a
/// directory containing `index.html` or `index.htm`.
pub fn resolution_paths(target: &Path, config: &Config) -> Vec<PathBuf> {
    let mut paths = vec![target.to_path_buf()];
    let has_default_ext = target
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| config.is_default_extension(e));
    if !has_default_ext {
        paths.extend(config.extensions.iter().map(|ext| append_extension(target, ext)));
    }
    match config.style {
        ReferenceStyle::Module => paths.extend(
            config
                .extensions
                .iter()
                .map(|ext| target.join(format!("index.{ext}"))),
        ),
        ReferenceStyle::Link => {
            paths.extend(DIRECTORY_INDEXES.iter().map(|name| target.join(name)));
        }
    }
    paths
}

/// `foo.config` + `js` gives `foo.config.js`; existing extensions are kept.
pub(crate) fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}
