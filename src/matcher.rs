//! Correction candidates for broken references.
//!
//! A candidate is any indexed file whose basename equals the broken target's
//! final segment (or that segment plus a default extension, for targets
//! written without one). Candidates are ranked by how many trailing
//! directory components they share with the target. Files with a different
//! name are never proposed.

use crate::analyzer::BrokenReference;
use crate::config::Config;
use crate::index::{FileIndex, normalize, to_slash};
use serde::Serialize;
use std::cmp::Reverse;
use std::path::{Component, Path, PathBuf};

/// How a candidate's name matched the broken target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRank {
    /// The basename equals the target's final segment.
    Exact,
    /// The basename equals the final segment plus a default extension.
    Inferred,
}

/// An existing file proposed as the intended target of a broken reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// Path relative to the working directory.
    pub path: PathBuf,
    pub rank: MatchRank,
    /// Number of trailing directory components shared with the target.
    pub suffix_len: usize,
}

/// Ranks every plausible correction for `broken`, best first.
///
/// Ordering is rank, then longer shared directory suffix, then path, so the
/// result never depends on traversal order.
pub fn find_candidates(broken: &BrokenReference, index: &FileIndex, config: &Config) -> Vec<Candidate> {
    let name = broken.basename();
    if name.is_empty() {
        return Vec::new();
    }
    let cs = config.case_sensitive;
    let target_dir = broken.target.parent().unwrap_or(Path::new(""));

    let mut candidates: Vec<Candidate> = index
        .with_basename(&name, cs)
        .into_iter()
        .map(|path| candidate(path, MatchRank::Exact, target_dir, cs))
        .collect();

    let has_default_ext = Path::new(&name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| config.is_default_extension(e));
    if !has_default_ext {
        for ext in &config.extensions {
            let inferred = format!("{name}.{ext}");
            candidates.extend(
                index
                    .with_basename(&inferred, cs)
                    .into_iter()
                    .map(|path| candidate(path, MatchRank::Inferred, target_dir, cs)),
            );
        }
    }

    candidates.sort_by(|a, b| {
        (a.rank, Reverse(a.suffix_len), &a.path).cmp(&(b.rank, Reverse(b.suffix_len), &b.path))
    });
    candidates.dedup_by(|a, b| a.path == b.path);
    candidates
}

fn candidate(path: &Path, rank: MatchRank, target_dir: &Path, cs: bool) -> Candidate {
    let candidate_dir = path.parent().unwrap_or(Path::new(""));
    Candidate {
        path: path.to_path_buf(),
        rank,
        suffix_len: common_suffix_len(target_dir, candidate_dir, cs),
    }
}

/// Counts equal trailing components of two directory paths.
fn common_suffix_len(a: &Path, b: &Path, case_sensitive: bool) -> usize {
    let parts = |p: &Path| -> Vec<String> {
        p.components()
            .filter_map(|c| match c {
                Component::Normal(s) => {
                    let s = s.to_string_lossy();
                    Some(if case_sensitive { s.into_owned() } else { s.to_lowercase() })
                }
                _ => None,
            })
            .collect()
    };
    let (a, b) = (parts(a), parts(b));
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Picks the single candidate located under `dir`, if exactly one is.
///
/// This is the `--prefer` policy for ambiguous references. `dir` may be
/// absolute under `root` or relative to it, with or without `./` or a
/// trailing `/`.
pub fn prefer_under(broken: &BrokenReference, dir: &Path, root: &Path) -> Option<PathBuf> {
    let dir = match dir.strip_prefix(root) {
        Ok(relative) => relative,
        Err(_) if dir.is_absolute() => return None,
        Err(_) => dir,
    };
    let dir = normalize(&to_slash(dir))?;
    let mut under = broken.candidates.iter().filter(|c| c.path.starts_with(&dir));
    let first = under.next()?;
    if under.next().is_some() {
        return None;
    }
    Some(first.path.clone())
}
