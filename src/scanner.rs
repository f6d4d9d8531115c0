//! Reference scanner.
//!
//! Selects the files that may contain outgoing references, reads them in
//! parallel, and extracts every path token matching the configured
//! [`ReferenceStyle`]. Extraction is a pure function of the file text, so the
//! rewriter can re-run it on current content right before writing.
//!
//! Module sources are matched with a regex, not parsed. Lines whose first
//! non-blank text opens a comment (`//`, `/*` or `*`) are skipped; an import-like
//! sequence inside a string or after code on the same line is still extracted.

use crate::config::{Config, ReferenceStyle, is_source_file};
use crate::error::{Error, Result};
use crate::index::{FileEntry, FileIndex, normalize, to_slash};
use percent_encoding::percent_decode_str;
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// A reference token found in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// The path text exactly as written, e.g. `"../util/b"`.
    pub raw: String,
    /// Referencing file, relative to the working directory.
    pub file: PathBuf,
    /// Resolved target, relative to the working directory.
    pub target: PathBuf,
    /// Line number, 1-indexed.
    pub line: usize,
    /// Column number, 1-indexed.
    pub column: usize,
    /// Byte offset of the first byte of the path token.
    pub start_offset: usize,
    /// Byte offset one past the last byte of the path token.
    pub end_offset: usize,
}

impl Reference {
    /// True if the token is written relative to the working directory (`/x`).
    pub fn is_root_relative(&self) -> bool {
        self.raw.starts_with('/')
    }
}

fn module_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:\bfrom|\bimport|\brequire\s*\(|\bimport\s*\()\s*['"](\.{1,2}/[^'"\r\n]*)['"]"#)
            .expect("valid regex")
    })
}

fn link_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|\s)(?:href|src)\s*=\s*(?:"([^"\r\n]*)"|'([^'\r\n]*)')"#)
            .expect("valid regex")
    })
}

/// Scans every source file in `index` and returns references in index order.
///
/// Files are read on a rayon pool bounded by `config.jobs`. Files that fail to
/// read are returned alongside the references instead of aborting the scan.
pub fn scan_sources(index: &FileIndex, config: &Config) -> Result<(Vec<Reference>, Vec<Error>)> {
    let sources = source_files(index, config)?;
    debug!(sources = sources.len(), "scanning referencing files");

    let run = || -> Vec<Result<Vec<Reference>>> {
        sources
            .par_iter()
            .map(|entry| extract_file(entry, config.style))
            .collect()
    };
    let results = match config.jobs {
        Some(jobs) => match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => pool.install(run),
            Err(err) => {
                warn!("cannot build a {jobs}-thread scanner pool, using the global pool: {err}");
                run()
            }
        },
        None => run(),
    };

    let mut references = Vec::new();
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(refs) => references.extend(refs),
            Err(err) => {
                warn!("{err}");
                failures.push(err);
            }
        }
    }
    Ok((references, failures))
}

/// Indexed files that are scanned for outgoing references.
///
/// With a glob filter configured, a file qualifies if its relative path or
/// its basename matches any glob. Otherwise the style's source extensions
/// decide.
pub fn source_files<'a>(index: &'a FileIndex, config: &Config) -> Result<Vec<&'a FileEntry>> {
    let patterns = config.source_patterns()?;
    Ok(index
        .files()
        .iter()
        .filter(|f| is_source_file(&f.relative, config.style, patterns.as_deref()))
        .collect())
}

/// Reads one indexed file and extracts its references.
///
/// Files that are not valid UTF-8 yield no references.
pub fn extract_file(entry: &FileEntry, style: ReferenceStyle) -> Result<Vec<Reference>> {
    let source = match std::fs::read_to_string(&entry.path) {
        Ok(source) => source,
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            debug!(file = %entry.relative.display(), "skipping non-UTF-8 file");
            return Ok(Vec::new());
        }
        Err(e) => return Err(Error::io(&entry.path, e)),
    };
    Ok(extract_references(&source, &entry.relative, style))
}

/// Extracts all references of `style` from `source`, in order of appearance.
///
/// `file` is the root-relative path of the referencing file; raw tokens are
/// resolved against its directory.
pub fn extract_references(source: &str, file: &Path, style: ReferenceStyle) -> Vec<Reference> {
    let tokens: Vec<(usize, &str)> = match style {
        ReferenceStyle::Module => module_pattern()
            .captures_iter(source)
            .filter_map(|cap| cap.get(1))
            .filter(|m| !in_line_comment(source, m.start()))
            .map(|m| (m.start(), m.as_str()))
            .collect(),
        ReferenceStyle::Link => link_pattern()
            .captures_iter(source)
            .filter_map(|cap| cap.get(1).or_else(|| cap.get(2)))
            .filter_map(|m| link_path(m.as_str()).map(|path| (m.start(), path)))
            .collect(),
    };

    let base = file.parent().map(to_slash).unwrap_or_default();
    let mut refs = Vec::new();
    for (start, raw) in tokens {
        let path = match style {
            ReferenceStyle::Module => Cow::Borrowed(raw),
            ReferenceStyle::Link => percent_decode_str(raw)
                .decode_utf8()
                .unwrap_or(Cow::Borrowed(raw)),
        };
        let Some(target) = resolve_target(&base, &path) else {
            debug!(file = %file.display(), reference = raw, "reference leaves the working directory");
            continue;
        };
        if target.as_os_str().is_empty() {
            continue;
        }
        let (line, column) = offset_to_line_col(source, start);
        refs.push(Reference {
            raw: raw.to_string(),
            file: file.to_path_buf(),
            target,
            line,
            column,
            start_offset: start,
            end_offset: start + raw.len(),
        });
    }
    refs
}

/// True if the line holding `offset` starts with a comment.
fn in_line_comment(source: &str, offset: usize) -> bool {
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let lead = source[line_start..offset].trim_start();
    lead.starts_with("//") || lead.starts_with("/*") || lead.starts_with('*')
}

/// Trims an attribute value down to its local path part.
///
/// Returns `None` for URLs, fragment-only links, and templated values.
fn link_path(value: &str) -> Option<&str> {
    let end = value.find(['?', '#']).unwrap_or(value.len());
    let path = &value[..end];
    if path.trim().is_empty() || path.starts_with("//") {
        return None;
    }
    let scheme_end = path.find(':');
    let first_slash = path.find('/');
    if let Some(colon) = scheme_end
        && first_slash.is_none_or(|slash| colon < slash)
    {
        return None;
    }
    if path.contains(['{', '}', '$', '<', '>']) {
        return None;
    }
    Some(path)
}

/// Joins `raw` onto `base` (or the root, for `/`-prefixed tokens) and normalizes.
fn resolve_target(base: &str, raw: &str) -> Option<PathBuf> {
    if let Some(stripped) = raw.strip_prefix('/') {
        return normalize(stripped);
    }
    if base.is_empty() {
        normalize(raw)
    } else {
        normalize(&format!("{base}/{raw}"))
    }
}

fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// Raw tokens only; keeps the tests below readable.
#[cfg(test)]
pub fn extract_raw(source: &str, file: &str, style: ReferenceStyle) -> Vec<String> {
    extract_references(source, Path::new(file), style)
        .into_iter()
        .map(|r| r.raw)
        .collect()
}
