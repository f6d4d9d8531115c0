//! File index for the working directory.
//!
//! Walks the tree once, skipping directories whose name matches an exclusion
//! filter, and records every regular file under its root-relative path and
//! its basename. The index is the snapshot that classification, candidate
//! matching, and correction validation are all computed against.

use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A file that exists under the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Path including the working directory prefix.
    pub path: PathBuf,
    /// Path relative to the working directory.
    pub relative: PathBuf,
    pub basename: String,
}

/// Every indexed file, addressable by relative path or by basename.
#[derive(Debug, Default)]
pub struct FileIndex {
    root: PathBuf,
    files: Vec<FileEntry>,
    by_path: HashMap<String, usize>,
    by_folded_path: HashMap<String, usize>,
    by_basename: BTreeMap<String, BTreeSet<PathBuf>>,
    by_folded_basename: BTreeMap<String, BTreeSet<PathBuf>>,
}

impl FileIndex {
    /// Indexes all files under `root`, skipping directories named in `exclude`.
    ///
    /// Fails only if `root` itself cannot be read. Unreadable entries below it
    /// are logged and skipped.
    pub fn build(root: &Path, exclude: &[String]) -> Result<Self> {
        check_working_dir(root)?;

        let mut index = Self {
            root: root.to_path_buf(),
            ..Self::default()
        };

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_excluded(e, exclude));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(
                        path = ?err.path(),
                        "skipping unreadable entry: {err}"
                    );
                    continue;
                }
            };
            let is_file = entry.file_type().is_file()
                || (entry.path_is_symlink() && entry.path().is_file());
            if !is_file {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            index.insert(entry.path().to_path_buf(), relative.to_path_buf());
        }

        debug!(root = %root.display(), files = index.len(), "indexed working directory");
        Ok(index)
    }

    /// Builds an index from root-relative paths without touching the disk.
    pub fn from_paths<I, P>(root: &Path, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut index = Self {
            root: root.to_path_buf(),
            ..Self::default()
        };
        let mut sorted: Vec<PathBuf> = paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
        sorted.sort();
        sorted.dedup();
        for relative in sorted {
            index.insert(root.join(&relative), relative);
        }
        index
    }

    fn insert(&mut self, path: PathBuf, relative: PathBuf) {
        let basename = relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let key = to_slash(&relative);
        let slot = self.files.len();

        self.by_path.insert(key.clone(), slot);
        self.by_folded_path.entry(key.to_lowercase()).or_insert(slot);
        self.by_basename
            .entry(basename.clone())
            .or_default()
            .insert(relative.clone());
        self.by_folded_basename
            .entry(basename.to_lowercase())
            .or_default()
            .insert(relative.clone());
        self.files.push(FileEntry {
            path,
            relative,
            basename,
        });
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All files in traversal (sorted) order.
    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Looks up a file by its root-relative path.
    pub fn get(&self, relative: &Path, case_sensitive: bool) -> Option<&FileEntry> {
        let key = to_slash(relative);
        let slot = if case_sensitive {
            self.by_path.get(&key)
        } else {
            self.by_folded_path.get(&key.to_lowercase())
        };
        slot.and_then(|&i| self.files.get(i))
    }

    pub fn contains(&self, relative: &Path, case_sensitive: bool) -> bool {
        self.get(relative, case_sensitive).is_some()
    }

    /// Relative paths of every file named `basename`, in lexicographic order.
    pub fn with_basename(&self, basename: &str, case_sensitive: bool) -> Vec<&Path> {
        let set = if case_sensitive {
            self.by_basename.get(basename)
        } else {
            self.by_folded_basename.get(&basename.to_lowercase())
        };
        set.map(|s| s.iter().map(PathBuf::as_path).collect())
            .unwrap_or_default()
    }
}

fn check_working_dir(root: &Path) -> Result<()> {
    let metadata = std::fs::metadata(root).map_err(|source| Error::WorkingDirectory {
        path: root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(Error::WorkingDirectory {
            path: root.to_path_buf(),
            source: std::io::Error::other("not a directory"),
        });
    }
    std::fs::read_dir(root).map_err(|source| Error::WorkingDirectory {
        path: root.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn is_excluded(entry: &walkdir::DirEntry, exclude: &[String]) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| exclude.iter().any(|e| e == name))
}

/// Renders a relative path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Lexically resolves `.` and `..` in a `/`-separated path.
///
/// Returns `None` if the path climbs above its starting point, i.e. it would
/// leave the working directory.
pub fn normalize(path: &str) -> Option<PathBuf> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.iter().collect())
}
