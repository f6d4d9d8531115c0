//! Run configuration.
//!
//! A [`Config`] value is threaded explicitly through every stage of the
//! pipeline. It starts from per-style defaults, may be overlaid with the
//! optional `.ref-fixer.toml` project file, and is finally adjusted by the
//! command line.

use crate::error::{Error, Result};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the optional project config file in the working directory.
pub const CONFIG_FILE_NAME: &str = ".ref-fixer.toml";

/// Directory names skipped unless the caller opts out.
pub const DEFAULT_EXCLUDES: &[&str] = &[".git", "node_modules"];

const MODULE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs", "json"];
const MODULE_SOURCES: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs", "vue", "svelte"];
const LINK_SOURCES: &[&str] = &["html", "htm", "xhtml"];

/// Which kind of reference token the scanner looks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceStyle {
    /// Relative import/require paths such as `./foo/bar`.
    #[default]
    Module,
    /// `href`/`src` attribute values in markup.
    Link,
}

impl ReferenceStyle {
    /// Extensions tried, in order, when a reference omits one.
    pub fn default_extensions(self) -> Vec<String> {
        match self {
            Self::Module => MODULE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            Self::Link => Vec::new(),
        }
    }

    /// Extensions of files scanned for outgoing references when no glob filter is set.
    pub fn source_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Module => MODULE_SOURCES,
            Self::Link => LINK_SOURCES,
        }
    }
}

/// Matches the conventions of the host file system.
pub fn platform_case_sensitive() -> bool {
    !cfg!(any(target_os = "macos", target_os = "windows"))
}

/// Settings for one scan/repair run.
#[derive(Debug, Clone)]
pub struct Config {
    pub working_dir: PathBuf,
    /// Exact directory names excluded from traversal.
    pub exclude: Vec<String>,
    pub style: ReferenceStyle,
    /// Globs restricting which files are scanned for references.
    pub sources: Option<Vec<String>>,
    pub case_sensitive: bool,
    pub extensions: Vec<String>,
    /// Upper bound on scanner threads. `None` uses rayon's default.
    pub jobs: Option<usize>,
}

/// Raw TOML structure of `.ref-fixer.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub exclude: Vec<String>,
    pub style: Option<ReferenceStyle>,
    pub sources: Option<Vec<String>>,
    pub extensions: Option<Vec<String>>,
    pub case_sensitive: Option<bool>,
    pub jobs: Option<usize>,
}

impl Config {
    /// Defaults for module-style references rooted at `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        let style = ReferenceStyle::default();
        Self {
            working_dir: working_dir.into(),
            exclude: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            style,
            sources: None,
            case_sensitive: platform_case_sensitive(),
            extensions: style.default_extensions(),
            jobs: None,
        }
    }

    /// Loads `.ref-fixer.toml` from `working_dir` on top of the defaults.
    ///
    /// A missing file yields the defaults. A file that exists but cannot be
    /// parsed is an error; it is never silently ignored.
    pub fn load(working_dir: impl Into<PathBuf>) -> Result<Self> {
        let config = Self::new(working_dir);
        let path = config.working_dir.join(CONFIG_FILE_NAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(config),
            Err(source) => return Err(Error::ConfigRead { path, source }),
        };
        let file: FileConfig =
            toml::from_str(&content).map_err(|source| Error::ConfigParse { path, source })?;
        Ok(config.merge(file))
    }

    fn merge(mut self, file: FileConfig) -> Self {
        if let Some(style) = file.style {
            self = self.with_style(style);
        }
        for name in file.exclude {
            if !self.exclude.contains(&name) {
                self.exclude.push(name);
            }
        }
        if file.sources.is_some() {
            self.sources = file.sources;
        }
        if let Some(extensions) = file.extensions {
            self.extensions = extensions;
        }
        if let Some(case_sensitive) = file.case_sensitive {
            self.case_sensitive = case_sensitive;
        }
        if file.jobs.is_some() {
            self.jobs = file.jobs;
        }
        self
    }

    /// Switches the reference style and resets extensions to that style's defaults.
    pub fn with_style(mut self, style: ReferenceStyle) -> Self {
        self.style = style;
        self.extensions = style.default_extensions();
        self
    }

    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn with_sources(mut self, sources: Option<Vec<String>>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Compiles the referencing-file globs, if any.
    pub(crate) fn source_patterns(&self) -> Result<Option<Vec<Pattern>>> {
        let Some(globs) = &self.sources else {
            return Ok(None);
        };
        globs
            .iter()
            .map(|g| {
                Pattern::new(g).map_err(|source| Error::InvalidGlob {
                    pattern: g.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// True if `ext` is one of the configured default extensions.
    pub(crate) fn is_default_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e == ext)
    }
}

/// Decides whether a root-relative file is scanned for outgoing references.
pub(crate) fn is_source_file(
    relative: &Path,
    style: ReferenceStyle,
    patterns: Option<&[Pattern]>,
) -> bool {
    match patterns {
        Some(patterns) => {
            let rel = crate::index::to_slash(relative);
            let name = relative
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default();
            patterns
                .iter()
                .any(|p| p.matches(&rel) || p.matches(&name))
        }
        None => relative
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| style.source_extensions().contains(&ext)),
    }
}
