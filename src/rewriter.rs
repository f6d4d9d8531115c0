//! File rewriting for applying corrections.
//!
//! Each referencing file is handled once per batch: its current content is
//! re-scanned so spans are never stale, every occurrence of a corrected
//! target is turned into a [`Replacement`], and the replacements are applied
//! end-to-start before the file is written through a [`FileWriter`].

use crate::analyzer::{BrokenReference, append_extension, resolve};
use crate::config::{Config, ReferenceStyle};
use crate::error::Error;
use crate::index::{FileIndex, to_slash};
use crate::scanner::{Reference, extract_references};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// A broken reference paired with the file it should point at.
#[derive(Debug, Clone)]
pub struct Correction {
    pub broken: BrokenReference,
    /// Root-relative path of the chosen file.
    pub correct_path: PathBuf,
}

impl Correction {
    pub fn new(broken: BrokenReference, correct_path: impl Into<PathBuf>) -> Self {
        Self {
            broken,
            correct_path: correct_path.into(),
        }
    }
}

/// Outcome of one correction within one referencing file.
#[derive(Debug)]
pub struct CorrectionResult {
    /// Referencing file, relative to the working directory.
    pub file: PathBuf,
    pub target: PathBuf,
    pub correct_path: PathBuf,
    /// Occurrences rewritten in `file`.
    pub rewritten: usize,
    pub error: Option<Error>,
}

impl CorrectionResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A single text replacement with position information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub start: usize,
    pub end: usize,
    pub new_text: String,
}

impl Replacement {
    fn overlaps(&self, other: &Replacement) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Destination for rewritten file contents.
pub trait FileWriter {
    fn write(&self, path: &Path, contents: &str) -> std::io::Result<()>;
}

/// Writes through a temporary file in the same directory, then renames it
/// over the original. Readers see either the old or the new content.
/// Symlinks are followed so the link survives and its target is updated.
#[derive(Debug, Default, Clone, Copy)]
pub struct AtomicWriter;

impl FileWriter for AtomicWriter {
    fn write(&self, path: &Path, contents: &str) -> std::io::Result<()> {
        let path = match std::fs::canonicalize(path) {
            Ok(real) => real,
            Err(_) => path.to_path_buf(),
        };
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        if let Ok(metadata) = std::fs::metadata(&path) {
            std::fs::set_permissions(tmp.path(), metadata.permissions())?;
        }
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Applies `corrections` to every file that references their targets.
///
/// Returns one result per (correction, referencing file). Failures are
/// recorded in the results; nothing here aborts the batch.
pub fn apply_corrections(
    corrections: &[Correction],
    index: &FileIndex,
    config: &Config,
    writer: &dyn FileWriter,
) -> Vec<CorrectionResult> {
    let mut results = Vec::new();
    // (referencing file, [(correction, indexed correct path)]) in first-seen order
    let mut by_file: Vec<(PathBuf, Vec<(&Correction, PathBuf)>)> = Vec::new();

    for correction in corrections {
        let Some(entry) = index.get(&correction.correct_path, config.case_sensitive) else {
            for file in correction.broken.referencing_files() {
                results.push(failure(
                    file,
                    correction,
                    Error::InvalidCorrection {
                        target: correction.broken.target.clone(),
                        correct_path: correction.correct_path.clone(),
                    },
                ));
            }
            continue;
        };
        for file in correction.broken.referencing_files() {
            let slot = match by_file.iter().position(|(f, _)| f == file) {
                Some(slot) => slot,
                None => {
                    by_file.push((file.to_path_buf(), Vec::new()));
                    by_file.len() - 1
                }
            };
            by_file[slot].1.push((correction, entry.relative.clone()));
        }
    }

    for (file, pending) in by_file {
        results.extend(rewrite_file(&file, &pending, index, config, writer));
    }
    results
}

fn rewrite_file(
    file: &Path,
    pending: &[(&Correction, PathBuf)],
    index: &FileIndex,
    config: &Config,
    writer: &dyn FileWriter,
) -> Vec<CorrectionResult> {
    let path = index.root().join(file);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            warn!(file = %path.display(), "cannot read file for rewriting: {e}");
            return pending
                .iter()
                .map(|(correction, _)| failure(file, correction, Error::io(&path, clone_io(&e))))
                .collect();
        }
    };

    let current = extract_references(&content, file, config.style);
    let mut accepted: Vec<Replacement> = Vec::new();
    let mut results = Vec::with_capacity(pending.len());

    for (correction, correct_path) in pending {
        let mut edits = Vec::new();
        let mut conflict = None;
        for reference in current.iter().filter(|r| r.target == correction.broken.target) {
            let edit = Replacement {
                start: reference.start_offset,
                end: reference.end_offset,
                new_text: rewrite_token(reference, correct_path, index, config),
            };
            if accepted.contains(&edit) {
                continue;
            }
            if accepted.iter().any(|a| a.overlaps(&edit)) {
                conflict = Some(reference);
                break;
            }
            edits.push(edit);
        }

        if let Some(reference) = conflict {
            warn!(
                file = %file.display(),
                target = %correction.broken.target.display(),
                "rejecting conflicting correction"
            );
            results.push(failure(
                file,
                correction,
                Error::WriteConflict {
                    file: file.to_path_buf(),
                    target: correction.broken.target.clone(),
                    line: reference.line,
                    column: reference.column,
                },
            ));
            continue;
        }

        results.push(CorrectionResult {
            file: file.to_path_buf(),
            target: correction.broken.target.clone(),
            correct_path: correct_path.clone(),
            rewritten: edits.len(),
            error: None,
        });
        accepted.extend(edits);
    }

    if accepted.is_empty() {
        debug!(file = %file.display(), "nothing left to rewrite");
        return results;
    }

    let new_content = apply_replacements(&content, &accepted);
    if let Err(e) = writer.write(&path, &new_content) {
        warn!(file = %path.display(), "write failed, file left unchanged: {e}");
        for result in results.iter_mut().filter(|r| r.error.is_none()) {
            result.rewritten = 0;
            result.error = Some(Error::io(&path, clone_io(&e)));
        }
    }
    results
}

fn failure(file: &Path, correction: &Correction, error: Error) -> CorrectionResult {
    CorrectionResult {
        file: file.to_path_buf(),
        target: correction.broken.target.clone(),
        correct_path: correction.correct_path.clone(),
        rewritten: 0,
        error: Some(error),
    }
}

fn clone_io(e: &std::io::Error) -> std::io::Error {
    std::io::Error::new(e.kind(), e.to_string())
}

/// Applies replacements to source content, returning the modified string.
///
/// Replacements are applied from the highest offset down so earlier
/// offsets stay valid. Callers guarantee the spans do not overlap.
pub fn apply_replacements(content: &str, replacements: &[Replacement]) -> String {
    let mut sorted: Vec<&Replacement> = replacements.iter().collect();
    sorted.sort_by(|a, b| b.start.cmp(&a.start));

    let mut result = content.to_string();
    for rep in sorted {
        if rep.start <= rep.end && rep.end <= result.len() {
            result.replace_range(rep.start..rep.end, &rep.new_text);
        }
    }
    result
}

/// Computes the replacement text for `reference` pointing at `correct_path`.
///
/// Root-relative tokens stay root-relative. Relative tokens get a path from
/// the referencing file's directory, keeping a leading `./` (always present
/// for module imports). An extension the original token omitted stays
/// omitted as long as the shorter form still resolves to `correct_path`.
pub fn rewrite_token(
    reference: &Reference,
    correct_path: &Path,
    index: &FileIndex,
    config: &Config,
) -> String {
    let written = written_path(reference, correct_path, index, config);

    if reference.is_root_relative() {
        return format!("/{}", to_slash(&written));
    }

    let from_dir = reference.file.parent().unwrap_or(Path::new(""));
    let relative = relative_path(from_dir, &written);
    let keep_dot = reference.raw.starts_with("./") || config.style == ReferenceStyle::Module;
    if keep_dot && !relative.starts_with("../") {
        format!("./{relative}")
    } else {
        relative
    }
}

/// `correct_path`, minus its extension when the original token had none.
fn written_path(reference: &Reference, correct_path: &Path, index: &FileIndex, config: &Config) -> PathBuf {
    let raw_has_default_ext = Path::new(&reference.raw)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| config.is_default_extension(e));
    let correct_ext = correct_path.extension().and_then(|e| e.to_str());

    if let Some(ext) = correct_ext
        && !raw_has_default_ext
        && config.is_default_extension(ext)
    {
        let stripped = correct_path.with_extension("");
        let resolves_back = resolve(&stripped, index, config)
            .is_some_and(|entry| entry.relative == correct_path);
        if resolves_back && append_extension(&stripped, ext) == correct_path {
            return stripped;
        }
    }
    correct_path.to_path_buf()
}

/// `/`-separated path from directory `from` to `to`, both root-relative.
fn relative_path(from: &Path, to: &Path) -> String {
    let parts = |p: &Path| -> Vec<String> {
        p.components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect()
    };
    let (from, to) = (parts(from), parts(to));
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut out: Vec<String> = vec!["..".to_string(); from.len() - common];
    out.extend(to[common..].iter().cloned());
    out.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::classify;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct FailingWriter;

    impl FileWriter for FailingWriter {
        fn write(&self, _path: &Path, _contents: &str) -> std::io::Result<()> {
            Err(std::io::Error::other("disk full"))
        }
    }

    #[derive(Default)]
    struct RecordingWriter {
        writes: RefCell<Vec<PathBuf>>,
    }

    impl FileWriter for RecordingWriter {
        fn write(&self, path: &Path, contents: &str) -> std::io::Result<()> {
            self.writes.borrow_mut().push(path.to_path_buf());
            AtomicWriter.write(path, contents)
        }
    }

    fn tree(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        dir
    }

    fn broken_refs(dir: &TempDir, config: &Config) -> (FileIndex, Vec<BrokenReference>) {
        let index = FileIndex::build(dir.path(), &config.exclude).unwrap();
        let (refs, _) = crate::scanner::scan_sources(&index, config).unwrap();
        let (broken, _) = classify(&refs, &index, config);
        (index, broken)
    }

    fn read(dir: &TempDir, rel: &str) -> String {
        std::fs::read_to_string(dir.path().join(rel)).unwrap()
    }

    fn token(raw: &str, file: &str) -> Reference {
        Reference {
            raw: raw.to_string(),
            file: PathBuf::from(file),
            target: PathBuf::new(),
            line: 1,
            column: 1,
            start_offset: 0,
            end_offset: raw.len(),
        }
    }

    #[test]
    fn replaces_multiple_spans_of_different_lengths() {
        let content = "import a from './a'; import b from './bb';";
        let reps = vec![
            Replacement { start: 14, end: 19, new_text: "'./lib/a'".into() },
            Replacement { start: 35, end: 41, new_text: "'./b'".into() },
        ];
        assert_eq!(
            apply_replacements(content, &reps),
            "import a from './lib/a'; import b from './b';"
        );
    }

    #[test]
    fn empty_replacements_return_original() {
        let content = "import a from './a';";
        assert_eq!(apply_replacements(content, &[]), content);
    }

    #[test]
    fn relative_paths_between_directories() {
        assert_eq!(relative_path(Path::new(""), Path::new("util/b.ts")), "util/b.ts");
        assert_eq!(relative_path(Path::new("src/app"), Path::new("src/lib/x.js")), "../lib/x.js");
        assert_eq!(relative_path(Path::new("src"), Path::new("src/x.js")), "x.js");
        assert_eq!(relative_path(Path::new("a/b"), Path::new("c.js")), "../../c.js");
    }

    #[test]
    fn rewrite_token_keeps_token_style() {
        let index = FileIndex::from_paths(Path::new("/p"), ["util/b.ts", "docs/guide.html"]);
        let module = Config::new("/p").with_case_sensitive(true);
        let link = module.clone().with_style(ReferenceStyle::Link);

        assert_eq!(rewrite_token(&token("./b", "a.js"), Path::new("util/b.ts"), &index, &module), "./util/b");
        assert_eq!(rewrite_token(&token("./b.ts", "a.js"), Path::new("util/b.ts"), &index, &module), "./util/b.ts");
        assert_eq!(
            rewrite_token(&token("../b", "src/a.js"), Path::new("util/b.ts"), &index, &module),
            "../util/b"
        );
        assert_eq!(
            rewrite_token(&token("guide.html", "blog/p.html"), Path::new("docs/guide.html"), &index, &link),
            "../docs/guide.html"
        );
        assert_eq!(
            rewrite_token(&token("./guide.html", "docs/x/p.html"), Path::new("docs/guide.html"), &index, &link),
            "../guide.html"
        );
        assert_eq!(
            rewrite_token(&token("/guide.html", "blog/p.html"), Path::new("docs/guide.html"), &index, &link),
            "/docs/guide.html"
        );
    }

    #[test]
    fn keeps_extension_when_shorter_form_resolves_elsewhere() {
        let index = FileIndex::from_paths(Path::new("/p"), ["util/b.js", "util/b.ts"]);
        let config = Config::new("/p").with_case_sensitive(true);
        assert_eq!(
            rewrite_token(&token("./b", "a.js"), Path::new("util/b.ts"), &index, &config),
            "./util/b.ts"
        );
        assert_eq!(
            rewrite_token(&token("./b", "a.js"), Path::new("util/b.js"), &index, &config),
            "./util/b"
        );
    }

    #[test]
    fn rewrites_import_and_nothing_else() {
        let dir = tree(&[
            ("a.js", "// see './b' for details\nimport './b';\nconsole.log('done');"),
            ("util/b.ts", "export {};"),
        ]);
        let config = Config::new(dir.path()).with_case_sensitive(true);
        let (index, broken) = broken_refs(&dir, &config);
        assert_eq!(broken.len(), 1);

        let corrections = vec![Correction::new(broken[0].clone(), "util/b.ts")];
        let results = apply_corrections(&corrections, &index, &config, &AtomicWriter);
        assert_eq!(results.len(), 1);
        assert!(results[0].is_success());
        assert_eq!(results[0].rewritten, 1);

        insta::assert_snapshot!(read(&dir, "a.js"), @r"
        // see './b' for details
        import './util/b';
        console.log('done');
        ");
    }

    #[test]
    fn applying_twice_is_a_no_op() {
        let dir = tree(&[
            ("src/a.js", "import x from '../b';\nimport y from '../b';"),
            ("util/b.ts", ""),
        ]);
        let config = Config::new(dir.path()).with_case_sensitive(true);
        let (index, broken) = broken_refs(&dir, &config);
        let corrections = vec![Correction::new(broken[0].clone(), "util/b.ts")];

        let first = apply_corrections(&corrections, &index, &config, &AtomicWriter);
        assert_eq!(first[0].rewritten, 2);
        let after_first = read(&dir, "src/a.js");
        assert_eq!(after_first, "import x from '../util/b';\nimport y from '../util/b';");

        let second = apply_corrections(&corrections, &index, &config, &AtomicWriter);
        assert_eq!(second[0].rewritten, 0);
        assert!(second[0].is_success());
        assert_eq!(read(&dir, "src/a.js"), after_first);

        let (_, broken_after) = broken_refs(&dir, &config);
        assert!(broken_after.is_empty());
    }

    #[test]
    fn several_corrections_to_one_file_are_all_kept() {
        let dir = tree(&[
            ("main.js", "import a from './a';\nimport b from './b';\nimport a2 from './a';"),
            ("lib/a.js", ""),
            ("lib/long/path/to/b.js", ""),
        ]);
        let config = Config::new(dir.path()).with_case_sensitive(true);
        let (index, broken) = broken_refs(&dir, &config);
        assert_eq!(broken.len(), 2);

        let writer = RecordingWriter::default();
        let corrections = vec![
            Correction::new(broken[0].clone(), "lib/a.js"),
            Correction::new(broken[1].clone(), "lib/long/path/to/b.js"),
        ];
        let results = apply_corrections(&corrections, &index, &config, &writer);
        assert!(results.iter().all(CorrectionResult::is_success));
        assert_eq!(writer.writes.borrow().len(), 1);

        insta::assert_snapshot!(read(&dir, "main.js"), @r"
        import a from './lib/a';
        import b from './lib/long/path/to/b';
        import a2 from './lib/a';
        ");
    }

    #[test]
    fn failed_write_leaves_file_untouched() {
        let original = "import './b';\n";
        let dir = tree(&[("a.js", original), ("util/b.js", "")]);
        let config = Config::new(dir.path()).with_case_sensitive(true);
        let (index, broken) = broken_refs(&dir, &config);

        let corrections = vec![Correction::new(broken[0].clone(), "util/b.js")];
        let results = apply_corrections(&corrections, &index, &config, &FailingWriter);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].error, Some(Error::Io { .. })));
        assert_eq!(results[0].rewritten, 0);
        assert_eq!(read(&dir, "a.js"), original);
    }

    #[test]
    fn conflicting_corrections_reject_the_later_one() {
        let dir = tree(&[
            ("a.js", "import './shared';"),
            ("lib/shared.js", ""),
            ("legacy/shared.js", ""),
        ]);
        let config = Config::new(dir.path()).with_case_sensitive(true);
        let (index, broken) = broken_refs(&dir, &config);

        let corrections = vec![
            Correction::new(broken[0].clone(), "lib/shared.js"),
            Correction::new(broken[0].clone(), "legacy/shared.js"),
        ];
        let results = apply_corrections(&corrections, &index, &config, &AtomicWriter);
        assert!(results[0].is_success());
        assert!(matches!(results[1].error, Some(Error::WriteConflict { .. })));
        assert_eq!(read(&dir, "a.js"), "import './lib/shared';");
    }

    #[test]
    fn correction_outside_index_is_rejected() {
        let dir = tree(&[("a.js", "import './b';")]);
        let config = Config::new(dir.path()).with_case_sensitive(true);
        let (index, broken) = broken_refs(&dir, &config);

        let corrections = vec![Correction::new(broken[0].clone(), "nowhere/b.js")];
        let results = apply_corrections(&corrections, &index, &config, &AtomicWriter);
        assert!(matches!(results[0].error, Some(Error::InvalidCorrection { .. })));
        assert_eq!(read(&dir, "a.js"), "import './b';");
    }

    #[test]
    fn rewrites_every_referencing_file() {
        let dir = tree(&[
            ("x.html", r#"<a href="guide.html">Guide</a>"#),
            ("blog/y.html", r#"<a href="../guide.html#setup">Setup</a>"#),
            ("docs/guide.html", ""),
        ]);
        let config = Config::new(dir.path())
            .with_style(ReferenceStyle::Link)
            .with_case_sensitive(true);
        let (index, broken) = broken_refs(&dir, &config);
        assert_eq!(broken.len(), 1);

        let corrections = vec![Correction::new(broken[0].clone(), "docs/guide.html")];
        let results = apply_corrections(&corrections, &index, &config, &AtomicWriter);
        assert_eq!(results.len(), 2);
        assert_eq!(read(&dir, "x.html"), r#"<a href="docs/guide.html">Guide</a>"#);
        assert_eq!(read(&dir, "blog/y.html"), r#"<a href="../docs/guide.html#setup">Setup</a>"#);
    }

    #[cfg(unix)]
    #[test]
    fn atomic_writer_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tree(&[("run.sh", "old")]);
        let path = dir.path().join("run.sh");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        AtomicWriter.write(&path, "new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_file_is_updated_through_the_link() {
        let dir = tree(&[("store/a.js", "import './b';\n"), ("util/b.ts", "export {};")]);
        std::os::unix::fs::symlink(dir.path().join("store/a.js"), dir.path().join("a.js")).unwrap();
        let config = Config::new(dir.path())
            .with_case_sensitive(true)
            .with_exclude(vec!["store".to_string()]);
        let (index, broken) = broken_refs(&dir, &config);
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].referencing_files(), vec![Path::new("a.js")]);

        let corrections = vec![Correction::new(broken[0].clone(), "util/b.ts")];
        let results = apply_corrections(&corrections, &index, &config, &AtomicWriter);
        assert!(results[0].is_success());
        assert_eq!(results[0].rewritten, 1);

        let link = std::fs::symlink_metadata(dir.path().join("a.js")).unwrap();
        assert!(link.file_type().is_symlink());
        assert_eq!(read(&dir, "store/a.js"), "import './util/b';\n");
    }
}
