//! ref-fixer: Detect and fix broken file references.
//!
//! This tool scans a working directory for module imports or HTML links,
//! reports the ones whose targets no longer exist, and rewrites them to point
//! at the file with the same name when that file can be identified.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Args, Commands, ScanOptions};
use colored::Colorize;
use dialoguer::{Confirm, Select};
use ref_fixer::analyzer::resolve;
use ref_fixer::config::DEFAULT_EXCLUDES;
use ref_fixer::matcher::prefer_under;
use ref_fixer::rewriter::rewrite_token;
use ref_fixer::scanner::source_files;
use ref_fixer::{
    BrokenReference, Config, Correction, Diagnostics, FileIndex, ReferenceStyle, Resolution,
    apply, auto_corrections, modified_files, resolve_candidates, scan,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Detection results for `--json` output.
#[derive(Debug, Serialize)]
struct DetectionResult<'a> {
    broken: &'a [BrokenReference],
    diagnostics: &'a Diagnostics,
}

/// One reference as listed by the `references` command.
#[derive(Debug, Serialize)]
struct ReferenceListing {
    file: PathBuf,
    line: usize,
    column: usize,
    raw: String,
    target: PathBuf,
    resolved: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Commands::Detect {
            scan,
            json,
            sources,
            targets,
        } => cmd_detect(&scan, json, sources, targets, args.verbose),
        Commands::Apply {
            scan,
            write,
            interactive,
            prefer,
        } => cmd_apply(&scan, write, interactive, prefer.as_deref()),
        Commands::References { scan, json } => cmd_references(&scan, json),
        Commands::Scan { scan } => cmd_scan(&scan),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Layers command-line options over `.ref-fixer.toml` and the defaults.
fn build_config(opts: &ScanOptions) -> Result<Config> {
    let dir = match &opts.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let mut config = Config::load(&dir)
        .with_context(|| format!("Failed to load configuration for {}", dir.display()))?;

    if let Some(mode) = opts.mode {
        let style = ReferenceStyle::from(mode);
        if style != config.style {
            config = config.with_style(style);
        }
    }

    let mut exclude = config.exclude.clone();
    if opts.no_default_excludes {
        exclude.retain(|name| !DEFAULT_EXCLUDES.contains(&name.as_str()));
    }
    for name in &opts.exclude {
        if !exclude.contains(name) {
            exclude.push(name.clone());
        }
    }
    config = config.with_exclude(exclude);

    if !opts.sources_glob.is_empty() {
        config = config.with_sources(Some(opts.sources_glob.clone()));
    }
    if opts.case_sensitive {
        config = config.with_case_sensitive(true);
    } else if opts.ignore_case {
        config = config.with_case_sensitive(false);
    }
    if opts.jobs.is_some() {
        config = config.with_jobs(opts.jobs);
    }

    Ok(config)
}

fn cmd_detect(
    opts: &ScanOptions,
    json_output: bool,
    list_sources: bool,
    list_targets: bool,
    verbose: bool,
) -> Result<()> {
    let config = build_config(opts)?;
    let mut scanned = scan(&config).context("Scan failed")?;
    let broken = resolve_candidates(std::mem::take(&mut scanned.broken), &scanned.index, &config);
    scanned.diagnostics.count_resolutions(&broken);

    if json_output {
        let result = DetectionResult {
            broken: &broken,
            diagnostics: &scanned.diagnostics,
        };
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    eprintln!(
        "{} Looking for broken references in {}",
        "info:".blue().bold(),
        config.working_dir.display()
    );
    eprintln!(
        "{} Searched {} files",
        "info:".blue().bold(),
        scanned.diagnostics.files_indexed
    );
    for failure in &scanned.failures {
        eprintln!("{} {}", "warn:".yellow().bold(), failure);
    }

    if list_sources {
        let sources: BTreeSet<&Path> = scanned.references.iter().map(|r| r.file.as_path()).collect();
        println!("\n{} ({}):", "Referencing files".bold(), sources.len());
        for source in sources {
            println!("  {}", source.display());
        }
    }

    if list_targets {
        let targets: BTreeSet<&Path> = scanned
            .references
            .iter()
            .filter_map(|r| resolve(&r.target, &scanned.index, &config))
            .map(|entry| entry.relative.as_path())
            .collect();
        println!("\n{} ({}):", "Referenced files".bold(), targets.len());
        for target in targets {
            println!("  {}", target.display());
        }
    }

    print_detection_result(&broken, &scanned.diagnostics, verbose);
    Ok(())
}

fn cmd_apply(
    opts: &ScanOptions,
    write: bool,
    interactive: bool,
    prefer: Option<&Path>,
) -> Result<()> {
    let config = build_config(opts)?;
    let scanned = scan(&config).context("Scan failed")?;
    let broken = resolve_candidates(scanned.broken, &scanned.index, &config);

    let mut corrections = auto_corrections(&broken);
    for reference in broken.iter().filter(|b| b.resolution() == Resolution::Ambiguous) {
        let chosen = match prefer {
            Some(dir) => prefer_under(reference, dir, &config.working_dir),
            None => None,
        };
        let chosen = match chosen {
            Some(path) => Some(path),
            None if interactive => choose_candidate(reference)?,
            None => None,
        };
        match chosen {
            Some(path) => corrections.push(Correction::new(reference.clone(), path)),
            None => eprintln!(
                "{} {} skipped ({})",
                "warn:".yellow().bold(),
                reference.target.display(),
                reference.reason().unwrap_or_default()
            ),
        }
    }
    for reference in broken.iter().filter(|b| b.resolution() == Resolution::Unfixable) {
        eprintln!(
            "{} {} cannot be fixed ({})",
            "warn:".yellow().bold(),
            reference.target.display(),
            reference.reason().unwrap_or_default()
        );
    }

    if corrections.is_empty() {
        println!("{} No changes to apply", "info:".blue().bold());
        return Ok(());
    }

    print_planned_changes(&corrections, &scanned.index, &config, write);

    if !write {
        println!("\n{} Use --write to apply changes", "hint:".cyan().bold());
        return Ok(());
    }

    if interactive
        && !Confirm::new()
            .with_prompt("Update files to correct references?")
            .default(true)
            .interact()?
    {
        println!("{} No files changed", "info:".blue().bold());
        return Ok(());
    }

    let results = apply(&corrections, &scanned.index, &config);
    for failure in results.iter().filter_map(|r| r.error.as_ref()) {
        eprintln!("{} {}", "error:".red().bold(), failure);
    }
    let updated = modified_files(&results);
    if updated.is_empty() {
        println!("{} No files changed", "info:".blue().bold());
    } else {
        println!("\n{} {} file(s):", "Updated".green().bold(), updated.len());
        for file in updated {
            println!("  {}", file.display());
        }
    }

    Ok(())
}

/// Asks which candidate an ambiguous reference should point at.
fn choose_candidate(reference: &BrokenReference) -> Result<Option<PathBuf>> {
    let files: Vec<String> = reference
        .referencing_files()
        .iter()
        .map(|f| f.display().to_string())
        .collect();
    let mut items: Vec<String> = reference
        .candidates
        .iter()
        .map(|c| c.path.display().to_string())
        .collect();
    items.push("(skip)".to_string());

    let prompt = format!(
        "Choose the correct path for {} (referenced from {})",
        reference.target.display(),
        files.join(", ")
    );
    let choice = Select::new()
        .with_prompt(prompt)
        .items(&items)
        .default(0)
        .interact()?;

    Ok(reference.candidates.get(choice).map(|c| c.path.clone()))
}

fn print_planned_changes(corrections: &[Correction], index: &FileIndex, config: &Config, write: bool) {
    let header = if write { "Updating:" } else { "Would update:" };
    for correction in corrections {
        let correct_path = index
            .get(&correction.correct_path, config.case_sensitive)
            .map(|entry| entry.relative.clone())
            .unwrap_or_else(|| correction.correct_path.clone());
        for file in correction.broken.referencing_files() {
            println!("\n{} {}", header.yellow().bold(), file.display());
            for occurrence in correction.broken.occurrences.iter().filter(|o| o.file == file) {
                println!(
                    "  {}:{}: {} -> {}",
                    occurrence.line,
                    occurrence.column,
                    occurrence.raw.red(),
                    rewrite_token(occurrence, &correct_path, index, config).green()
                );
            }
        }
    }
}

fn cmd_references(opts: &ScanOptions, json_output: bool) -> Result<()> {
    let config = build_config(opts)?;
    let scanned = scan(&config).context("Scan failed")?;

    let listing: Vec<ReferenceListing> = scanned
        .references
        .iter()
        .map(|r| ReferenceListing {
            file: r.file.clone(),
            line: r.line,
            column: r.column,
            raw: r.raw.clone(),
            target: r.target.clone(),
            resolved: resolve(&r.target, &scanned.index, &config).map(|e| e.relative.clone()),
        })
        .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    for item in &listing {
        let loc = format!("{}:{}:{}", item.file.display(), item.line, item.column);
        match &item.resolved {
            Some(resolved) => println!("  {} {} -> {}", loc.dimmed(), item.raw, resolved.display()),
            None => println!("  {} {} {}", loc.dimmed(), item.raw.red(), "(broken)".dimmed()),
        }
    }
    println!("\n{} references", listing.len());
    Ok(())
}

fn cmd_scan(opts: &ScanOptions) -> Result<()> {
    let config = build_config(opts)?;
    let index = FileIndex::build(&config.working_dir, &config.exclude)
        .with_context(|| format!("Failed to index {}", config.working_dir.display()))?;
    let files = source_files(&index, &config)?;

    println!("Would scan {} of {} files:", files.len(), index.len());
    for file in files {
        println!("  {}", file.relative.display());
    }

    Ok(())
}

fn print_detection_result(broken: &[BrokenReference], d: &Diagnostics, verbose: bool) {
    if verbose {
        println!(
            "\n{} Files: {}, Refs: {} ({} valid, {} broken)",
            "Diagnostics:".bold(),
            d.files_indexed,
            d.total_refs,
            d.valid_refs,
            d.broken_refs
        );
        println!(
            "             Auto-resolvable: {}, Ambiguous: {}, Unfixable: {}",
            d.auto_resolvable, d.ambiguous, d.unfixable
        );
    }

    if broken.is_empty() {
        println!("{} No broken references found", "ok:".green().bold());
        return;
    }

    println!(
        "\n{} {} broken reference(s):\n",
        "Found".red().bold(),
        broken.len()
    );

    for reference in broken {
        println!("  {}", reference.target.display().to_string().red());
        for occurrence in &reference.occurrences {
            let loc = format!(
                "{}:{}:{}",
                occurrence.file.display(),
                occurrence.line,
                occurrence.column
            );
            println!("    {} {}", loc.dimmed(), occurrence.raw);
        }
        match reference.resolution() {
            Resolution::AutoResolvable => {
                if let Some(candidate) = reference.candidates.first() {
                    println!("    {} {}", "->".green(), candidate.path.display().to_string().green());
                }
            }
            Resolution::Ambiguous => {
                for candidate in &reference.candidates {
                    println!("    {} {}", "?".yellow(), candidate.path.display());
                }
            }
            Resolution::Unfixable => {
                println!(
                    "    {}",
                    format!("({})", reference.reason().unwrap_or_default()).dimmed()
                );
            }
        }
    }
}
