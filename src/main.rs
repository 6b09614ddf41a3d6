//! # imdbug CLI Entry Point
//!
//! @title imdbug CLI
//! @author Ramprasad
//!
//! This module provides the main entry point for the imdbug command-line
//! vulnerability annotator.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use imdbug::cli::{AnalyzeArgs, Commands, OutputFormat};
use imdbug::report::{example_findings, FileReport, SkippedFile};
use imdbug::{default_registry, AppConfig, Annotator, Cli, ImdbugError, Language, ModelRegistry, Report, Segmenter};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

/// ASCII art banner displayed at startup.
const BANNER: &str = r#"
  _           _ _
 (_)_ __ ___ | | |__  _   _  __ _
 | | '_ ` _ \| | '_ \| | | |/ _` |
 | | | | | | |_| |_) | |_| | (_| |
 |_|_| |_| |_(_)_.__/ \__,_|\__, |
                            |___/
      Line-Level Vulnerability Annotation for C/C++
"#;

/// Application entry point.
///
/// Initializes the logging system, parses command-line arguments and
/// dispatches to the appropriate command handler. Any error ends the
/// process with a non-zero exit code.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    match cli.command {
        Commands::Analyze(args) => {
            eprintln!("{}", BANNER.cyan().bold());
            run_analyze(args, cli.config.as_deref())?;
        }
        Commands::Models { json } => {
            list_models(json, cli.config.as_deref())?;
        }
        Commands::Example => {
            println!("{}", serde_json::to_string_pretty(&example_findings())?);
        }
        Commands::Version => {
            println!(
                "{} {}",
                "imdbug version:".green(),
                env!("CARGO_PKG_VERSION").yellow()
            );
        }
    }

    Ok(())
}

/// Loads the configuration and builds the model registry from it.
fn load_registry(config_path: Option<&Path>) -> Result<(AppConfig, ModelRegistry)> {
    let (config, source) = AppConfig::discover(config_path)?;
    if let Some(source) = source {
        log::info!("Using configuration {}", source.display());
    }

    let registry = default_registry(&config).context("Failed to initialize detection models")?;
    Ok((config, registry))
}

/// Executes the annotation of a file or directory.
///
/// 1. Resolves configuration, model and segmentation depth
/// 2. Collects source files from the specified path
/// 3. Annotates each file with the selected model
/// 4. Renders the report in the requested format
fn run_analyze(args: AnalyzeArgs, config_path: Option<&Path>) -> Result<()> {
    let (config, registry) = load_registry(config_path)?;

    let label = args.model.clone().unwrap_or_else(|| config.default_model.clone());
    let label = registry.get(&label)?.label().to_string();

    let depth = args
        .max_depth
        .map(|depth| depth as usize)
        .unwrap_or(config.segment_depth);
    let language = args.language.as_deref().map(Language::from_hint).transpose()?;
    let annotator = Annotator::new(&registry, Segmenter::new(depth));

    eprintln!(
        "{} {} {}",
        "[*] Analyzing:".green().bold(),
        args.path.display().to_string().yellow(),
        format!("(model {})", label).dimmed()
    );

    let (files, skipped) = if args.path.is_file() {
        let file = annotate_file(&annotator, &args.path, args.path.display().to_string(), language, &label)?;
        (vec![file], Vec::new())
    } else if args.path.is_dir() {
        annotate_directory(&annotator, &args, language, &label)?
    } else {
        anyhow::bail!("Path not found: {}", args.path.display());
    };

    let report = Report::new(files, skipped, args.path.clone(), &label);
    emit_report(&report, args.format, args.output.as_deref())
}

/// Annotates one file. `display_path` is the name shown in the report.
fn annotate_file(
    annotator: &Annotator<'_>,
    path: &Path,
    display_path: String,
    language: Option<Language>,
    label: &str,
) -> Result<FileReport> {
    let language = match language {
        Some(language) => language,
        None => Language::from_path(path)?,
    };

    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let annotation = annotator
        .annotate_language(&source, language, label)
        .with_context(|| format!("Failed to annotate {}", path.display()))?;

    Ok(FileReport::new(
        display_path,
        annotation.language,
        &source,
        annotation.functions.len(),
        annotation.findings,
    ))
}

/// Annotates every source file below a directory.
///
/// Files the pipeline rejects as input errors are skipped; model failures
/// abort the run.
fn annotate_directory(
    annotator: &Annotator<'_>,
    args: &AnalyzeArgs,
    language: Option<Language>,
    label: &str,
) -> Result<(Vec<FileReport>, Vec<SkippedFile>)> {
    let sources = collect_source_files(&args.path, !args.no_recursive, &args.exclude)?;

    if sources.is_empty() {
        log::warn!("No C/C++ source files found in {}", args.path.display());
        return Ok((Vec::new(), Vec::new()));
    }

    let pb = ProgressBar::new(sources.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );

    let mut files = Vec::new();
    let mut skipped = Vec::new();

    for path in &sources {
        let display_path = pathdiff::diff_paths(path, &args.path)
            .unwrap_or_else(|| path.clone())
            .display()
            .to_string();
        pb.set_message(format!("Analyzing {}", display_path));

        match annotate_file(annotator, path, display_path.clone(), language, label) {
            Ok(file) => files.push(file),
            Err(e) if is_skippable(&e) => {
                pb.suspend(|| log::warn!("Skipping {}: {:#}", display_path, e));
                skipped.push(SkippedFile {
                    path: display_path,
                    reason: root_cause_message(&e),
                });
            }
            Err(e) => {
                pb.finish_and_clear();
                return Err(e);
            }
        }

        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok((files, skipped))
}

/// Input problems local to one file.
fn is_skippable(error: &anyhow::Error) -> bool {
    match error.downcast_ref::<ImdbugError>() {
        Some(e) => e.is_client_error() || matches!(e, ImdbugError::Parse(_)),
        None => error.downcast_ref::<std::io::Error>().is_some(),
    }
}

fn root_cause_message(error: &anyhow::Error) -> String {
    error.root_cause().to_string()
}

/// Collects C/C++ source files below `dir`, honoring exclude globs relative to `dir`.
fn collect_source_files(dir: &Path, recursive: bool, exclude: &[String]) -> Result<Vec<PathBuf>> {
    use walkdir::WalkDir;

    let patterns = exclude
        .iter()
        .map(|pattern| {
            glob::Pattern::new(pattern).with_context(|| format!("Invalid exclude pattern '{}'", pattern))
        })
        .collect::<Result<Vec<_>>>()?;

    let walker = if recursive {
        WalkDir::new(dir)
    } else {
        WalkDir::new(dir).max_depth(1)
    };

    let files = walker
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && Language::is_supported_path(e.path()))
        .map(|e| e.into_path())
        .filter(|path| {
            let relative = pathdiff::diff_paths(path, dir).unwrap_or_else(|| path.clone());
            !patterns.iter().any(|pattern| pattern.matches_path(&relative))
        })
        .collect();

    Ok(files)
}

/// Prints the report or writes it into `output`.
fn emit_report(report: &Report, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    if let Some(dir) = output {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let contents = match format {
            OutputFormat::Markdown => report.to_markdown()?,
            OutputFormat::Github => report.to_github_annotations(),
            OutputFormat::Terminal | OutputFormat::Json => serde_json::to_string_pretty(report)?,
        };

        let report_path = dir.join(format.report_file_name());
        std::fs::write(&report_path, contents)
            .with_context(|| format!("Failed to write {}", report_path.display()))?;

        eprintln!(
            "{} {}",
            "[+] Report saved to:".green(),
            report_path.display().to_string().yellow()
        );
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Markdown => println!("{}", report.to_markdown()?),
        OutputFormat::Github => print!("{}", report.to_github_annotations()),
        OutputFormat::Terminal => {
            report.print_terminal();
            println!("\n{}", "=".repeat(60).cyan());
            report.print_summary();
        }
    }

    Ok(())
}

/// Displays all registered detection models.
fn list_models(json: bool, config_path: Option<&Path>) -> Result<()> {
    let (config, registry) = load_registry(config_path)?;
    let models = registry.list();

    if json {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    println!("{}", "[*] Available Detection Models:".green().bold());
    println!("{}", "-".repeat(60).cyan());

    for model in models {
        let marker = if model.label == config.default_model {
            " (default)"
        } else {
            ""
        };
        let state = if model.is_loaded { "loaded" } else { "not loaded" };

        println!(
            "  {}{} [{}]",
            model.label.cyan().bold(),
            marker.green(),
            state.yellow()
        );
        println!("     {}", model.detail.dimmed());
        println!();
    }

    Ok(())
}
