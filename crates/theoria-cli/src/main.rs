//! Theoria CLI
//!
//! - `theoria run` turns papers into schema documents (one per paper)
//! - `theoria inspect` shows extracted terms, categories, signals and the
//!   paradigm decision without writing anything
//! - `theoria validate` re-checks an emitted schema document

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use theoria_model::{DocumentFormat, SchemaDocument, ValidationReport};
use theoria_pipeline::{
    BatchRunner, Inspection, OutcomeKind, Paper, PaperResult, Pipeline, PipelineConfig,
};
use walkdir::WalkDir;

mod logging;
mod oracle;

use logging::LogFormat;
use oracle::ProviderChoice;

#[derive(Parser)]
#[command(name = "theoria")]
#[command(author, version, about = "Theoria: schemas of the theories scientific papers describe")]
struct Cli {
    /// Text oracle backend
    #[arg(long, value_enum, default_value = "auto", global = true, env = "THEORIA_PROVIDER")]
    provider: ProviderChoice,

    /// Pipeline configuration (JSON or YAML)
    #[arg(long, global = true, env = "THEORIA_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormat,

    /// Log at debug level (ignored when RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline over papers and emit one schema document each.
    ///
    /// Inputs are `.txt`/`.md` files (file stem is the citation), `.json`
    /// paper records (`{citation, annotation?, text}`), or directories of them.
    Run {
        /// Paper files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output directory (overrides `output.directory`)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Output format: json, yaml (overrides `output.format`)
        #[arg(long)]
        format: Option<String>,
        /// Papers processed concurrently (overrides `batch.paper_concurrency`)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Extract, classify and select a paradigm for one paper; writes nothing.
    Inspect {
        input: PathBuf,
        /// Print the full inspection as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate an emitted schema document against itself.
    Validate {
        input: PathBuf,
        /// Document format (default: from extension)
        #[arg(long)]
        format: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    logging::init(cli.log_format, level)?;

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Run {
            inputs,
            out,
            format,
            concurrency,
        } => {
            let mut config = config;
            if let Some(out) = out {
                config.output.directory = out;
            }
            if let Some(format) = format {
                config.output.format = parse_format(&format)?;
            }
            if let Some(concurrency) = concurrency {
                config.batch.paper_concurrency = concurrency;
            }
            let ok = runtime()?.block_on(cmd_run(config, cli.provider, &inputs))?;
            if !ok {
                std::process::exit(1);
            }
        }
        Commands::Inspect { input, json } => {
            runtime()?.block_on(cmd_inspect(config, cli.provider, &input, json))?;
        }
        Commands::Validate { input, format } => {
            if !cmd_validate(&input, format.as_deref())? {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")
}

fn parse_format(raw: &str) -> Result<DocumentFormat> {
    DocumentFormat::parse(raw).ok_or_else(|| anyhow!("unknown format `{raw}` (expected json or yaml)"))
}

// ============================================================================
// run
// ============================================================================

async fn cmd_run(config: PipelineConfig, provider: ProviderChoice, inputs: &[PathBuf]) -> Result<bool> {
    let papers = collect_papers(inputs)?;
    if papers.is_empty() {
        bail!("no papers found in {} input(s)", inputs.len());
    }

    println!(
        "{} {} paper(s) → {}",
        "Running".green().bold(),
        papers.len(),
        config.output.directory.display()
    );

    let oracle = oracle::build(provider)?;
    let runner = BatchRunner::new(Pipeline::new(config, oracle));
    let mut report = runner.run(papers).await;
    report.results.sort_by_key(|r| r.index);

    for result in &report.results {
        print_result(result);
    }

    let summary = &report.summary;
    println!(
        "{} {} total, {} success, {} partial, {} hard-fail ({} cancelled)",
        "Done.".bold(),
        summary.total,
        summary.succeeded.to_string().green(),
        summary.partial.to_string().yellow(),
        summary.hard_failed.to_string().red(),
        summary.cancelled
    );
    Ok(summary.hard_failed == 0)
}

fn print_result(result: &PaperResult) {
    let outcome = &result.outcome;
    let label = match outcome.kind() {
        OutcomeKind::Success => "success".green().bold(),
        OutcomeKind::Partial => "partial".yellow().bold(),
        OutcomeKind::HardFail => "hard-fail".red().bold(),
    };
    match (outcome.schema(), outcome.receipt()) {
        (Some(schema), receipt) => {
            println!(
                "  {label} {} [{}] {} definition(s)",
                result.citation.cyan(),
                schema.model_type.selected,
                schema.definitions.len()
            );
            if let Some(receipt) = receipt {
                let digest = receipt.sha256.get(..12).unwrap_or(&receipt.sha256);
                println!(
                    "    wrote {} ({} bytes, sha256 {digest})",
                    receipt.path.display(),
                    receipt.bytes
                );
            }
            for warning in &outcome.report().warnings {
                println!("    {} {}", "ambiguous".yellow(), warning.message);
            }
        }
        (None, _) => {
            println!("  {label} {}", result.citation.cyan());
            print_report(outcome.report(), "    ");
        }
    }
}

/// Expand directories into `.txt`, `.md` and `.json` papers, sorted by path.
fn collect_papers(inputs: &[PathBuf]) -> Result<Vec<Paper>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input).follow_links(true) {
                let entry = entry.with_context(|| format!("failed to walk {}", input.display()))?;
                if entry.file_type().is_file() && is_paper(entry.path()) {
                    paths.push(entry.into_path());
                }
            }
        } else if input.is_file() {
            paths.push(input.clone());
        } else {
            bail!("no such file or directory: {}", input.display());
        }
    }
    paths.sort();
    paths.dedup();
    paths.iter().map(|p| Paper::load(p)).collect()
}

fn is_paper(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("txt" | "md" | "json")
    )
}

// ============================================================================
// inspect
// ============================================================================

async fn cmd_inspect(config: PipelineConfig, provider: ProviderChoice, input: &Path, json: bool) -> Result<()> {
    let paper = Paper::load(input)?;
    let oracle = oracle::build(provider)?;
    let pipeline = Pipeline::new(config, oracle).without_emitter();
    let inspection = pipeline.inspect(paper).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&inspection)?);
    } else {
        print_inspection(&inspection);
    }
    Ok(())
}

fn print_inspection(inspection: &Inspection) {
    println!("{} {}", "Inspecting".green().bold(), inspection.citation.cyan());
    println!("  Terms: {}", inspection.terms.len());
    for term in &inspection.classified {
        let mut line = format!("    {} {} {}", term.id, term.name().bold(), term.category.as_str().cyan());
        if term.is_relational() {
            let domain: Vec<String> = term.domain.iter().map(|d| d.to_string()).collect();
            let range: Vec<String> = term.range.iter().map(|r| r.to_string()).collect();
            line.push_str(&format!(" ({} → {})", domain.join(", "), range.join(", ")));
        }
        if let Some(parent) = term.sub_type_of {
            line.push_str(&format!(" ⊑ {parent}"));
        }
        println!("{line}");
        for flag in &term.flags {
            println!("      {} {}", "ambiguous".yellow(), flag.describe());
        }
    }

    let signals = &inspection.signals;
    println!("  Signals:");
    println!("    relational density  {:.3}", signals.relational_density);
    println!("    subtype depth       {}", signals.max_subtype_depth);
    println!("    temporal            {:.3}", signals.temporal);
    println!("    tabular             {:.3}", signals.tabular);
    println!("    statistical         {:.3}", signals.statistical);
    println!("    causal              {:.3}", signals.causal);
    println!("    logical             {:.3}", signals.logical);
    println!("    chronology          {:.3}", signals.chronology);

    let decision = &inspection.decision;
    println!("  Scores:");
    for (model, score) in &decision.scores {
        let marker = if *model == decision.selected { "*" } else { " " };
        println!("   {marker} {:<16} {score:.4}", model.as_str());
    }
    println!("  Selected: {}", decision.selected.as_str().green().bold());
    println!("  Rationale: {}", decision.rationale);
}

// ============================================================================
// validate
// ============================================================================

fn cmd_validate(input: &Path, format: Option<&str>) -> Result<bool> {
    println!("{} {}", "Validating".green().bold(), input.display());

    let format = match format {
        Some(raw) => parse_format(raw)?,
        None => DocumentFormat::from_path(input).unwrap_or(DocumentFormat::Json),
    };
    let text = fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
    let schema = SchemaDocument::parse(&text, format)?.into_definition()?;

    println!("  Citation: {}", schema.citation.cyan());
    println!("  Model type: {}", schema.model_type.selected);
    println!("  Definitions: {}", schema.definitions.len());
    let report = theoria_pipeline::validate_standalone(&schema);
    print_report(&report, "  ");

    if report.ok {
        println!("{}", "Valid.".green());
    } else {
        println!("{}", "Invalid.".red());
    }
    Ok(report.ok)
}

fn print_report(report: &ValidationReport, indent: &str) {
    for issue in &report.errors {
        let term = issue.term_ref.as_deref().map(|t| format!("{t}: ")).unwrap_or_default();
        println!("{indent}{} [{}] {term}{}", "error".red(), issue.code, issue.message);
    }
    for issue in &report.warnings {
        println!("{indent}{} {}", "warning".yellow(), issue.message);
    }
}
