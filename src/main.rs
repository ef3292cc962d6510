use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use solmaalai_fst::audit::{run_audit, AuditRequest};
use solmaalai_fst::build::{build_all, verify_patches, BuildOptions, PatchPreview};
use solmaalai_fst::compiler::ExternalTools;
use solmaalai_fst::config::{self, PipelineConfig};
use solmaalai_fst::lookup::Flookup;
use solmaalai_fst::regression::{run_regressions, RegressionOptions};
use solmaalai_fst::telemetry::init_tracing;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "solmaalai-fst")]
#[command(about = "Build and validate Solmaalai FST models from vendored ThamizhiMorph sources", long_about = None)]
#[command(version)]
struct Cli {
    /// Project root (defaults to the current directory)
    #[arg(long, global = true, env = "SOLMAALAI_ROOT")]
    root: Option<PathBuf>,

    /// Pipeline config (defaults to fst/pipeline.toml, then the built-in layout)
    #[arg(long, global = true)]
    pipeline: Option<PathBuf>,

    /// More log output on stderr (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every model, distribute it and write the manifest
    Build {
        /// Keep the scratch root instead of clearing it first
        #[arg(long)]
        no_clean: bool,
    },

    /// Check patches apply to pristine sources without building
    Verify {
        /// Only check this component
        #[arg(short, long)]
        component: Option<String>,

        /// Show unified diff of each patch's changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Run the fixture regressions against the built model
    Regression {
        /// Also require the dictionary include/exclude assertions
        #[arg(long)]
        check_dictionary: bool,
    },

    /// Measure over- and under-generation and write a JSON report
    Audit {
        /// Audit definition (JSON)
        #[arg(long)]
        config: PathBuf,

        /// Lemma list, one per line
        #[arg(long)]
        lemmas: PathBuf,

        /// Dictionary word list
        #[arg(long)]
        dictionary: Option<PathBuf>,

        /// Corpus word list
        #[arg(long)]
        corpus: Option<PathBuf>,

        #[arg(long)]
        known_good: Option<PathBuf>,

        #[arg(long)]
        known_bad: Option<PathBuf>,

        /// Report path (defaults to <report_dir>/<config stem>-report.json)
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", format!("FAIL: {err}").red());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = match cli.root {
        Some(root) => root,
        None => env::current_dir().context("failed to read current directory")?,
    };
    let config = config::resolve(&root, cli.pipeline.as_deref())?;

    match cli.command {
        Commands::Build { no_clean } => cmd_build(&config, no_clean),

        Commands::Verify { component, diff } => cmd_verify(&config, component.as_deref(), diff),

        Commands::Regression { check_dictionary } => cmd_regression(&config, check_dictionary),

        Commands::Audit {
            config: audit_config,
            lemmas,
            dictionary,
            corpus,
            known_good,
            known_bad,
            report,
        } => {
            let mut request = AuditRequest::new(&config, absolute(&audit_config)?, absolute(&lemmas)?);
            if let Some(path) = dictionary {
                request.dictionary = absolute(&path)?;
            }
            if let Some(path) = known_good {
                request.known_good = absolute(&path)?;
            }
            if let Some(path) = known_bad {
                request.known_bad = absolute(&path)?;
            }
            request.corpus = corpus.as_deref().map(absolute).transpose()?;
            request.report = report.as_deref().map(absolute).transpose()?;
            cmd_audit(&config, &request)
        }
    }
}

/// Command-line paths are relative to the working directory, not the root.
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(env::current_dir()
        .context("failed to read current directory")?
        .join(path))
}

fn cmd_build(config: &PipelineConfig, no_clean: bool) -> Result<()> {
    let backend = ExternalTools::new(config.tools.clone());
    let outcome = build_all(config, &backend, BuildOptions { clean: !no_clean })?;

    println!("{}", "✓ FST build completed".green());
    println!("Vendor commit: {}", outcome.manifest.vendor_revision.commit);
    println!("Models built: {}", outcome.manifest.outputs.len());
    println!("Manifest: {}", outcome.manifest_path.display());
    Ok(())
}

fn cmd_verify(config: &PipelineConfig, component: Option<&str>, show_diff: bool) -> Result<()> {
    let previews = verify_patches(config, component)?;

    if previews.is_empty() {
        println!("{}", "No patches configured".yellow());
        return Ok(());
    }

    for preview in &previews {
        println!(
            "  {} {}: {} ({} file{})",
            "✓".green(),
            preview.component,
            preview.patch,
            preview.changes.len(),
            if preview.changes.len() == 1 { "" } else { "s" }
        );
        if show_diff {
            display_diff(preview);
        }
    }

    println!();
    println!("{}", format!("✓ {} patches apply cleanly", previews.len()).green());
    Ok(())
}

/// Show unified diff of every file a patch changes
fn display_diff(preview: &PatchPreview) {
    for change in &preview.changes {
        let before = change.before.as_deref().unwrap_or("");
        let after = change.after.as_deref().unwrap_or("");
        println!(
            "\n{}",
            format!("--- {} (pristine)", change.path.display()).dimmed()
        );
        println!("{}", format!("+++ {} (patched)", change.path.display()).dimmed());

        let diff = TextDiff::from_lines(before, after);
        for op in diff.iter_all_changes() {
            let line = match op.tag() {
                ChangeTag::Delete => format!("-{}", op).red(),
                ChangeTag::Insert => format!("+{}", op).green(),
                ChangeTag::Equal => continue,
            };
            print!("{}", line);
        }
    }
}

fn cmd_regression(config: &PipelineConfig, check_dictionary: bool) -> Result<()> {
    let lookup = Flookup::new(&config.tools);
    let summary = run_regressions(config, &lookup, RegressionOptions { check_dictionary })?;
    let counts = &summary.consistency;

    println!("{}", "PASS: FST regressions".green());
    println!("PASS: lexicon lemmas={} duplicates=0", summary.lexicon_lemmas);
    println!(
        "PASS: inverse checks={} forward-good={}",
        counts.inverse_checks, counts.forward_good
    );
    println!(
        "PASS: rejected-bad={} leaked-bad={}",
        counts.rejected_bad, counts.leaked_bad
    );
    if let Some(checked) = counts.dictionary_checked {
        println!("PASS: dictionary include/exclude checks ({checked} words)");
    }
    Ok(())
}

fn cmd_audit(config: &PipelineConfig, request: &AuditRequest) -> Result<()> {
    let lookup = Flookup::new(&config.tools);
    let outcome = run_audit(config, &lookup, request)?;
    let report = &outcome.report;

    println!(
        "Generated {} forms ({} unique) from {} queries",
        report.generated_total, report.generated_unique, report.query_count
    );
    if !report.known_bad_present.is_empty() {
        println!(
            "{}",
            format!("Known-bad forms generated: {}", report.known_bad_present.len()).yellow()
        );
    }
    println!("Wrote report: {}", outcome.report_path.display());
    Ok(())
}
