//! `readorder` CLI - Rebuild reading order for fixed-layout EPUB pages

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use readorder::{Config, JobRegistry, Processor, Progress, Stage};

#[derive(Parser)]
#[command(name = "readorder")]
#[command(about = "Reconstruct reading order and accessible structure for EPUB content pages")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    options: Options,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Options {
    /// Config file (default: <config dir>/readorder/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Title that marks a feature callout (repeatable)
    #[arg(long = "feature-title", global = true)]
    feature_titles: Vec<String>,

    /// Heading text eligible for promotion to the page title (repeatable)
    #[arg(long = "heading", global = true)]
    headings: Vec<String>,

    /// Do not patch source files
    #[arg(long, global = true)]
    no_patch: bool,

    /// Write a .bak copy before patching
    #[arg(long, global = true)]
    backup: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a single HTML/XHTML file
    File {
        /// Source file
        path: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "reading-order")]
        output: PathBuf,
    },

    /// Process every HTML/XHTML file under a folder
    Folder {
        /// Input folder
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "reading-order")]
        output: PathBuf,
    },

    /// Print the linearized text of a file without writing anything
    Text {
        /// Source file
        path: PathBuf,

        /// Print the rebuilt markup instead
        #[arg(long)]
        markup: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.options.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = load_config(&cli.options)?;
    let processor = Processor::new(config);

    match cli.command {
        Commands::File { path, output } => cmd_file(&processor, &path, &output)?,
        Commands::Folder { input, output } => cmd_folder(&processor, &input, &output)?,
        Commands::Text { path, markup } => cmd_text(&processor, &path, markup)?,
    }

    Ok(())
}

fn load_config(options: &Options) -> Result<Config> {
    let mut config = Config::load(options.config.as_deref()).context("Failed to load config")?;
    config.feature_titles.extend(options.feature_titles.iter().cloned());
    config.heading_candidates.extend(options.headings.iter().cloned());
    if options.no_patch {
        config.patch.enabled = false;
    }
    if options.backup {
        config.patch.backup = true;
    }
    Ok(config)
}

fn cmd_file(processor: &Processor, path: &Path, output: &Path) -> Result<()> {
    let report = processor
        .process_file(path, output)
        .with_context(|| format!("Failed to process {}", path.display()))?;

    println!("📄 {}", report.source_path.display());
    println!("   HTML: {}", report.output_html_path.display());
    println!("   Text: {}", report.output_txt_path.display());
    match &report.page_number {
        Some(page) => println!("   Page: {page}"),
        None => println!("   Page: (none)"),
    }
    let mark = if report.patched { "✅" } else { "⚠️" };
    println!("   {mark} {}", report.patch_note);
    Ok(())
}

fn cmd_folder(processor: &Processor, input: &Path, output: &Path) -> Result<()> {
    let registry = JobRegistry::new();
    let job = registry.create();
    job.scanning();

    let mut on_progress = |p: &Progress| {
        job.file_progress(p);
        if p.stage == Stage::Processed && p.current == p.total {
            job.writing_report();
        }
        let status = job.status();
        info!(percent = status.percent, "{}", status.message);
    };

    let result = processor.process_folder(input, output, Some(&mut on_progress));
    let report = match result {
        Ok(report) => {
            job.complete();
            report
        }
        Err(e) => {
            job.fail(&e.to_string());
            registry.dispose(job.id());
            return Err(e).with_context(|| format!("Failed to process {}", input.display()));
        }
    };
    registry.dispose(job.id());

    let Some(summary) = report.summary_path else {
        println!("No .html or .xhtml files under {}", input.display());
        return Ok(());
    };

    let with_footer = report.rows.iter().filter(|r| r.has_footer).count();
    let patched = report.rows.iter().filter(|r| r.patched).count();
    println!("📚 Processed {} file(s)", report.rows.len());
    println!("   Footers: {with_footer}");
    println!("   Patched: {patched}");
    println!("   Report:  {}", summary.display());
    Ok(())
}

fn cmd_text(processor: &Processor, path: &Path, markup: bool) -> Result<()> {
    let (_, result) = processor
        .reconstruct_file(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if markup {
        println!("{}", result.markup());
    } else {
        println!("{}", result.text);
    }
    Ok(())
}
