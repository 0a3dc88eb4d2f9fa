use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use mcx::config;
use mcx::engine::Builder;
use mcx::project::{self, ProjectContext};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "mcx")]
#[command(about = "Incremental build tool for microcontroller C/C++ projects", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and link the firmware image
    Build {
        /// Optimize for flash size
        #[arg(long)]
        release: bool,
        /// Cap the worker thread count [default: all cores]
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Show detailed build commands and decisions
        #[arg(short, long)]
        verbose: bool,
    },
    /// Remove build artifacts
    Clean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Build {
            release,
            jobs,
            verbose,
        } => cmd_build(release, jobs, verbose),
        Commands::Clean => cmd_clean(),
    }
}

// --- COMMAND: Build ---
fn cmd_build(release: bool, jobs: Option<usize>, verbose: bool) -> Result<()> {
    let start_time = Instant::now();

    let config = config::load_config()?;
    let ctx = Arc::new(ProjectContext::new(config, release, verbose)?);

    let graph = match project::assemble_graph(&ctx)? {
        Some(graph) => graph,
        None => {
            println!("{} No source files found.", "!".yellow());
            return Ok(());
        }
    };

    if verbose {
        println!(
            "   {} {} sources, compiler: {}",
            "ℹ".blue(),
            graph.sources,
            ctx.compiler
        );
    }

    let mut builder = Builder::new();
    if let Some(jobs) = jobs {
        builder.set_max_threads(jobs);
    }

    let progress_ctx = Arc::clone(&ctx);
    builder.on_executing(move |jobs| {
        println!("{} Building {} targets...", "⚙".cyan(), jobs);
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-");
        let bar = ProgressBar::new(jobs as u64);
        bar.set_style(style);
        progress_ctx.set_progress(bar);
    });

    let result = builder.execute(Some(graph.root))?;
    ctx.finish_progress();

    // Persist what this build observed so the next one can answer staleness.
    ctx.depend_db
        .save(&ctx.db_path)
        .context("Failed to save dependency database")?;

    if result.total_jobs == 0 {
        println!("{} Up to date", "⚡".green());
    } else if result.success() {
        println!(
            "{} Build finished in {:.2?} ({} targets)",
            "✓".green(),
            start_time.elapsed(),
            result.completed_jobs
        );
    } else {
        println!(
            "{} Build failed ({}/{} targets completed)",
            "x".red(),
            result.completed_jobs,
            result.total_jobs
        );
        std::process::exit(1);
    }

    Ok(())
}

// --- COMMAND: Clean ---
fn cmd_clean() -> Result<()> {
    let mut cleaned = false;

    if Path::new("build").exists() {
        fs::remove_dir_all("build").context("Failed to remove build directory")?;
        cleaned = true;
    }

    if Path::new("compile_commands.json").exists() {
        fs::remove_file("compile_commands.json").context("Failed to remove compile commands")?;
        cleaned = true;
    }

    if cleaned {
        println!("{} Project cleaned (build/ & metadata removed)", "✓".green());
    } else {
        println!("{} Nothing to clean", "!".yellow());
    }
    Ok(())
}
