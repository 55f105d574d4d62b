//! Command-line runner for the bundled mockery demo suites

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mockery_core::report::MemorySink;
use mockery_core::{HarnessConfig, ReportFormat, TestRunner};
use mockery_harness::{demos, run_demos, select};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "mockery-harness")]
#[command(about = "Run mock-driven demo suites with leak checking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the bundled suites
    List,

    /// Run suites by name, or every suite when none are given
    Run {
        /// Suites to run
        suites: Vec<String>,

        /// Report format (text or json)
        #[arg(short, long)]
        format: Option<ReportFormat>,

        /// Cap on bytes held by tracked blocks
        #[arg(long)]
        heap_limit: Option<usize>,

        /// Suppress per-item progress lines
        #[arg(short, long)]
        quiet: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<HarnessConfig> {
    let mut config = match path {
        Some(path) => HarnessConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    config.merge_with_env().context("applying MOCKERY_* overrides")?;
    Ok(config)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::List => {
            for demo in demos::catalog() {
                println!("{:<18} {}", demo.name, demo.description);
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Run {
            suites,
            format,
            heap_limit,
            quiet,
        } => {
            let mut config = load_config(cli.config.as_ref())?;
            if let Some(format) = format {
                config.report_format = format;
            }
            if heap_limit.is_some() {
                config.heap_limit = heap_limit;
            }
            config.quiet |= quiet;
            config.validate()?;

            let selected = select(&suites)?;
            let summary = match config.report_format {
                ReportFormat::Text => {
                    let mut runner = TestRunner::new(config);
                    run_demos(&mut runner, &selected)
                }
                ReportFormat::Json => {
                    let mut runner = TestRunner::with_sink(config, MemorySink::new());
                    let summary = run_demos(&mut runner, &selected);
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                    summary
                }
            };
            if let Some(fatal) = &summary.fatal {
                eprintln!("fatal: {fatal}");
            }
            Ok(ExitCode::from(summary.exit_code()))
        }
    }
}
