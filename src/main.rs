//! Statwalker CLI - parallel filesystem metadata scanner
//!
//! Walks the given paths with a pool of workers and writes one CSV line of
//! raw stat metadata per entry.

use clap::Parser;
use console::style;
use statwalker::config::{CliArgs, ReportFormat, ScanConfig};
use statwalker::core::ScanEngine;
use statwalker::error::Result;
use statwalker::progress::ScanProgress;
use tracing_subscriber::EnvFilter;

fn main() {
    // Parse CLI arguments
    let args = CliArgs::parse();

    if args.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Handle result
    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Log to stderr around the spinner; `RUST_LOG` wins over `-v` / `-q`
fn init_logging(args: &CliArgs, progress: &ScanProgress) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match (args.quiet, args.verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "info",
            (false, 2) => "debug",
            _ => "trace",
        };
        EnvFilter::new(level)
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(progress.log_writer())
        .with_target(false)
        .init();
}

fn run(args: CliArgs) -> Result<()> {
    let text_report = !args.quiet && args.report_format == ReportFormat::Text;

    // Spinner only when a human is watching the text report
    let progress = if text_report {
        ScanProgress::new()
    } else {
        ScanProgress::disabled()
    };
    init_logging(&args, &progress);

    let config = ScanConfig::from_cli(&args)?;

    if text_report {
        progress.suspend(|| print_banner(&config));
    }

    let summary = ScanEngine::new(config).with_progress(progress).execute()?;

    match args.report_format {
        ReportFormat::Json => println!("{}", summary.to_json()?),
        ReportFormat::Text if !args.quiet => {
            summary.print_summary();
            println!("Done.");
        }
        ReportFormat::Text => {}
    }

    Ok(())
}

fn print_banner(config: &ScanConfig) {
    let rule = "/*******************************************************************/";

    println!("{}", style(rule).dim());
    println!("Command: {}", std::env::args().collect::<Vec<_>>().join(" "));
    for root in &config.roots {
        println!("Input:   {}", root.display());
    }
    println!("Output:  {}", config.output.display());
    println!("Balance: {}", config.balance);
    println!("Seed:    {}", config.seed);
    if config.sort {
        println!("Sort:    {}", config.sort);
    }
    if !config.skip.is_empty() {
        println!("Skip:    {}", config.skip.join(", "));
    }
    println!("Running with {} workers...", style(config.workers).bold());
}
