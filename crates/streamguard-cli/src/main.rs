mod checks_doc;
mod constructor;
mod errors;
mod logging;
mod parser;
mod runner;
mod writer;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use streamguard_core::CheckRegistry;

use crate::{
    checks_doc::checks_documentation,
    logging::{init_logging, parse_level, LoggingConfig},
    runner::{run, RunOptions},
};

/// Output format for validation results
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Print results to standard output (human-readable)
    Stdout,
    /// Output results in JSON format
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "streamguard",
    version,
    about = "StreamGuard - streaming data-quality checks for CSV and Parquet files",
    long_about = "StreamGuard reads a data file once and runs every configured check over it, \
                  either on all rows or on a uniform sample. Uniqueness checks stay exact on \
                  files larger than memory by spilling keys to disk.\n\n\
                  Example usage:\n  \
                  streamguard --config checks.toml --output json --output-path reports/"
)]
struct Args {
    /// Path to the TOML configuration file declaring the source and its checks
    #[arg(short, long, value_name = "FILE", required_unless_present = "list_checks")]
    config: Option<PathBuf>,

    /// Output format for validation results
    #[arg(short, long, value_enum, default_value = "stdout")]
    output: OutputFormat,

    /// File or directory receiving the JSON report, stdout when omitted
    #[arg(long, value_name = "PATH")]
    output_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// List the available check kinds and their parameters
    #[arg(long)]
    list_checks: bool,

    /// Enable debug mode with detailed error backtraces and stack traces
    #[arg(short, long)]
    debug: bool,
}

fn execute(args: Args) -> Result<bool> {
    let level = parse_level(&args.log_level)?;
    init_logging(
        &LoggingConfig::default()
            .with_level(level)
            .with_json_format(args.log_json),
    )?;

    if args.list_checks {
        print!("{}", checks_documentation(&CheckRegistry::with_builtin()));
        return Ok(true);
    }
    let Some(config) = args.config else {
        anyhow::bail!("--config is required");
    };
    run(&RunOptions {
        config,
        output: args.output,
        output_path: args.output_path,
    })
}

fn main() {
    let args = Args::parse();

    // Enable backtraces in debug mode
    if args.debug {
        std::env::set_var("RUST_BACKTRACE", "1");
    }

    match execute(args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            if std::env::var("RUST_BACKTRACE").is_ok() {
                eprintln!("Error: {:?}", err);
            } else {
                eprintln!("Error: {:#}", err);
                eprintln!("\nHint: Run with --debug flag for detailed stack traces");
            }
            std::process::exit(1);
        }
    }
}
