//! DBC Table CLI Application
//!
//! Command-line front end for the dbc-table-codec library. It adds:
//! - TOML configuration (column mapping, identifier rule, CSV options)
//! - CSV/JSON table files
//! - Atomic output writes
//! - Parallel batch conversion

use anyhow::Result;
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod config;
mod convert;
mod table;

use config::{AppConfig, TableFormat};
use convert::Direction;

/// DBC Table - Convert CAN databases between DBC files and flat tables
#[derive(Parser, Debug)]
#[command(name = "dbc-table")]
#[command(about = "Convert CAN databases between DBC files and flat tables", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Directory for converted files (default: next to each input)
    #[arg(long, value_name = "DIR", global = true)]
    output_dir: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Flatten DBC file(s) into tables
    ToTable {
        /// DBC file(s) to convert
        #[arg(required = true, value_name = "DBC")]
        inputs: Vec<PathBuf>,

        /// Output file (only with a single input)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Table format
        #[arg(long, value_enum)]
        format: Option<TableFormat>,
    },

    /// Compose CSV table(s) into DBC files
    ToDbc {
        /// CSV file(s) to convert
        #[arg(required = true, value_name = "CSV")]
        inputs: Vec<PathBuf>,

        /// Output file (only with a single input)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Treat the first CSV row as data
        #[arg(long)]
        no_header: bool,

        /// Text of the VERSION header
        #[arg(long, value_name = "TEXT")]
        dbc_version: Option<String>,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("DBC Table CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using codec library v{}", dbc_table_codec::VERSION);

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    if let Some(dir) = &args.output_dir {
        config.output.output_dir = Some(dir.clone());
    }

    let (inputs, output, direction) = match args.command {
        Command::ToTable {
            inputs,
            output,
            format,
        } => {
            let format = format.unwrap_or(config.output.format);
            (inputs, output, Direction::ToTable(format))
        }
        Command::ToDbc {
            inputs,
            output,
            no_header,
            dbc_version,
        } => {
            if no_header {
                config.table.has_header = false;
            }
            if let Some(version) = dbc_version {
                config.codec.version = version;
            }
            (inputs, output, Direction::ToDbc)
        }
    };

    if output.is_some() && inputs.len() > 1 {
        anyhow::bail!("--output can only be used with a single input file");
    }

    run_batch(&inputs, output.as_deref(), direction, &config, args.quiet)
}

/// Convert every input, in parallel, and report each result
fn run_batch(
    inputs: &[PathBuf],
    output: Option<&Path>,
    direction: Direction,
    config: &AppConfig,
    quiet: bool,
) -> Result<()> {
    if output.is_none() {
        check_distinct_destinations(inputs, direction, config)?;
    }

    let results: Vec<(&PathBuf, Result<PathBuf>)> = inputs
        .par_iter()
        .map(|input| (input, convert::convert_file(input, output, direction, config)))
        .collect();

    let mut failures = 0;
    for (input, result) in &results {
        match result {
            Ok(written) => {
                if !quiet {
                    println!("✓ {} -> {}", input.display(), written.display());
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("✗ {}: {:#}", input.display(), e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} conversions failed", failures, results.len());
    }
    Ok(())
}

/// Fail before converting anything if two inputs would write the same file
fn check_distinct_destinations(
    inputs: &[PathBuf],
    direction: Direction,
    config: &AppConfig,
) -> Result<()> {
    let mut seen: HashMap<PathBuf, &PathBuf> = HashMap::new();
    for input in inputs {
        let destination = convert::output_path(
            input,
            config.output.output_dir.as_deref(),
            direction.extension(),
        );
        if let Some(first) = seen.insert(destination.clone(), input) {
            anyhow::bail!(
                "{:?} and {:?} would both be written to {:?}",
                first,
                input,
                destination
            );
        }
    }
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
