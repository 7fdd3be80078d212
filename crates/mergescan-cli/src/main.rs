//! mergescan CLI: ordered scans over pre-sorted Parquet files.

use clap::{Parser, Subcommand, ValueEnum};
use mergescan_core::config::ScanConfig;
use mergescan_core::manifest::ScanManifest;
use mergescan_exec::replay::replay;
use mergescan_exec::Engine;
use mergescan_io::{BatchSink, CsvWriter, JsonlWriter};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mergescan")]
#[command(about = "Ordered k-way merge scan over pre-sorted Parquet files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the files on the ordering column and print the rows
    Scan {
        /// Input Parquet file (repeat for more files)
        #[arg(short, long = "file", required = true)]
        files: Vec<String>,

        /// Column every file is already sorted on
        #[arg(long)]
        order_by: String,

        /// Write rows here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output row format
        #[arg(long, value_enum, default_value_t = Format::Jsonl)]
        format: Format,

        /// YAML file with scan settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the scan manifest as JSON to this path
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Rows per decoded source batch (overrides config)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Row cap for one merged batch (overrides config)
        #[arg(long)]
        max_rows_per_call: Option<usize>,

        /// Initial output batch capacity (overrides config)
        #[arg(long)]
        base_capacity: Option<usize>,
    },

    /// Print the reconciled schema of a set of files
    Schema {
        /// Input Parquet file (repeat for more files)
        #[arg(short, long = "file", required = true)]
        files: Vec<String>,

        /// Column every file is already sorted on
        #[arg(long)]
        order_by: String,
    },

    /// Re-run the scan recorded in a manifest and compare the results
    Verify {
        /// Path to a manifest written by `scan --manifest`
        #[arg(short, long)]
        manifest: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Jsonl,
    Csv,
}

/// Scan settings as read from a YAML file; absent keys keep the current value.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    batch_size: Option<usize>,
    base_output_capacity: Option<usize>,
    max_rows_per_call: Option<usize>,
}

/// Command-line overrides; applied last.
#[derive(Debug, Default)]
struct Overrides {
    batch_size: Option<usize>,
    max_rows_per_call: Option<usize>,
    base_capacity: Option<usize>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            files,
            order_by,
            output,
            format,
            config,
            manifest,
            batch_size,
            max_rows_per_call,
            base_capacity,
        } => {
            let overrides = Overrides {
                batch_size,
                max_rows_per_call,
                base_capacity,
            };
            if let Err(e) = run_scan(
                &files,
                &order_by,
                output.as_deref(),
                format,
                config.as_deref(),
                manifest.as_deref(),
                &overrides,
            ) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Schema { files, order_by } => {
            if let Err(e) = show_schema(&files, &order_by) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Verify { manifest } => match verify_manifest(&manifest) {
            Ok(true) => println!("✓ Scan reproduces the manifest"),
            Ok(false) => {
                eprintln!("Verification failed: scan no longer matches the manifest");
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
    }
}

fn run_scan(
    files: &[String],
    order_by: &str,
    output: Option<&Path>,
    format: Format,
    config_path: Option<&Path>,
    manifest_path: Option<&Path>,
    overrides: &Overrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path, overrides)?;
    tracing::debug!(?config, "resolved scan config");

    let engine = Engine::parquet(config)?;
    let bind = engine.bind(files, order_by)?;

    let mut sink = open_sink(output, format)?;
    let manifest = engine.run(&bind, sink.as_mut())?;

    if let Some(path) = manifest_path {
        fs::write(path, manifest.to_json_pretty()?)?;
    }

    eprintln!("✓ Scan finished");
    eprintln!("  Rows: {}", manifest.rows);
    eprintln!(
        "  Batches: {} ({} fast path)",
        manifest.batches, manifest.fast_path_batches
    );
    eprintln!("  Duration: {}ms", manifest.duration_ms());
    eprintln!("  Bind hash: {}", manifest.bind_hash);

    Ok(())
}

fn show_schema(files: &[String], order_by: &str) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Engine::parquet(ScanConfig::from_env())?;
    let bind = engine.bind(files, order_by)?;

    println!("Reconciled Schema");
    println!("=================");
    for field in &bind.schema.fields {
        let marker = if field.name == bind.order_by { " (order)" } else { "" };
        println!("  {}: {}{}", field.name, field.data_type, marker);
    }
    println!();
    println!("Sources:");
    for (i, source) in bind.sources.iter().enumerate() {
        println!(
            "  {}. {} - {} of {} columns",
            i + 1,
            source.path,
            source.leaves.len(),
            bind.schema.len()
        );
    }

    Ok(())
}

fn verify_manifest(path: &Path) -> Result<bool, Box<dyn std::error::Error>> {
    let manifest = ScanManifest::from_json(&fs::read_to_string(path)?)?;
    let engine = Engine::parquet(ScanConfig::from_env())?;
    let report = replay(&engine, &manifest)?;

    println!("Manifest {}", manifest.id.0);
    println!("  Files: {}", manifest.files.join(", "));
    println!("  Bind hash: {} (now {})", report.expected_hash, report.actual_hash);
    println!("  Rows: {} (now {})", report.expected_rows, report.actual_rows);
    Ok(report.is_match())
}

fn open_sink(
    output: Option<&Path>,
    format: Format,
) -> Result<Box<dyn BatchSink>, Box<dyn std::error::Error>> {
    let sink: Box<dyn BatchSink> = match (output, format) {
        (Some(path), Format::Jsonl) => Box::new(JsonlWriter::to_path(&path.to_string_lossy())?),
        (Some(path), Format::Csv) => Box::new(CsvWriter::to_path(&path.to_string_lossy())?),
        (None, Format::Jsonl) => Box::new(JsonlWriter::to_writer(std::io::stdout())),
        (None, Format::Csv) => Box::new(CsvWriter::to_writer(std::io::stdout())),
    };
    Ok(sink)
}

/// Resolve the scan config: defaults, then environment, then the YAML file,
/// then command-line flags.
fn load_config(
    path: Option<&Path>,
    overrides: &Overrides,
) -> Result<ScanConfig, Box<dyn std::error::Error>> {
    let mut config = ScanConfig::from_env();
    if let Some(path) = path {
        let doc: ConfigFile = serde_yaml::from_str(&fs::read_to_string(path)?)?;
        apply_config_file(&mut config, &doc);
    }
    apply_overrides(&mut config, overrides);
    config.validate()?;
    Ok(config)
}

fn apply_config_file(cfg: &mut ScanConfig, doc: &ConfigFile) {
    if let Some(n) = doc.batch_size {
        cfg.batch_size = n;
    }
    if let Some(n) = doc.base_output_capacity {
        cfg.base_output_capacity = n;
    }
    if let Some(n) = doc.max_rows_per_call {
        cfg.max_rows_per_call = n;
    }
}

fn apply_overrides(cfg: &mut ScanConfig, overrides: &Overrides) {
    if let Some(n) = overrides.batch_size {
        cfg.batch_size = n;
    }
    if let Some(n) = overrides.base_capacity {
        cfg.base_output_capacity = n;
    }
    if let Some(n) = overrides.max_rows_per_call {
        cfg.max_rows_per_call = n;
    }
}
