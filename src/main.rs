//! dsync - incremental upload of local directory trees to datasets.
//!
//! Usage:
//!   dsync scan [PATH]                          Scan and export a listing
//!   dsync diff PATH --listing FILE             Compare against a saved listing
//!   dsync sync PATH --store DIR --dataset ID   Upload what changed
//!   dsync create-dataset ID --store DIR        Create an empty dataset
//!   dsync list --store DIR --dataset ID        Show dataset contents
//!   dsync hashes --store DIR --dataset ID      Fetch and compare file digests
//!   dsync --help                               Show help

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use tracing_subscriber::EnvFilter;

use datasync_core::wire::parse_listing;
use datasync_core::{ContentEntry, Listing, SyncConfig};
use datasync_diff::{DiffResult, diff};
use datasync_scan::TreeScanner;
use datasync_sync::verify::{collect_hashes, truncate_hash};
use datasync_sync::{DatasetService, ObjectStore, SyncReport, SyncSession};

#[derive(Parser)]
#[command(
    name = "dsync",
    version,
    about = "Incrementally upload local directory trees to datasets",
    long_about = "dsync compares a local file or directory with the contents of a \
                  dataset and uploads only what is new or changed.\n\n\
                  Configuration is read from the platform config directory \
                  (datasync/config.toml) unless --config is given."
)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory and export its listing as JSON
    Scan {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare a directory against a saved dataset listing
    Diff {
        /// Local directory
        path: PathBuf,

        /// Listing JSON (`{"contents": [...]}` or a bare array)
        #[arg(short, long)]
        listing: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Upload new and changed content to a dataset
    Sync {
        /// Local file or directory
        path: PathBuf,

        /// Object store directory
        #[arg(short, long)]
        store: PathBuf,

        /// Dataset identifier
        #[arg(short, long)]
        dataset: String,

        /// Listing attempts before assuming an empty dataset
        #[arg(long)]
        attempts: Option<u32>,

        /// Delay between listing attempts, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Create an empty dataset in a store
    CreateDataset {
        /// Dataset identifier
        id: String,

        /// Object store directory
        #[arg(short, long)]
        store: PathBuf,
    },

    /// Show the contents of a dataset
    List {
        /// Object store directory
        #[arg(short, long)]
        store: PathBuf,

        /// Dataset identifier (lists datasets when omitted)
        #[arg(short, long)]
        dataset: Option<String>,
    },

    /// Fetch file digests of a dataset, optionally comparing with local files
    Hashes {
        /// Object store directory
        #[arg(short, long)]
        store: PathBuf,

        /// Dataset identifier
        #[arg(short, long)]
        dataset: String,

        /// Local directory mirroring the dataset root
        #[arg(long)]
        compare_with: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Scan { path, output } => run_scan(&path, output, &config),
        Command::Diff {
            path,
            listing,
            format,
        } => run_diff(&path, &listing, format, &config),
        Command::Sync {
            path,
            store,
            dataset,
            attempts,
            delay_ms,
            format,
        } => {
            let mut config = config;
            if let Some(attempts) = attempts {
                config.listing_max_attempts = attempts.max(1);
            }
            if let Some(delay_ms) = delay_ms {
                config.listing_retry_delay_ms = delay_ms;
            }
            run_sync(&path, &store, &dataset, format, config)
        }
        Command::CreateDataset { id, store } => {
            let store = ObjectStore::open(&store).context("Cannot open store")?;
            store.create_dataset(&id)?;
            println!("{id}");
            Ok(())
        }
        Command::List { store, dataset } => run_list(&store, dataset.as_deref()),
        Command::Hashes {
            store,
            dataset,
            compare_with,
            format,
        } => run_hashes(&store, &dataset, compare_with.as_deref(), format, &config),
    }
}

/// Log to stderr, honouring `RUST_LOG` when set.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<SyncConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match SyncConfig::default_path() {
            Some(path) => path,
            None => return Ok(SyncConfig::default()),
        },
    };
    SyncConfig::load(&path).wrap_err_with(|| format!("Invalid config {}", path.display()))
}

/// Scan a directory and export its listing.
fn run_scan(path: &Path, output: Option<PathBuf>, config: &SyncConfig) -> Result<()> {
    let scanner = TreeScanner::with_config(config.scan.clone());
    let tree = scanner.scan(path).context("Scan failed")?;

    eprintln!(
        "{} - {} in {} files, {} directories ({:.2}s)",
        tree.root_path.display(),
        format_size(tree.total_size()),
        tree.stats.total_files,
        tree.stats.total_dirs,
        tree.scan_duration.as_secs_f64()
    );
    if tree.has_warnings() {
        eprintln!("{} warning(s) during scan", tree.warnings.len());
    }

    let json = serde_json::to_string_pretty(&Listing::from_entries(tree.as_listing()))?;
    match output {
        Some(output_path) => {
            std::fs::write(&output_path, json)?;
            eprintln!("Exported to {}", output_path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}

/// Compare a directory against a saved listing without uploading.
fn run_diff(path: &Path, listing: &Path, format: OutputFormat, config: &SyncConfig) -> Result<()> {
    let json = std::fs::read_to_string(listing)
        .wrap_err_with(|| format!("Cannot read {}", listing.display()))?;
    let remote = parse_listing(&json).context("Invalid listing")?;

    let scanner = TreeScanner::with_config(config.scan.clone());
    let tree = scanner.scan(path).context("Scan failed")?;
    let result = diff(&remote, tree.as_listing(), &tree.root_path);

    match format {
        OutputFormat::Text => print_diff(&result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    Ok(())
}

/// Run one sync pass against a store.
fn run_sync(
    path: &Path,
    store: &Path,
    dataset: &str,
    format: OutputFormat,
    config: SyncConfig,
) -> Result<()> {
    let store = ObjectStore::open(store)
        .context("Cannot open store")?
        .with_scan_config(config.scan.clone());
    let session = SyncSession::with_config(store, config);
    let report = session.sync(path, dataset)?;

    match format {
        OutputFormat::Text => print_report(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

fn run_list(store: &Path, dataset: Option<&str>) -> Result<()> {
    let store = ObjectStore::open(store).context("Cannot open store")?;

    let Some(dataset) = dataset else {
        for id in store.datasets()? {
            println!("{id}");
        }
        return Ok(());
    };

    let listing = store
        .get_contents(dataset)?
        .ok_or_else(|| eyre!("Dataset {dataset} not found"))?;
    println!("Contents of dataset '{dataset}':");
    print_entries(&listing.into_entries(), 1);

    Ok(())
}

fn run_hashes(
    store: &Path,
    dataset: &str,
    compare_with: Option<&Path>,
    format: OutputFormat,
    config: &SyncConfig,
) -> Result<()> {
    let store = ObjectStore::open(store).context("Cannot open store")?;
    let entries = store
        .get_contents(dataset)?
        .ok_or_else(|| eyre!("Dataset {dataset} not found"))?
        .into_entries();

    let runtime = tokio::runtime::Runtime::new()?;
    let hashes = runtime.block_on(collect_hashes(
        &store,
        dataset,
        &entries,
        compare_with,
        config.hash_poll_interval(),
        config.hash_poll_timeout(),
    ));

    match format {
        OutputFormat::Text => {
            println!("{:<50} | {:<25} | {:<10} | {:<25}", "File", "Remote", "Check", "Local");
            println!("{}", "─".repeat(120));
            for hash in &hashes {
                let remote = hash.remote.as_deref().unwrap_or("N/A");
                let (check, local) = match &hash.verdict {
                    Some(verdict) => (verdict.label(), verdict.local_digest().unwrap_or("-")),
                    None => ("-", "-"),
                };
                println!(
                    "{:<50} | {:<25} | {:<10} | {:<25}",
                    hash.path,
                    truncate_hash(remote, 20),
                    check,
                    truncate_hash(local, 20)
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&hashes)?),
    }

    Ok(())
}

fn print_diff(result: &DiffResult) {
    for missing in &result.missing_locally {
        println!("  missing  {} ({})", missing.path, missing.reason);
    }
    for extra in &result.extra_locally {
        println!("  extra    {} ({})", extra.path, format_size(extra.local.size.known_or_zero()));
    }
    for mismatch in &result.mismatches {
        println!("  changed  {} ({})", mismatch.path, mismatch.reason);
    }
    for warning in &result.warnings {
        println!("  warning  {warning}");
    }
    println!(
        "{} matched, {} missing locally, {} extra locally, {} mismatched",
        result.matched,
        result.missing_locally.len(),
        result.extra_locally.len(),
        result.mismatches.len()
    );
}

fn print_report(report: &SyncReport) {
    println!(
        "{} -> dataset {} as '{}': {:?}",
        report.local_path.display(),
        report.dataset_id,
        report.target_name,
        report.decision
    );
    if let Some(result) = &report.diff {
        print_diff(result);
    }
    for upload in &report.uploads {
        println!("  uploaded {upload}");
    }
    for skipped in &report.skipped {
        println!("  skipped  {} ({})", skipped.path, skipped.reason);
    }
    for warning in &report.warnings {
        println!("  warning  {warning}");
    }
}

fn print_entries(entries: &[ContentEntry], depth: usize) {
    let indent = "  ".repeat(depth);
    for entry in entries {
        let size = entry
            .size
            .known()
            .map(format_size)
            .unwrap_or_else(|| "unknown".to_string());
        if entry.is_dir() {
            println!("{indent}{}/ ({size})", entry.name);
            print_entries(&entry.children, depth + 1);
        } else {
            println!("{indent}{} [{}] ({size})", entry.name, entry.kind);
        }
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
