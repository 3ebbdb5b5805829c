//! Command line front end for pdf-dl

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};
use pdf_dl::{
    Config, ConsoleMonitor, DownloadManager, Error, Result, SkipPolicy, SqliteTable, TableMode,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const DEFAULT_BANDWIDTH_MBPS: u32 = 300;

/// Concurrent PDF batch downloader with fallback sources
#[derive(Debug, Parser)]
#[command(name = "pdf-dl", version, author, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v, -vv)
    #[arg(global = true, short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(global = true, short = 'q', long = "quiet", conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download every new document listed in the input table
    Run(RunArgs),
    /// Build an input table file from a JSON object of columns
    Import(ImportArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Input table file with the name and source columns
    #[arg(long, value_name = "FILE")]
    data: PathBuf,

    /// Metadata table file the report is appended to
    #[arg(long, value_name = "FILE")]
    metadata: PathBuf,

    /// Directory documents are written to (overrides the config file)
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Maximum concurrent downloads (default: config file value, else 50)
    #[arg(long)]
    threads: Option<usize>,

    /// Bandwidth hint in Mbit/s, logged only (default: config file value, else 300)
    #[arg(long)]
    bandwidth: Option<u32>,

    /// Maximum number of new documents to attempt, negative for all (default: config file value, else all)
    #[arg(long, allow_negative_numbers = true)]
    max_downloads: Option<i64>,

    /// Recreate the metadata table instead of appending to it
    #[arg(long)]
    force: bool,

    /// Attempt names that were recorded before but not downloaded
    #[arg(long)]
    retry_failed: bool,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// JSON configuration file; flags given on the command line take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ImportArgs {
    /// JSON file holding an object of `{ "header": [values...] }`
    #[arg(long, value_name = "FILE")]
    json: PathBuf,

    /// Table file to create (replaced if it exists)
    #[arg(long, value_name = "FILE")]
    table: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let outcome = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Import(args) => import(args).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "pdf-dl failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let fallback = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter = EnvFilter::try_from_env("PDF_DL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(args: &RunArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if args.config.is_none() {
        config.fetch.max_bandwidth_mbps = Some(DEFAULT_BANDWIDTH_MBPS);
    }
    if let Some(threads) = args.threads {
        config.fetch.max_concurrent_fetches = threads;
    }
    if let Some(mbps) = args.bandwidth {
        config.fetch.max_bandwidth_mbps = Some(mbps);
    }
    if let Some(limit) = args.max_downloads {
        config.max_items = Config::max_items_from_signed(limit);
    }
    if let Some(secs) = args.timeout_secs {
        config.fetch.request_timeout = Some(Duration::from_secs(secs));
    }
    if let Some(dir) = &args.output {
        config.output_dir = Some(dir.clone());
    }
    if args.retry_failed {
        config.skip_policy = SkipPolicy::DownloadedOnly;
    }
    Ok(config)
}

async fn run(args: RunArgs) -> Result<()> {
    let config = build_config(&args)?;
    let monitor = Arc::new(ConsoleMonitor::stdout(&config.progress));
    let manager = DownloadManager::new(config).await?;

    let input = SqliteTable::open(&args.data, TableMode::ReadOnly).await?;
    let mode = if args.force {
        TableMode::Create
    } else {
        TableMode::ReadWrite
    };
    let mut metadata = SqliteTable::open(&args.metadata, mode).await?;

    let summary = manager.run(&input, &mut metadata, monitor).await?;

    input.close().await;
    metadata.close().await;

    println!(
        "{} attempted ({} fallbacks): {} saved, {} failed to download, {} failed checks",
        summary.admitted + summary.fallbacks,
        summary.fallbacks,
        summary.done,
        summary.download_failed,
        summary.checking_failed,
    );
    Ok(())
}

async fn import(args: ImportArgs) -> Result<()> {
    let text = tokio::fs::read_to_string(&args.json).await?;
    let columns = parse_columns(&text)?;
    let rows = columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
    let count = columns.len();

    let table = SqliteTable::import_rows(&args.table, columns).await?;
    table.close().await;

    println!(
        "imported {count} columns, {rows} rows into {}",
        args.table.display()
    );
    Ok(())
}

fn parse_columns(text: &str) -> Result<Vec<(String, Vec<String>)>> {
    let Value::Object(map) = serde_json::from_str::<Value>(text)? else {
        return Err(Error::config("json", "expected an object of columns"));
    };

    map.into_iter()
        .map(|(header, values)| {
            let Value::Array(values) = values else {
                return Err(Error::config(
                    "json",
                    format!("column {header:?} is not an array"),
                ));
            };
            let cells = values.into_iter().map(cell_text).collect();
            Ok((header, cells))
        })
        .collect()
}

fn cell_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["pdf-dl", "run", "--data", "in.db", "--metadata", "meta.db"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Run(args) => args,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn config_file(json: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), json).unwrap();
        file
    }

    #[test]
    fn defaults_without_config_file() {
        let config = build_config(&run_args(&[])).unwrap();
        assert_eq!(config.fetch.max_concurrent_fetches, 50);
        assert_eq!(config.fetch.max_bandwidth_mbps, Some(300));
        assert_eq!(config.max_items, None);
        assert_eq!(config.skip_policy, SkipPolicy::AnyRecorded);
    }

    #[test]
    fn config_file_values_survive_without_flags() {
        let file = config_file(
            r#"{"fetch":{"max_concurrent_fetches":3,"max_bandwidth_mbps":20},"max_items":7}"#,
        );
        let path = file.path().to_str().unwrap();
        let config = build_config(&run_args(&["--config", path])).unwrap();

        assert_eq!(config.fetch.max_concurrent_fetches, 3);
        assert_eq!(config.fetch.max_bandwidth_mbps, Some(20));
        assert_eq!(config.max_items, Some(7));
    }

    #[test]
    fn flags_override_config_file() {
        let file = config_file(r#"{"fetch":{"max_concurrent_fetches":3},"max_items":7}"#);
        let path = file.path().to_str().unwrap();
        let config = build_config(&run_args(&[
            "--config",
            path,
            "--threads",
            "8",
            "--bandwidth",
            "100",
            "--max-downloads",
            "-1",
            "--timeout-secs",
            "30",
            "--output",
            "docs",
            "--retry-failed",
        ]))
        .unwrap();

        assert_eq!(config.fetch.max_concurrent_fetches, 8);
        assert_eq!(config.fetch.max_bandwidth_mbps, Some(100));
        assert_eq!(config.max_items, None);
        assert_eq!(config.fetch.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.output_dir, Some(PathBuf::from("docs")));
        assert_eq!(config.skip_policy, SkipPolicy::DownloadedOnly);
    }

    #[test]
    fn import_reads_columns_and_cell_values() {
        let columns =
            parse_columns(r#"{"BRnum":["A",null,3],"Pdf_URL":["http://a",true,""]}"#).unwrap();
        assert_eq!(
            columns,
            vec![
                (
                    "BRnum".to_string(),
                    vec!["A".to_string(), String::new(), "3".to_string()]
                ),
                (
                    "Pdf_URL".to_string(),
                    vec!["http://a".to_string(), "true".to_string(), String::new()]
                ),
            ]
        );
    }

    #[test]
    fn import_rejects_non_object_input() {
        let err = parse_columns(r#"[["A"]]"#).unwrap_err();
        assert!(err.to_string().contains("expected an object"), "{err}");
    }

    #[test]
    fn import_rejects_non_array_column() {
        let err = parse_columns(r#"{"BRnum":"A"}"#).unwrap_err();
        assert!(err.to_string().contains("\"BRnum\" is not an array"), "{err}");
    }

    #[test]
    fn import_rejects_malformed_json() {
        assert!(matches!(
            parse_columns("{not json").unwrap_err(),
            Error::Serialization(_)
        ));
    }
}
