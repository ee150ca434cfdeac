//! # Telemetry Formatter
//!
//! Format scheduled data-logger CSV telemetry into JSON.
//!
//! This application stands in for the logger's transmission scheduler: it
//! reads a CSV telemetry buffer, formats it with the configured setup
//! variables and writes the JSON payload to stdout.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::future::Future;
use std::io::Read;
use std::path::PathBuf;
use tokio::time::{interval, Duration};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use telemetry_formatter::config::{Config, LoggingConfig};
use telemetry_formatter::device::SetupVariables;
use telemetry_formatter::format::{tx_format, Transmission};

/// Input path meaning "read standard input"
const STDIN_INPUT: &str = "-";

/// Log file name prefix inside `logging.log_dir`
const LOG_FILE_PREFIX: &str = "telemetry-formatter.log";

#[derive(Parser, Debug)]
#[command(name = "telemetry-formatter", version)]
#[command(about = "Format data-logger CSV telemetry into JSON for broker publication")]
struct Cli {
    /// TOML configuration with the logger's [setup] variables
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV telemetry buffer, or "-" for stdin
    #[arg(long, default_value = STDIN_INPUT)]
    input: String,

    /// Re-format the input every schedule.interval_secs until Ctrl+C
    #[arg(long, default_value_t = false)]
    scheduled: bool,
}

/// Main entry point for the telemetry formatter
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Parse command line arguments
///    - Load configuration (defaults when no file is given)
///    - Set up logging with tracing subscriber
///
/// 2. **Formatting**
///    - One-shot: format the input once and print the payload
///    - Scheduled: format the input on every interval tick, like the
///      logger's transmission scheduler, until Ctrl+C
///
/// # Errors
///
/// Returns error if:
/// - The configuration file cannot be loaded
/// - The one-shot input cannot be read
/// - Scheduled mode is requested with stdin as input
///
/// # Examples
///
/// ```bash
/// telemetry-formatter --config station.toml --input buffer.csv
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    let _log_guard = init_logging(&config.logging);

    info!("Telemetry Formatter v{} starting...", env!("CARGO_PKG_VERSION"));

    let vars = config.variables();
    info!("Loaded {} setup variables", vars.len());

    if !cli.scheduled {
        let buffer = read_input(&cli.input)?;
        emit(&tx_format(&buffer, &vars));
        return Ok(());
    }

    if cli.input == STDIN_INPUT {
        bail!("--scheduled needs --input <PATH>; stdin can only be read once");
    }

    info!("Press Ctrl+C to exit");
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    run_scheduled(&cli.input, &vars, config.schedule.interval_secs, shutdown).await;
    Ok(())
}

/// Format the input file on every tick until `shutdown` resolves
///
/// Returns the number of transmissions sent.
async fn run_scheduled<F>(input: &str, vars: &SetupVariables, interval_secs: u64, shutdown: F) -> u64
where
    F: Future<Output = ()>,
{
    let mut tx_interval = interval(Duration::from_secs(interval_secs));
    tokio::pin!(shutdown);

    info!("Starting scheduled transmissions every {}s from {}", interval_secs, input);

    let mut tx_count: u64 = 0;

    loop {
        tokio::select! {
            _ = tx_interval.tick() => {
                // A missing buffer still produces a (empty) transmission
                let buffer = read_input(input).unwrap_or_else(|e| {
                    warn!("Could not read {}: {:#}", input, e);
                    String::new()
                });

                emit(&tx_format(&buffer, vars));
                tx_count += 1;
            }

            _ = &mut shutdown => {
                info!("Received shutdown, stopping...");
                info!("Total transmissions: {}", tx_count);
                break;
            }
        }
    }
    tx_count
}

/// Initialize the tracing subscriber
///
/// Logs go to stderr, or to a daily rolling file when `log_dir` is set, so
/// stdout only ever carries the payload. The returned guard must be held for
/// the life of the program to flush the file writer.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(rust_log.as_deref(), &logging.level);

    if logging.log_dir.is_empty() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&logging.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

/// `RUST_LOG` when set and valid, else the configured level
fn log_filter(rust_log: Option<&str>, level: &str) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level.to_lowercase()))
}

/// Read the whole telemetry buffer from a file or stdin
fn read_input(input: &str) -> Result<String> {
    if input == STDIN_INPUT {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read telemetry from stdin")?;
        return Ok(buffer);
    }

    std::fs::read_to_string(input).with_context(|| format!("Failed to read telemetry from {}", input))
}

/// Write each message of a transmission to stdout, one per line
fn emit(transmission: &Transmission) {
    for message in transmission.messages() {
        println!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["telemetry-formatter"]).unwrap();
        assert!(cli.config.is_none());
        assert_eq!(cli.input, STDIN_INPUT);
        assert!(!cli.scheduled);
    }

    #[test]
    fn test_cli_all_flags() {
        let cli = Cli::try_parse_from([
            "telemetry-formatter",
            "--config",
            "station.toml",
            "--input",
            "buffer.csv",
            "--scheduled",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("station.toml")));
        assert_eq!(cli.input, "buffer.csv");
        assert!(cli.scheduled);
    }

    #[test]
    fn test_read_input_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"2024-06-01 10:00:00,23.5\n").unwrap();
        file.flush().unwrap();

        let buffer = read_input(file.path().to_str().unwrap()).unwrap();
        assert_eq!(buffer, "2024-06-01 10:00:00,23.5\n");
    }

    #[test]
    fn test_read_input_missing_file() {
        assert!(read_input("/nonexistent/buffer.csv").is_err());
    }

    #[test]
    fn test_rust_log_overrides_config_level() {
        assert_eq!(log_filter(Some("debug"), "info").to_string(), "debug");
    }

    #[test]
    fn test_config_level_used_without_rust_log() {
        assert_eq!(log_filter(None, "WARN").to_string(), "warn");
        assert_eq!(log_filter(Some("  "), "error").to_string(), "error");
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_loop_ticks_until_shutdown() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"2024-06-01 10:00:00,23.5\n").unwrap();
        file.flush().unwrap();
        let input = file.path().to_str().unwrap().to_string();

        // Ticks fire at 0s, 1s and 2s before the shutdown at 2.5s
        let shutdown = tokio::time::sleep(Duration::from_millis(2500));
        let sent = run_scheduled(&input, &SetupVariables::new(), 1, shutdown).await;
        assert_eq!(sent, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_loop_survives_missing_input() {
        let shutdown = tokio::time::sleep(Duration::from_millis(1500));
        let sent = run_scheduled("/nonexistent/buffer.csv", &SetupVariables::new(), 1, shutdown).await;
        assert_eq!(sent, 2);
    }
}
