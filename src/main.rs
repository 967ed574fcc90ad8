//! # AGT Codec
//!
//! Command line front end for the Artemis Global Tracker message codec.
//!
//! Translates received SBD message files into JSON, decodes hex messages,
//! and builds configuration messages from a settings document.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use agt_codec::config::{Config, LoggingConfig};
use agt_codec::sbd::decoder::decode_hex;
use agt_codec::settings::TrackerSettings;
use agt_codec::telemetry::TelemetryLogger;
use agt_codec::translator::translate_files;

#[derive(Parser, Debug)]
#[command(
    name = "agt-codec",
    version,
    about = "Encode and decode Artemis Global Tracker SBD messages"
)]
struct Cli {
    /// Application configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode binary message files and print each as JSON
    Translate {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Append decoded messages to the telemetry log
        #[arg(long)]
        log: bool,
    },

    /// Decode a message given as hex
    Decode { hex: String },

    /// Build a configuration message from a settings file
    Configure { settings: PathBuf },
}

/// Main entry point for the AGT codec tool
///
/// # Errors
///
/// Returns error if:
/// - The configuration or settings file cannot be loaded
/// - A message passed to `decode` is rejected
/// - Any file passed to `translate` is rejected
fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };

    let _guard = init_logging(&config.logging)?;
    info!("AGT codec v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Translate { files, log } => run_translate(&config, &files, log),
        Command::Decode { hex } => {
            let message = decode_hex(&hex).context("decoding message")?;
            println!("{}", serde_json::to_string_pretty(&message)?);
            Ok(())
        }
        Command::Configure { settings } => {
            let settings = TrackerSettings::load(&settings)
                .with_context(|| format!("loading settings from {}", settings.display()))?;
            let message = settings.encode(&config.limits);

            println!("{}", message.to_hex());
            for diagnostic in &message.diagnostics {
                eprintln!("{}", diagnostic);
            }
            Ok(())
        }
    }
}

fn run_translate(config: &Config, files: &[PathBuf], log: bool) -> Result<()> {
    let report = translate_files(files);

    for translated in &report.decoded {
        println!("{} {}", translated.source, serde_json::to_string(&translated.message)?);
    }
    for rejected in &report.rejected {
        eprintln!("{}: Error: {} [{}]", rejected.source, rejected.error, rejected.error.code());
    }

    if log {
        if config.telemetry.enabled {
            let mut logger = TelemetryLogger::new(&config.telemetry)?;
            for translated in &report.decoded {
                logger.log(&translated.source, &translated.message)?;
            }
            logger.flush()?;
        } else {
            warn!("Telemetry logging is disabled in the configuration");
        }
    }

    if !report.rejected.is_empty() {
        bail!("{} of {} messages rejected", report.rejected.len(), report.total());
    }

    Ok(())
}

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. When a log directory is
/// configured, a daily rolling file receives the same events; the returned
/// guard must be held until exit so buffered lines are written.
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.to_ascii_lowercase()));

    let (file_layer, guard) = if logging.directory.is_empty() {
        (None, None)
    } else {
        std::fs::create_dir_all(&logging.directory)
            .with_context(|| format!("creating log directory {}", logging.directory))?;
        let file_appender = tracing_appender::rolling::daily(&logging.directory, "agt-codec.log");
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        (Some(fmt::layer().with_writer(file_writer).with_ansi(false)), Some(guard))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_translate() {
        let cli = Cli::try_parse_from(["agt-codec", "translate", "a.bin", "b.bin", "--log"]).unwrap();
        match cli.command {
            Command::Translate { files, log } => {
                assert_eq!(files, vec![PathBuf::from("a.bin"), PathBuf::from("b.bin")]);
                assert!(log);
            }
            other => panic!("Expected Translate, got: {:?}", other),
        }
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_translate_requires_files() {
        assert!(Cli::try_parse_from(["agt-codec", "translate"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["agt-codec", "decode", "0231200356de", "--config", "agt.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("agt.toml")));
        assert!(matches!(cli.command, Command::Decode { ref hex } if hex == "0231200356de"));
    }
}
