//! myodiag: EMG study result interpreter
//!
//! Command-line entry point. Diagnosis failures are printed as outcome values;
//! the process only exits non-zero on I/O or argument errors.

use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use myodiag::adapters::json_export::JsonExportSource;
use myodiag::adapters::memory::InMemoryCache;
use myodiag::adapters::sanitize::SanitizingMakeWriter;
use myodiag::application::{summarize, StudyResult};
use myodiag::config::{LogConfig, LogMode};
use myodiag::{MyodiagError, Normalizer, NormalizerConfig, RawResult, StudyResultService, StudyStatistics};

#[derive(Parser)]
#[command(name = "myodiag", version, about = "Interpret EMG study ML results")]
struct Cli {
    /// Influential features kept per explainability report
    #[arg(long, global = true)]
    top_features: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize one result payload (file, or stdin when omitted)
    Normalize { path: Option<PathBuf> },

    /// Normalize every study in a backend export and print statistics
    Studies { export: PathBuf },
}

#[derive(Serialize)]
struct StudiesReport {
    studies: Vec<StudyResult>,
    statistics: StudyStatistics,
}

fn main() -> Result<()> {
    // Output JSON goes to stdout, so logs never default there.
    let log_config = LogConfig::from_env();
    let use_file = match log_config.mode {
        LogMode::File => true,
        LogMode::Stdout | LogMode::Stderr => false,
        LogMode::Auto => std::io::stderr().is_terminal(),
    };

    let (writer, _guard) = if use_file {
        if let Some(parent) = log_config.file.parent().filter(|p| !p.as_os_str().is_empty()) {
            let _ = std::fs::create_dir_all(parent);
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_config.file)
            .with_context(|| format!("Failed to open log file {}", log_config.file.display()))?;
        tracing_appender::non_blocking(file)
    } else if log_config.mode == LogMode::Stdout {
        tracing_appender::non_blocking(std::io::stdout())
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(SanitizingMakeWriter::new(writer).with_max_bytes(log_config.sanitize_max_bytes)),
        )
        .init();

    for warning in &log_config.warnings {
        tracing::warn!("{}", warning);
    }

    let cli = Cli::parse();

    let mut config = NormalizerConfig::from_env();
    if let Some(n) = cli.top_features {
        if n == 0 {
            return Err(MyodiagError::Validation("--top-features must be at least 1".to_string()).into());
        }
        config = config.with_top_features(n);
    }

    match cli.command {
        Command::Normalize { path } => normalize_payload(path, &config),
        Command::Studies { export } => normalize_export(export, &config),
    }
}

fn normalize_payload(path: Option<PathBuf>, config: &NormalizerConfig) -> Result<()> {
    let text = match &path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?
        }
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read payload from stdin")?;
            text
        }
    };

    let outcome = Normalizer::new(config).normalize(Some(&RawResult::Text(text)));
    tracing::info!("Payload normalized: {:?}", outcome.display_state());

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn normalize_export(export: PathBuf, config: &NormalizerConfig) -> Result<()> {
    let service = StudyResultService::new(
        Arc::new(JsonExportSource::new(&export)),
        Arc::new(InMemoryCache::new()),
        config,
    );

    let studies = service.normalize_all()?;
    let statistics = summarize(&studies);
    tracing::info!(
        "{} studies: {} positive, {} negative, {} uninterpretable, {} awaiting results",
        statistics.total,
        statistics.positive,
        statistics.negative,
        statistics.uninterpretable,
        statistics.awaiting_results
    );

    let report = StudiesReport { studies, statistics };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
