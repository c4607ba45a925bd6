//! Command-line entry point
//!
//! `feedback-collector [CONFIG_PATH]` runs one collection pass and writes the
//! CSV, JSON and summary outputs. Ctrl-C stops pagination early; whatever was
//! collected so far is still written.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use feedback_collector::infrastructure::init_logging_with_config;
use feedback_collector::{CollectionPipeline, ConfigManager, ResultWriter};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = ConfigManager::new(config_path)
        .load()
        .context("Failed to load configuration")?;

    if let Err(e) = init_logging_with_config(&config.logging) {
        eprintln!("Logging unavailable: {e:#}");
    }
    info!("🚀 Feedback collector starting");

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interrupt received, finishing with the records collected so far");
            ctrl_c.cancel();
        }
    });

    let writer = ResultWriter::new(config.output.clone());
    let pipeline = CollectionPipeline::new(config).context("Invalid configuration")?;
    let report = pipeline.run(&cancel).await;

    let written = writer.write(&report.records, &report.summary);
    println!("{}", report.summary);
    for path in written.written() {
        println!("  wrote {}", path.display());
    }

    if written.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        for failure in written.failures() {
            error!("❌ {}", failure);
        }
        Ok(ExitCode::FAILURE)
    }
}
