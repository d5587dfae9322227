use anyhow::{Context, Result};
use clap_verbosity_flag::{LogLevel, Verbosity};
use std::fs::File;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Console logging on stderr at the requested verbosity, plus an optional log file.
///
/// `RUST_LOG` overrides the level, e.g. `RUST_LOG=gvm_lib=trace` shows every
/// datagram. Keep the returned guard alive for the file to be flushed.
pub fn setup_logging<L: LogLevel>(log_file: Option<&Path>, verbosity: &Verbosity<L>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .without_time();

    let (file_layer, guard) = if let Some(path) = log_file {
        let file = File::create(path).with_context(|| format!("Failed to create log file at: {path:?}"))?;
        let (writer, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // the binary's default level, one step more per -v
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}
