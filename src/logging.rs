use std::path::PathBuf;

use tokio::sync::RwLock;
use tracing::{debug, info, metadata::LevelFilter, trace, Level};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{prelude::*, EnvFilter};

/// The file name prefix of the rolling log files.
pub const LOG_FILE_PREFIX: &str = "gauge-hub.log";

fn do_init(console_level: Level, file_logging: Option<(Level, PathBuf)>) {
    let mut message = String::from("Logging with: stderr");

    // RUST_LOG wins if set.
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(LevelFilter::from(console_level).to_string()));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let registry = tracing_subscriber::registry().with(console_layer);

    let maybe_file_layer = if let Some((level, output_dir)) = file_logging {
        message += &format!(", file (in dir {output_dir:?})");

        let file_appender = RollingFileAppender::new(Rotation::DAILY, output_dir, LOG_FILE_PREFIX);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_filter(LevelFilter::from(level));
        Some(file_layer)
    } else {
        None
    };

    registry.with(maybe_file_layer).init();

    debug!(message);
}

/// Initialize tracing.
///
/// Console output goes to stderr, stdout is left for events.
///
/// Will only initialize once, so tests may call this.
pub async fn init(console_level: Level, file_logging: Option<(Level, PathBuf)>) {
    static TRACING_IS_INITIALIZED: RwLock<bool> = RwLock::const_new(false);

    let initialized = { *TRACING_IS_INITIALIZED.read().await };

    if !initialized {
        let mut initialized = TRACING_IS_INITIALIZED.write().await;

        // To avoid race condition between the `.read()` and the
        // `.write()`.
        if *initialized {
            return;
        }

        do_init(console_level, file_logging);

        *initialized = true;
    }

    info!("Logging initialized");
}

/// Flush what can be flushed before exiting.
pub fn shutdown() {
    trace!("Shutting down");
}
