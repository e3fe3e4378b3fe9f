//! Subtrack Core Library
//!
//! Subtitle track engine for a video editor timeline.
//! This library contains the subtitle store, the command system with undo/redo,
//! the subtitle file codecs and the render output.

pub mod core;

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;

/// Log file name prefix inside the log directory
pub const LOG_FILE_NAME: &str = "subtrack.log";

/// Installs the global tracing subscriber.
///
/// Logs go to stderr, and also to a daily rolling file when `log_dir` is given. `RUST_LOG`
/// overrides `default_level`. The returned guard flushes the file writer on drop, so keep
/// it alive for the life of the process.
pub fn init_logging(log_dir: Option<&Path>, default_level: tracing::Level) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions));

    let (file_layer, guard) = match log_dir {
        Some(dir) if std::fs::create_dir_all(dir).is_ok() => {
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer);

    // Already initialized (tests, embedding hosts)
    let _ = tracing::subscriber::set_global_default(subscriber);
    guard
}
