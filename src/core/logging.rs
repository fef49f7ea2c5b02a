use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::core::config::AppPaths;

const LOG_FILE_PREFIX: &str = "saia.log";
const DEFAULT_FILTER: &str = "info";

/// Installs stdout logging plus a daily-rolling file under the log dir.
///
/// The returned guard flushes the file writer on drop and must live as long
/// as the process. When the log dir cannot be created only stdout is used.
/// `RUST_LOG` overrides the default filter.
pub fn init(paths: &AppPaths) -> Option<WorkerGuard> {
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    let (file_layer, guard, dir_error) = match std::fs::create_dir_all(&paths.log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&paths.log_dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard), None)
        }
        Err(err) => (None, None, Some(err)),
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(stdout_layer)
        .with(file_layer)
        .try_init();

    match dir_error {
        Some(err) => tracing::warn!(
            "Cannot create log dir {}, logging to stdout only: {}",
            paths.log_dir.display(),
            err
        ),
        None => tracing::debug!("Writing logs to {}", paths.log_dir.display()),
    }
    guard
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
