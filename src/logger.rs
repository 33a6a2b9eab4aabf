use snafu::ResultExt;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{registry, EnvFilter};

use crate::config::Config;
use crate::error::{ApplicationError, InitializeLoggerSnafu};

const LOG_FILE: &str = "listing-views.log";

/// Used when `RUST_LOG` is unset or unparsable. Request spans come from `tower_http`.
const DEFAULT_FILTER: &str = "info,listing_views=debug,tower_http=debug";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber: human-readable events on stdout, and one JSON object per
/// event in a daily file under `log_dir`, tagged with the span it was emitted in.
///
/// The returned guard flushes the file writer when dropped; keep it alive for the whole process.
pub fn init(config: &Config) -> Result<WorkerGuard, ApplicationError> {
    let (file_writer, guard) = tracing_appender::non_blocking(rolling::daily(&config.log_dir, LOG_FILE));

    let console = layer().pretty().with_writer(std::io::stdout);

    let file = layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_ansi(false)
        .with_writer(file_writer);

    let subscriber = registry().with(filter()).with(console).with(file);
    tracing::subscriber::set_global_default(subscriber).context(InitializeLoggerSnafu)?;

    tracing::debug!(log_dir = %config.log_dir.display(), file = LOG_FILE, "logger ready");

    Ok(guard)
}
