use std::{path::Path, sync::LazyLock};

use anyhow::{anyhow, Result};
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const CLI_PREFIX: &str = "cli";
pub const DAEMON_PREFIX: &str = "daemon";

const RETAINED_LOG_FILES: usize = 5;

/// Crate scoped filter. An explicit level wins over `RUST_LOG`, the fallback is `debug`.
fn crate_filter(log_level: Option<LevelFilter>) -> Result<EnvFilter> {
    let level = log_level
        .map(|v| v.to_string())
        .unwrap_or_else(|| std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".into()));
    let directive = format!("{}={level}", env!("CARGO_PKG_NAME").replace('-', "_"));
    EnvFilter::try_new(&directive).map_err(|e| anyhow!("Invalid log filter {directive:?}: {e}"))
}

/// Installs the global subscriber. The daemon writes a line per tick, so both outputs use the
/// compact single line format. Files go to `application_data_path/logs` rotated daily, stdout
/// is only attached when `show_std` is set.
pub fn enable_logging(
    prefix: &str,
    application_data_path: &Path,
    log_level: Option<LevelFilter>,
    show_std: bool,
) -> Result<()> {
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(RETAINED_LOG_FILES)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(application_data_path.join("logs"))?;

    let file_layer = fmt::layer()
        .compact()
        .with_ansi(false)
        .with_target(false)
        .with_writer(appender);
    let stdout_layer = show_std.then(|| {
        fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stdout)
    });

    tracing_subscriber::registry()
        .with(crate_filter(log_level)?)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install subscriber: {e}"))?;
    Ok(())
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .compact()
        .try_init();
});
