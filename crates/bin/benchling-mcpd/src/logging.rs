use benchling_core::settings::LogSettings;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Logs go to stderr because stdout carries the protocol.
///
/// `RUST_LOG` takes precedence over the configured level when it is set.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init(settings: LogSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.as_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);

    let installed = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}
