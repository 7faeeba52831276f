use tracing_appender::non_blocking::WorkerGuard;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    /// Bunyan-style JSON lines.
    Json,
}

/// Installs the global subscriber. `RUST_LOG` overrides `default_filter`.
///
/// Logs go through a non-blocking stdout writer; keep the returned guard
/// alive until exit or buffered lines are lost.
pub fn init_subscriber(name: &str, default_filter: &str, format: LogFormat) -> WorkerGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    let registry = Registry::default().with(env_filter);

    match format {
        LogFormat::Json => registry
            .with(JsonStorageLayer)
            .with(BunyanFormattingLayer::new(name.to_owned(), writer))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .init(),
    }

    guard
}

/// Default filter for the daemon, raised to `debug` by the config flag.
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "am2320_mqtt=debug,info"
    } else {
        "info"
    }
}
