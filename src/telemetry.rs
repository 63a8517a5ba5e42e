//! Telemetry initialization - tracing with a console fmt subscriber.
//!
//! The log level is controlled through the standard `RUST_LOG` environment
//! variable and defaults to `info`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the tracing subscriber for the process.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    Ok(())
}
