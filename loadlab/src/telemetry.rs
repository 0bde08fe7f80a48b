//! Logging initialization.
//!
//! Console output only, through a `tracing-subscriber` fmt layer. Verbosity follows `RUST_LOG`
//! and defaults to `info`, e.g.:
//!
//! ```bash
//! RUST_LOG=loadlab=debug,tower_http=info loadlab -f config.yaml
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber. Fails if one is already installed.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    tracing::info!("Telemetry initialized (console logging)");
    Ok(())
}
