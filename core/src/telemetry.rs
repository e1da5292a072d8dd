use anyhow::Result;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

static SUBSCRIBER_GUARD: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber, honouring `RUST_LOG` and falling back to
/// `default_directive` (e.g. `"info"` or `"jobboard_core=debug"`).
///
/// Idempotent, so tests and binaries can call it more than once.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    if SUBSCRIBER_GUARD.get().is_some() {
        return Ok(());
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr));
    tracing::subscriber::set_global_default(subscriber)?;
    SUBSCRIBER_GUARD.set(()).ok();

    Ok(())
}
