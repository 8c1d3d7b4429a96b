//! Console logging for the stress binary.
//!
//! Events from `jobline` (enabled through its `tracing` feature) and from
//! this binary are printed through `tracing_subscriber::fmt`. Verbosity is
//! controlled with `RUST_LOG` and defaults to `info`.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true),
        )
        .try_init()?;

    // Panic messages go through the subscriber so they share its format.
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("{info}");
    }));

    Ok(())
}
