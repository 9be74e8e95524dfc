//! Console logging for the binary.
//!
//! Library events are emitted through `tracing` (the `visitgrid/tracing`
//! feature) and rendered here by a pretty `fmt` layer. The level defaults to
//! `info` and follows `RUST_LOG` when it is set, e.g. `RUST_LOG=debug` shows
//! per-worker timings.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        )
        .try_init()?;
    Ok(())
}
