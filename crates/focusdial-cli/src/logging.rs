//! Structured logging for the CLI using tracing.
//!
//! Logs go to stderr so stdout stays machine-readable JSON. Log level can be
//! controlled via the `RUST_LOG` env var.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("focusdial=info,focusdial_core=info"));

    // A second init (e.g. in tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
