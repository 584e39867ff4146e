// Tracing setup

use std::sync::Once;

static INIT: Once = Once::new();

/// Install the global tracing subscriber. `GANTRY_LOG` (or the standard
/// `RUST_LOG`) controls the filter; the default is `info`. Safe to call
/// more than once.
pub fn init() {
    INIT.call_once(|| {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = std::env::var("GANTRY_LOG")
            .ok()
            .map(EnvFilter::new)
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    });
}
