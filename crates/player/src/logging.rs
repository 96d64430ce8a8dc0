// Process-wide logger setup

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Install `env_logger` once per process.
///
/// Defaults to `info`; `RUST_LOG` overrides it. Safe to call repeatedly, and
/// a logger installed by someone else is left alone.
pub fn init_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();
    });
}
