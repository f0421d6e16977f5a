//! Tracing setup and a prelude for the task modules.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Filter via `RUST_LOG`, default `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub mod prelude {
    pub use ::tracing::{debug, error, info, trace, warn};
}
