//! Tracing setup.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global subscriber. Respects `RUST_LOG`; defaults to
/// `info` for this crate. Safe to call more than once; later calls are
/// no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("context_engine=info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_init_is_idempotent() {
        super::init();
        super::init();
    }
}
