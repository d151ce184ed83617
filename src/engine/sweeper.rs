//! Background sweeper.
//!
//! Runs `sweep_once` on an interval measured on the engine's clock, so
//! simulations drive it by advancing time and production runs drive it
//! with a wall-time ticker advancing the same clock.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::constants::EXPIRY_SWEEP_INTERVAL_MS_DEFAULT;
use crate::engine::ContextEngine;

/// What one sweep pass accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub archived: usize,
    pub deleted: usize,
    pub cache_entries_removed: usize,
}

/// Spawn the periodic sweep loop. The task runs until aborted.
pub fn spawn_sweeper(engine: Arc<ContextEngine>) -> JoinHandle<()> {
    spawn_sweeper_with_interval(engine, EXPIRY_SWEEP_INTERVAL_MS_DEFAULT)
}

/// # Panics
/// Panics if `interval_ms` is zero.
pub fn spawn_sweeper_with_interval(engine: Arc<ContextEngine>, interval_ms: u64) -> JoinHandle<()> {
    assert!(interval_ms > 0, "interval must be positive");
    tokio::spawn(async move {
        loop {
            engine.clock().sleep_ms(interval_ms).await;
            engine.sweep_once().await;
        }
    })
}
