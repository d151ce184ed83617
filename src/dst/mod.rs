//! Deterministic Simulation Testing (DST) primitives.
//!
//! `TigerStyle`: All simulation behavior derives from a single seed. A
//! failing run reproduces from `SimConfig { seed }` alone. Production code
//! paths take these types too (notably `SimClock`), so the same engine runs
//! under wall time or simulated time without branching.

mod clock;
mod config;
mod fault;
mod rng;

pub use clock::SimClock;
pub use config::SimConfig;
pub use fault::{FaultConfig, FaultInjector, FaultType};
pub use rng::DeterministicRng;
