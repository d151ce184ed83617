//! Simulation configuration.

/// Seed wrapper for a deterministic simulation run.
///
/// Every random decision in a simulation derives from this one seed, so
/// logging the seed is enough to reproduce a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    pub seed: u64,
}

impl SimConfig {
    /// Create with an explicit seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    /// Read the seed from `CONTEXT_ENGINE_SIM_SEED`, falling back to a
    /// random one. The chosen seed is logged either way.
    #[must_use]
    pub fn from_env_or_random() -> Self {
        let seed = std::env::var("CONTEXT_ENGINE_SIM_SEED")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or_else(rand::random);
        tracing::info!(seed, "simulation seed");
        Self { seed }
    }
}
