//! `FaultInjector` - Deterministic Fault Injection
//!
//! `TigerStyle`: Faults are injected from the deterministic RNG, so a seed
//! that produces a failure reproduces it exactly. Sim collaborators consult
//! the injector before every operation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::constants::DST_FAULT_PROBABILITY_MAX;
use crate::dst::rng::DeterministicRng;

/// Fault categories matching the engine's collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultType {
    /// Hot tier write fails.
    HotPutFail,
    /// Hot tier read fails.
    HotGetFail,
    /// Vector tier write fails.
    VectorPutFail,
    /// Vector tier read fails.
    VectorGetFail,
    /// Archive tier write fails.
    ArchivePutFail,
    /// Archive tier read fails.
    ArchiveGetFail,
    /// Tier delete fails (any tier).
    TierDeleteFail,
    /// Similarity search against the vector index fails.
    VectorSearchFail,
    /// Embedding generation fails.
    EmbeddingFail,
    /// Compliance checker errors out.
    ComplianceFail,
    /// Lifecycle event publish fails.
    EventPublishFail,
}

impl fmt::Display for FaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HotPutFail => "hot_put_fail",
            Self::HotGetFail => "hot_get_fail",
            Self::VectorPutFail => "vector_put_fail",
            Self::VectorGetFail => "vector_get_fail",
            Self::ArchivePutFail => "archive_put_fail",
            Self::ArchiveGetFail => "archive_get_fail",
            Self::TierDeleteFail => "tier_delete_fail",
            Self::VectorSearchFail => "vector_search_fail",
            Self::EmbeddingFail => "embedding_fail",
            Self::ComplianceFail => "compliance_fail",
            Self::EventPublishFail => "event_publish_fail",
        };
        write!(f, "{name}")
    }
}

/// Configuration for one registered fault.
#[derive(Debug, Clone)]
pub struct FaultConfig {
    /// Probability of injection per eligible operation, in `[0, 1]`.
    pub probability: f64,
    /// If set, only operations whose name contains this substring are eligible.
    pub operation_filter: Option<String>,
    /// If set, stop injecting after this many injections.
    pub max_injections: Option<u64>,
}

impl FaultConfig {
    /// Create a config that always fires on every eligible operation.
    #[must_use]
    pub fn always() -> Self {
        Self::with_probability(1.0)
    }

    /// Create a config with the given probability.
    ///
    /// # Panics
    /// Panics if `probability` is outside `[0, 1]`.
    #[must_use]
    pub fn with_probability(probability: f64) -> Self {
        assert!(
            (0.0..=DST_FAULT_PROBABILITY_MAX).contains(&probability),
            "probability must be in [0, {DST_FAULT_PROBABILITY_MAX}], got {probability}"
        );
        Self {
            probability,
            operation_filter: None,
            max_injections: None,
        }
    }

    /// Restrict injection to operations whose name contains `filter`.
    #[must_use]
    pub fn for_operation(mut self, filter: impl Into<String>) -> Self {
        self.operation_filter = Some(filter.into());
        self
    }

    /// Cap the total number of injections.
    #[must_use]
    pub fn up_to(mut self, max: u64) -> Self {
        assert!(max > 0, "max_injections must be positive");
        self.max_injections = Some(max);
        self
    }
}

#[derive(Debug, Default)]
struct FaultState {
    injected_count: u64,
}

/// Deterministic fault injector shared across sim collaborators.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    rng: Arc<Mutex<DeterministicRng>>,
    faults: Arc<Mutex<HashMap<FaultType, (FaultConfig, FaultState)>>>,
}

impl FaultInjector {
    /// Create an injector with no registered faults.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(DeterministicRng::new(seed))),
            faults: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register (or replace) the configuration for a fault type.
    pub fn register(&self, fault_type: FaultType, config: FaultConfig) {
        let mut faults = self.faults.lock().unwrap();
        faults.insert(fault_type, (config, FaultState::default()));
    }

    /// Remove a registered fault.
    pub fn unregister(&self, fault_type: FaultType) {
        let mut faults = self.faults.lock().unwrap();
        faults.remove(&fault_type);
    }

    /// Decide whether the given operation should fail now.
    ///
    /// Draws from the deterministic RNG only when the fault is registered
    /// and the operation passes the filter, keeping the RNG stream stable
    /// across unrelated operations.
    pub fn should_inject(&self, fault_type: FaultType, operation: &str) -> bool {
        let mut faults = self.faults.lock().unwrap();
        let Some((config, state)) = faults.get_mut(&fault_type) else {
            return false;
        };

        if let Some(filter) = &config.operation_filter {
            if !operation.contains(filter.as_str()) {
                return false;
            }
        }
        if let Some(max) = config.max_injections {
            if state.injected_count >= max {
                return false;
            }
        }

        let fire = self.rng.lock().unwrap().next_bool(config.probability);
        if fire {
            state.injected_count += 1;
            tracing::debug!(fault = %fault_type, operation, "fault injected");
        }
        fire
    }

    /// Injection count for one fault type.
    #[must_use]
    pub fn injection_count(&self, fault_type: FaultType) -> u64 {
        let faults = self.faults.lock().unwrap();
        faults
            .get(&fault_type)
            .map_or(0, |(_, state)| state.injected_count)
    }

    /// Total injections across all fault types.
    #[must_use]
    pub fn total_injections(&self) -> u64 {
        let faults = self.faults.lock().unwrap();
        faults.values().map(|(_, state)| state.injected_count).sum()
    }
}
