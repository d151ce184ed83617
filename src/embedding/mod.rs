//! Embedding collaborator.
//!
//! Embedding is best-effort throughout the engine: a failed or missing
//! embedding never fails a store and only degrades search to filter-only.

use async_trait::async_trait;
use thiserror::Error;

use crate::constants::{EMBEDDING_DIMENSIONS_COUNT, EMBEDDING_TEXT_BYTES_MAX};
use crate::dst::{DeterministicRng, FaultInjector, FaultType};

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("text too large: {bytes} bytes exceeds {max}")]
    TextTooLarge { bytes: usize, max: usize },
}

impl EmbeddingError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Embedding model boundary.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed text into a fixed-dimension vector.
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;

    fn dimensions(&self) -> usize;
}

/// Deterministic embedding provider for simulation.
///
/// Derives a unit vector from the text content alone, so the same text
/// always embeds identically and similar runs reproduce bit-for-bit.
pub struct SimEmbeddingProvider {
    dimensions: usize,
    fault_injector: Option<FaultInjector>,
}

impl SimEmbeddingProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dimensions: EMBEDDING_DIMENSIONS_COUNT,
            fault_injector: None,
        }
    }

    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        assert!(dimensions > 0, "dimensions must be positive");
        self.dimensions = dimensions;
        self
    }

    #[must_use]
    pub fn with_fault_injector(mut self, injector: FaultInjector) -> Self {
        self.fault_injector = Some(injector);
        self
    }
}

impl Default for SimEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for SimEmbeddingProvider {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        if text.len() > EMBEDDING_TEXT_BYTES_MAX {
            return Err(EmbeddingError::TextTooLarge {
                bytes: text.len(),
                max: EMBEDDING_TEXT_BYTES_MAX,
            });
        }
        if let Some(injector) = &self.fault_injector {
            if injector.should_inject(FaultType::EmbeddingFail, "embed") {
                return Err(EmbeddingError::unavailable("injected fault"));
            }
        }

        // Seed an RNG from the text bytes so identical text embeds
        // identically across processes.
        let seed = text
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
                (acc ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
            });
        // Components stay non-negative so any two sim embeddings have
        // cosine similarity in [0, 1] and survive a zero min-score cutoff.
        let mut rng = DeterministicRng::new(seed);
        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|_| rng.next_float() as f32)
            .collect();

        // Normalize to unit length.
        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for x in &mut vector {
                *x /= magnitude;
            }
        }

        debug_assert_eq!(vector.len(), self.dimensions);
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
