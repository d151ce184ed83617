//! `VectorIndex` - similarity search over embedded contexts.
//!
//! The vector tier exposes this in addition to its `TierStore` surface.
//! `SimVectorIndex` is the deterministic in-memory implementation: exact
//! cosine similarity, insertion-ordered tie-breaks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::context::ContextType;
use crate::dst::{FaultInjector, FaultType};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::tier::Tier;

/// Similarity index over embedding vectors.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the vector for an id.
    async fn index(
        &self,
        id: Uuid,
        vector: Vec<f32>,
        context_type: ContextType,
    ) -> StorageResult<()>;

    /// Nearest candidates by cosine similarity, best first. Ties keep
    /// insertion order. `type_filter = None` means all types.
    async fn similar(
        &self,
        query: &[f32],
        type_filter: Option<&[ContextType]>,
        limit: usize,
        min_score: f32,
    ) -> StorageResult<Vec<(Uuid, f32)>>;

    /// Enumerate indexed ids in insertion order, without scoring. Used
    /// when search degrades to filter-only.
    async fn scan(
        &self,
        type_filter: Option<&[ContextType]>,
        limit: usize,
    ) -> StorageResult<Vec<Uuid>>;

    /// Remove an id from the index. Returns whether it was present.
    async fn remove(&self, id: Uuid) -> StorageResult<bool>;
}

#[derive(Debug, Clone)]
struct IndexedVector {
    vector: Vec<f32>,
    context_type: ContextType,
    insertion_seq: u64,
}

/// Deterministic in-memory vector index.
pub struct SimVectorIndex {
    vectors: Arc<RwLock<HashMap<Uuid, IndexedVector>>>,
    next_seq: Arc<RwLock<u64>>,
    fault_injector: Option<FaultInjector>,
}

impl SimVectorIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            vectors: Arc::new(RwLock::new(HashMap::new())),
            next_seq: Arc::new(RwLock::new(0)),
            fault_injector: None,
        }
    }

    #[must_use]
    pub fn with_fault_injector(mut self, injector: FaultInjector) -> Self {
        self.fault_injector = Some(injector);
        self
    }

    pub async fn len(&self) -> usize {
        self.vectors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn maybe_inject_fault(&self, operation: &str) -> StorageResult<()> {
        if let Some(injector) = &self.fault_injector {
            if injector.should_inject(FaultType::VectorSearchFail, operation) {
                return Err(StorageError::tier_unavailable(
                    Tier::Vector,
                    operation.to_string(),
                    "injected fault",
                ));
            }
        }
        Ok(())
    }
}

impl Default for SimVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for SimVectorIndex {
    async fn index(
        &self,
        id: Uuid,
        vector: Vec<f32>,
        context_type: ContextType,
    ) -> StorageResult<()> {
        assert!(!vector.is_empty(), "vector must not be empty");

        let mut seq = self.next_seq.write().await;
        let insertion_seq = *seq;
        *seq += 1;
        drop(seq);

        let mut vectors = self.vectors.write().await;
        vectors.insert(
            id,
            IndexedVector {
                vector,
                context_type,
                insertion_seq,
            },
        );
        Ok(())
    }

    async fn similar(
        &self,
        query: &[f32],
        type_filter: Option<&[ContextType]>,
        limit: usize,
        min_score: f32,
    ) -> StorageResult<Vec<(Uuid, f32)>> {
        assert!(!query.is_empty(), "query vector must not be empty");
        self.maybe_inject_fault("similar")?;

        let vectors = self.vectors.read().await;
        let mut scored: Vec<(Uuid, f32, u64)> = vectors
            .iter()
            .filter(|(_, v)| {
                type_filter.map_or(true, |types| types.contains(&v.context_type))
            })
            .filter(|(_, v)| v.vector.len() == query.len())
            .map(|(id, v)| {
                (
                    *id,
                    cosine_similarity(query, &v.vector),
                    v.insertion_seq,
                )
            })
            .filter(|(_, score, _)| *score >= min_score)
            .collect();

        // Best first, ties in insertion order.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.2.cmp(&b.2))
        });
        scored.truncate(limit);

        Ok(scored.into_iter().map(|(id, score, _)| (id, score)).collect())
    }

    async fn scan(
        &self,
        type_filter: Option<&[ContextType]>,
        limit: usize,
    ) -> StorageResult<Vec<Uuid>> {
        self.maybe_inject_fault("scan")?;

        let vectors = self.vectors.read().await;
        let mut entries: Vec<(Uuid, u64)> = vectors
            .iter()
            .filter(|(_, v)| {
                type_filter.map_or(true, |types| types.contains(&v.context_type))
            })
            .map(|(id, v)| (*id, v.insertion_seq))
            .collect();
        entries.sort_by_key(|(_, seq)| *seq);
        entries.truncate(limit);
        Ok(entries.into_iter().map(|(id, _)| id).collect())
    }

    async fn remove(&self, id: Uuid) -> StorageResult<bool> {
        let mut vectors = self.vectors.write().await;
        Ok(vectors.remove(&id).is_some())
    }
}

/// Cosine similarity of two equal-length vectors, in `[-1, 1]`.
/// Zero-magnitude vectors score 0.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "vectors must have equal length");

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}
