//! Tier identity, records, and the `TierStore` collaborator trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::error::StorageResult;

/// Storage tier identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Low-latency cache. First probe on reads, promotion target.
    Hot,
    /// Similarity index. Default write target, first store fallback.
    Vector,
    /// Durable store. Read-path only unless explicitly targeted; never an
    /// automatic store fallback.
    Archive,
}

impl Tier {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Vector => "vector",
            Self::Archive => "archive",
        }
    }

    /// Probe order for reads.
    #[must_use]
    pub fn retrieve_order() -> &'static [Self] {
        &[Self::Hot, Self::Vector, Self::Archive]
    }

    /// Fallback order for writes. Archive is deliberately absent so that
    /// transient data can never become durable-forever by accident.
    #[must_use]
    pub fn store_fallback_order() -> &'static [Self] {
        &[Self::Vector, Self::Hot]
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The on-tier representation. The tier store exclusively owns the bytes;
/// the orchestrator never mutates a record in place, only overwrites or
/// deletes by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierRecord {
    pub id: Uuid,
    pub payload: Vec<u8>,
    pub tier: Tier,
    pub written_at: DateTime<Utc>,
}

impl TierRecord {
    #[must_use]
    pub fn new(id: Uuid, payload: Vec<u8>, tier: Tier, written_at: DateTime<Utc>) -> Self {
        assert!(!payload.is_empty(), "payload must not be empty");
        Self {
            id,
            payload,
            tier,
            written_at,
        }
    }

    #[must_use]
    pub fn payload_bytes(&self) -> usize {
        self.payload.len()
    }
}

/// One storage tier, seen through a uniform interface.
///
/// Three instances are wired into the orchestrator: Hot, Vector, Archive.
/// Retry policy belongs to the implementation behind this trait, never to
/// the orchestrator, so fallback ordering stays deterministic.
#[async_trait]
pub trait TierStore: Send + Sync {
    /// Which tier role this store fills.
    fn tier(&self) -> Tier;

    /// Write a record, overwriting any existing record for the id.
    /// `ttl_ms = None` means the record never expires at the tier level.
    async fn put(&self, record: TierRecord, ttl_ms: Option<u64>) -> StorageResult<()>;

    /// Read a record by id. Absent and tier-level-expired both read as
    /// `None`.
    async fn get(&self, id: Uuid) -> StorageResult<Option<TierRecord>>;

    /// Delete by id. Returns whether a record was present.
    async fn delete(&self, id: Uuid) -> StorageResult<bool>;
}
