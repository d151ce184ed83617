//! Operation log - bounded audit ring buffer.
//!
//! Every tier probe, write, promotion, and collaborator call appends a
//! record here. The log is metrics/audit only: nothing reads it back for
//! control decisions. Oldest records are evicted on overflow.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{OPLOG_ERROR_BYTES_MAX, OPLOG_RECORDS_COUNT_MAX};
use crate::storage::tier::Tier;

/// Operation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    TierPut,
    TierGet,
    TierDelete,
    Promotion,
    Embedding,
    Compliance,
    VectorSearch,
    CacheLookup,
    EventPublish,
}

impl OpType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TierPut => "tier_put",
            Self::TierGet => "tier_get",
            Self::TierDelete => "tier_delete",
            Self::Promotion => "promotion",
            Self::Embedding => "embedding",
            Self::Compliance => "compliance",
            Self::VectorSearch => "vector_search",
            Self::CacheLookup => "cache_lookup",
            Self::EventPublish => "event_publish",
        }
    }
}

/// One logged operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub op_type: OpType,
    pub tier: Option<Tier>,
    pub context_id: Option<Uuid>,
    pub bytes: usize,
    pub latency_ms: u64,
    pub success: bool,
    /// Truncated to `OPLOG_ERROR_BYTES_MAX`.
    pub error: Option<String>,
    /// Clock time the operation completed, in milliseconds.
    pub at_ms: u64,
}

impl OperationRecord {
    #[must_use]
    pub fn ok(op_type: OpType, tier: Option<Tier>, context_id: Option<Uuid>) -> Self {
        Self {
            op_type,
            tier,
            context_id,
            bytes: 0,
            latency_ms: 0,
            success: true,
            error: None,
            at_ms: 0,
        }
    }

    #[must_use]
    pub fn failed(
        op_type: OpType,
        tier: Option<Tier>,
        context_id: Option<Uuid>,
        error: impl Into<String>,
    ) -> Self {
        let mut error: String = error.into();
        if error.len() > OPLOG_ERROR_BYTES_MAX {
            error.truncate(OPLOG_ERROR_BYTES_MAX);
        }
        Self {
            op_type,
            tier,
            context_id,
            bytes: 0,
            latency_ms: 0,
            success: false,
            error: Some(error),
            at_ms: 0,
        }
    }

    #[must_use]
    pub fn with_bytes(mut self, bytes: usize) -> Self {
        self.bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    #[must_use]
    pub fn at_ms(mut self, at_ms: u64) -> Self {
        self.at_ms = at_ms;
        self
    }
}

/// Bounded append-only log plus aggregate counters.
#[derive(Debug)]
pub struct OperationLog {
    records: Mutex<VecDeque<OperationRecord>>,
    capacity: usize,
    appended_total: AtomicU64,
    failures_total: AtomicU64,
}

impl OperationLog {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(OPLOG_RECORDS_COUNT_MAX)
    }

    /// # Panics
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            appended_total: AtomicU64::new(0),
            failures_total: AtomicU64::new(0),
        }
    }

    /// Append a record, evicting the oldest on overflow.
    pub fn append(&self, record: OperationRecord) {
        if !record.success {
            self.failures_total.fetch_add(1, Ordering::Relaxed);
        }
        self.appended_total.fetch_add(1, Ordering::Relaxed);

        let mut records = self.records.lock().unwrap();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        debug_assert!(records.len() <= self.capacity);
    }

    /// Most recent `count` records, oldest first.
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<OperationRecord> {
        let records = self.records.lock().unwrap();
        let skip = records.len().saturating_sub(count);
        records.iter().skip(skip).cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total records ever appended, including evicted ones.
    #[must_use]
    pub fn appended_total(&self) -> u64 {
        self.appended_total.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failures_total(&self) -> u64 {
        self.failures_total.load(Ordering::Relaxed)
    }
}

impl Default for OperationLog {
    fn default() -> Self {
        Self::new()
    }
}
