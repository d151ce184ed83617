//! `SimTierStore` - In-memory tier store for deterministic simulation.
//!
//! Implements `TierStore` over a `HashMap` with lazy TTL expiry driven by
//! the shared `SimClock`, and optional fault injection so tests can make
//! any tier fail on demand.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dst::{FaultInjector, FaultType, SimClock};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::tier::{Tier, TierRecord, TierStore};

#[derive(Debug, Clone)]
struct StoredEntry {
    record: TierRecord,
    /// Tier-level deadline in clock milliseconds. `None` never expires.
    expires_at_ms: Option<u64>,
}

/// In-memory tier store with simulated-time TTL.
pub struct SimTierStore {
    tier: Tier,
    clock: SimClock,
    entries: Arc<RwLock<HashMap<Uuid, StoredEntry>>>,
    fault_injector: Option<FaultInjector>,
}

impl SimTierStore {
    #[must_use]
    pub fn new(tier: Tier, clock: SimClock) -> Self {
        Self {
            tier,
            clock,
            entries: Arc::new(RwLock::new(HashMap::new())),
            fault_injector: None,
        }
    }

    #[must_use]
    pub fn with_fault_injector(mut self, injector: FaultInjector) -> Self {
        self.fault_injector = Some(injector);
        self
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now_ms = self.clock.now_ms();
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|e| e.expires_at_ms.map_or(true, |d| now_ms < d))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn fault_type(&self, op: &str) -> FaultType {
        match (self.tier, op) {
            (Tier::Hot, "put") => FaultType::HotPutFail,
            (Tier::Hot, _) => FaultType::HotGetFail,
            (Tier::Vector, "put") => FaultType::VectorPutFail,
            (Tier::Vector, _) => FaultType::VectorGetFail,
            (Tier::Archive, "put") => FaultType::ArchivePutFail,
            (Tier::Archive, _) => FaultType::ArchiveGetFail,
        }
    }

    fn maybe_inject_fault(&self, op: &str) -> StorageResult<()> {
        let Some(injector) = &self.fault_injector else {
            return Ok(());
        };
        let fault_type = if op == "delete" {
            FaultType::TierDeleteFail
        } else {
            self.fault_type(op)
        };
        let operation = format!("{}_{}", self.tier, op);
        if injector.should_inject(fault_type, &operation) {
            return Err(StorageError::tier_unavailable(
                self.tier,
                op.to_string(),
                "injected fault",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TierStore for SimTierStore {
    fn tier(&self) -> Tier {
        self.tier
    }

    async fn put(&self, record: TierRecord, ttl_ms: Option<u64>) -> StorageResult<()> {
        self.maybe_inject_fault("put")?;

        let expires_at_ms = ttl_ms.map(|ttl| self.clock.now_ms().saturating_add(ttl));
        let mut entries = self.entries.write().await;
        entries.insert(
            record.id,
            StoredEntry {
                record,
                expires_at_ms,
            },
        );
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StorageResult<Option<TierRecord>> {
        self.maybe_inject_fault("get")?;

        let now_ms = self.clock.now_ms();
        // Lazy expiry: evict on observation rather than by timer.
        let mut entries = self.entries.write().await;
        match entries.get(&id) {
            Some(entry) => {
                if entry.expires_at_ms.is_some_and(|d| now_ms >= d) {
                    entries.remove(&id);
                    return Ok(None);
                }
                Ok(Some(entry.record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid) -> StorageResult<bool> {
        self.maybe_inject_fault("delete")?;

        let mut entries = self.entries.write().await;
        Ok(entries.remove(&id).is_some())
    }
}
