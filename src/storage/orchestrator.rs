//! `StorageOrchestrator` - cross-tier store/retrieve with fallback.
//!
//! Owns the three tier-store handles. Writes go to the policy's preferred
//! tier and fall back in the fixed order Vector then Hot; Archive is never
//! an automatic write fallback. Reads probe Hot, Vector, Archive in order
//! and opportunistically promote slow-tier hits. No automatic retries on
//! any tier: fallback ordering stays deterministic and bounded.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::Context;
use crate::dst::SimClock;
use crate::oplog::{OpType, OperationLog, OperationRecord};
use crate::policy::TierPolicy;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::tier::{Tier, TierRecord, TierStore};

/// Outcome metadata for a store call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    /// Tier the write landed on.
    pub tier: Tier,
    pub fallback: bool,
    /// Preferred tier, set only when a fallback occurred.
    pub original_tier: Option<Tier>,
    pub latency_ms: u64,
}

/// Outcome metadata for a retrieve call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveMeta {
    /// Tier the hit came from.
    pub tier: Tier,
    /// Tier the record was promoted into, when promotion succeeded.
    pub promoted_to: Option<Tier>,
    pub latency_ms: u64,
}

/// Cross-tier storage coordinator.
pub struct StorageOrchestrator {
    hot: Option<Arc<dyn TierStore>>,
    vector: Arc<dyn TierStore>,
    archive: Option<Arc<dyn TierStore>>,
    policy: TierPolicy,
    oplog: Arc<OperationLog>,
    clock: SimClock,
}

impl StorageOrchestrator {
    /// The Vector tier is mandatory; Hot and Archive are wired in via the
    /// `with_*` builders.
    #[must_use]
    pub fn new(
        vector: Arc<dyn TierStore>,
        policy: TierPolicy,
        oplog: Arc<OperationLog>,
        clock: SimClock,
    ) -> Self {
        assert_eq!(vector.tier(), Tier::Vector, "vector store role mismatch");
        Self {
            hot: None,
            vector,
            archive: None,
            policy,
            oplog,
            clock,
        }
    }

    #[must_use]
    pub fn with_hot(mut self, hot: Arc<dyn TierStore>) -> Self {
        assert_eq!(hot.tier(), Tier::Hot, "hot store role mismatch");
        self.hot = Some(hot);
        self
    }

    #[must_use]
    pub fn with_archive(mut self, archive: Arc<dyn TierStore>) -> Self {
        assert_eq!(archive.tier(), Tier::Archive, "archive store role mismatch");
        self.archive = Some(archive);
        self
    }

    fn store_for(&self, tier: Tier) -> Option<&Arc<dyn TierStore>> {
        match tier {
            Tier::Hot => self.hot.as_ref(),
            Tier::Vector => Some(&self.vector),
            Tier::Archive => self.archive.as_ref(),
        }
    }

    /// Tier-level TTL: remaining logical lifetime plus a grace window.
    /// The grace keeps expired records readable until a read or the sweep
    /// handles them; the tier TTL only reclaims what nothing observed.
    fn ttl_ms_for(&self, context: &Context) -> Option<u64> {
        context.expires_at.map(|deadline| {
            let deadline_ms = deadline.timestamp_millis().max(0) as u64;
            deadline_ms
                .saturating_sub(self.clock.now_ms())
                .saturating_add(crate::constants::TIER_TTL_GRACE_MS_DEFAULT)
        })
    }

    fn encode(&self, context: &Context, tier: Tier) -> StorageResult<TierRecord> {
        let payload = serde_json::to_vec(context)?;
        Ok(TierRecord::new(context.id, payload, tier, self.clock.now()))
    }

    fn decode(&self, record: &TierRecord) -> StorageResult<Context> {
        Ok(serde_json::from_slice(&record.payload)?)
    }

    /// Store a context on its preferred tier, falling back Vector then Hot
    /// on failure. Archive is reached only via [`Self::archive_context`],
    /// never as a fallback, so transient data cannot silently become
    /// durable-forever.
    #[tracing::instrument(skip(self, context), fields(id = %context.id))]
    pub async fn store(&self, context: &Context) -> StorageResult<StoreMeta> {
        let start_ms = self.clock.now_ms();
        let preferred = self.policy.preferred_tier(context);
        let ttl_ms = self.ttl_ms_for(context);

        let mut attempt_order = vec![preferred];
        for tier in Tier::store_fallback_order() {
            if *tier != preferred {
                attempt_order.push(*tier);
            }
        }

        let mut last_error: Option<StorageError> = None;
        for tier in attempt_order {
            let Some(store) = self.store_for(tier) else {
                last_error = Some(StorageError::tier_unavailable(
                    tier,
                    "put",
                    "tier not wired",
                ));
                continue;
            };

            let record = self.encode(context, tier)?;
            let bytes = record.payload_bytes();
            let attempt_start_ms = self.clock.now_ms();
            match store.put(record, ttl_ms).await {
                Ok(()) => {
                    self.oplog.append(
                        OperationRecord::ok(OpType::TierPut, Some(tier), Some(context.id))
                            .with_bytes(bytes)
                            .with_latency_ms(self.clock.elapsed_since(attempt_start_ms))
                            .at_ms(self.clock.now_ms()),
                    );
                    let fallback = tier != preferred;
                    if fallback {
                        tracing::warn!(%preferred, landed = %tier, "store fell back");
                    }
                    return Ok(StoreMeta {
                        tier,
                        fallback,
                        original_tier: fallback.then_some(preferred),
                        latency_ms: self.clock.elapsed_since(start_ms),
                    });
                }
                Err(e) => {
                    self.oplog.append(
                        OperationRecord::failed(
                            OpType::TierPut,
                            Some(tier),
                            Some(context.id),
                            e.to_string(),
                        )
                        .with_bytes(bytes)
                        .with_latency_ms(self.clock.elapsed_since(attempt_start_ms))
                        .at_ms(self.clock.now_ms()),
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            StorageError::tier_unavailable(preferred, "put", "no tier accepted the write")
        }))
    }

    /// Probe Hot, Vector, Archive in order; return the first hit. A tier
    /// error reads as a miss and the probe continues. Slow-tier hits are
    /// promoted per policy; promotion failure never fails the read.
    #[tracing::instrument(skip(self), fields(%id))]
    pub async fn retrieve(&self, id: Uuid) -> StorageResult<Option<(Context, RetrieveMeta)>> {
        let start_ms = self.clock.now_ms();

        for &tier in Tier::retrieve_order() {
            let Some(store) = self.store_for(tier) else {
                continue;
            };

            let probe_start_ms = self.clock.now_ms();
            match store.get(id).await {
                Ok(Some(record)) => {
                    self.oplog.append(
                        OperationRecord::ok(OpType::TierGet, Some(tier), Some(id))
                            .with_bytes(record.payload_bytes())
                            .with_latency_ms(self.clock.elapsed_since(probe_start_ms))
                            .at_ms(self.clock.now_ms()),
                    );
                    let context = self.decode(&record)?;
                    let promoted_to = if tier == Tier::Hot {
                        None
                    } else {
                        self.promote(&context, tier).await
                    };
                    return Ok(Some((
                        context,
                        RetrieveMeta {
                            tier,
                            promoted_to,
                            latency_ms: self.clock.elapsed_since(start_ms),
                        },
                    )));
                }
                Ok(None) => {
                    self.oplog.append(
                        OperationRecord::ok(OpType::TierGet, Some(tier), Some(id))
                            .with_latency_ms(self.clock.elapsed_since(probe_start_ms))
                            .at_ms(self.clock.now_ms()),
                    );
                }
                Err(e) => {
                    // Unreachable tier reads as a miss; keep probing.
                    self.oplog.append(
                        OperationRecord::failed(OpType::TierGet, Some(tier), Some(id), e.to_string())
                            .with_latency_ms(self.clock.elapsed_since(probe_start_ms))
                            .at_ms(self.clock.now_ms()),
                    );
                }
            }
        }

        Ok(None)
    }

    /// Write-back a slow-tier hit into the policy's promotion target.
    /// Returns the target tier only when the write succeeded.
    async fn promote(&self, context: &Context, hit_tier: Tier) -> Option<Tier> {
        let target = self.policy.promotion_tier(context, &self.clock)?;
        // Promotion only moves records toward faster tiers.
        if !is_faster(target, hit_tier) {
            return None;
        }
        let store = self.store_for(target)?;

        let ttl_ms = self.ttl_ms_for(context);
        let record = match self.encode(context, target) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(id = %context.id, error = %e, "promotion encode failed");
                return None;
            }
        };
        let start_ms = self.clock.now_ms();
        match store.put(record, ttl_ms).await {
            Ok(()) => {
                self.oplog.append(
                    OperationRecord::ok(OpType::Promotion, Some(target), Some(context.id))
                        .with_latency_ms(self.clock.elapsed_since(start_ms))
                        .at_ms(self.clock.now_ms()),
                );
                tracing::debug!(id = %context.id, from = %hit_tier, to = %target, "promoted");
                Some(target)
            }
            Err(e) => {
                self.oplog.append(
                    OperationRecord::failed(
                        OpType::Promotion,
                        Some(target),
                        Some(context.id),
                        e.to_string(),
                    )
                    .with_latency_ms(self.clock.elapsed_since(start_ms))
                    .at_ms(self.clock.now_ms()),
                );
                None
            }
        }
    }

    /// Delete from every wired tier. Tier errors are logged and skipped.
    /// Returns whether any tier held the record.
    #[tracing::instrument(skip(self), fields(%id))]
    pub async fn delete(&self, id: Uuid) -> StorageResult<bool> {
        let mut deleted = false;
        for &tier in Tier::retrieve_order() {
            let Some(store) = self.store_for(tier) else {
                continue;
            };
            let start_ms = self.clock.now_ms();
            match store.delete(id).await {
                Ok(was_present) => {
                    deleted |= was_present;
                    self.oplog.append(
                        OperationRecord::ok(OpType::TierDelete, Some(tier), Some(id))
                            .with_latency_ms(self.clock.elapsed_since(start_ms))
                            .at_ms(self.clock.now_ms()),
                    );
                }
                Err(e) => {
                    self.oplog.append(
                        OperationRecord::failed(
                            OpType::TierDelete,
                            Some(tier),
                            Some(id),
                            e.to_string(),
                        )
                        .with_latency_ms(self.clock.elapsed_since(start_ms))
                        .at_ms(self.clock.now_ms()),
                    );
                }
            }
        }
        Ok(deleted)
    }

    /// Move a context into the Archive tier and drop it from the faster
    /// tiers. Returns `false` when no archive store is wired; an id absent
    /// from every tier is `NotFound`, so callers can tell a vanished
    /// record from a tier failure.
    #[tracing::instrument(skip(self), fields(%id))]
    pub async fn archive_context(&self, id: Uuid) -> StorageResult<bool> {
        let Some(archive) = self.archive.as_ref() else {
            return Ok(false);
        };

        let Some((mut context, _meta)) = self.retrieve_without_promotion(id).await? else {
            return Err(StorageError::not_found(id));
        };
        if context.status.can_transition_to(crate::context::ContextStatus::Archived) {
            context.set_status(crate::context::ContextStatus::Archived);
        }

        let record = self.encode(&context, Tier::Archive)?;
        let bytes = record.payload_bytes();
        let start_ms = self.clock.now_ms();
        match archive.put(record, None).await {
            Ok(()) => {
                self.oplog.append(
                    OperationRecord::ok(OpType::TierPut, Some(Tier::Archive), Some(id))
                        .with_bytes(bytes)
                        .with_latency_ms(self.clock.elapsed_since(start_ms))
                        .at_ms(self.clock.now_ms()),
                );
            }
            Err(e) => {
                self.oplog.append(
                    OperationRecord::failed(
                        OpType::TierPut,
                        Some(Tier::Archive),
                        Some(id),
                        e.to_string(),
                    )
                    .with_bytes(bytes)
                    .with_latency_ms(self.clock.elapsed_since(start_ms))
                    .at_ms(self.clock.now_ms()),
                );
                return Err(e);
            }
        }

        // Source copies go away only after the archive write landed.
        for tier in [Tier::Hot, Tier::Vector] {
            if let Some(store) = self.store_for(tier) {
                if let Err(e) = store.delete(id).await {
                    tracing::warn!(%tier, %id, error = %e, "post-archive delete failed");
                }
            }
        }
        Ok(true)
    }

    /// Overwrite the record on a specific tier. Used for best-effort
    /// `accessed_at` refresh after a read; callers swallow the error.
    pub async fn write_back(&self, context: &Context, tier: Tier) -> StorageResult<()> {
        let Some(store) = self.store_for(tier) else {
            return Err(StorageError::tier_unavailable(tier, "put", "tier not wired"));
        };
        let record = self.encode(context, tier)?;
        let ttl_ms = self.ttl_ms_for(context);
        store.put(record, ttl_ms).await
    }

    /// Probe without the promotion side effect. Used by archive and sweep
    /// paths that must not re-warm the record they are about to move.
    pub async fn retrieve_without_promotion(
        &self,
        id: Uuid,
    ) -> StorageResult<Option<(Context, Tier)>> {
        for &tier in Tier::retrieve_order() {
            let Some(store) = self.store_for(tier) else {
                continue;
            };
            match store.get(id).await {
                Ok(Some(record)) => {
                    let context = self.decode(&record)?;
                    return Ok(Some((context, tier)));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(%tier, %id, error = %e, "probe failed");
                }
            }
        }
        Ok(None)
    }

    #[must_use]
    pub fn oplog(&self) -> &Arc<OperationLog> {
        &self.oplog
    }

    #[must_use]
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }
}

/// Whether `a` is a strictly faster tier than `b`.
fn is_faster(a: Tier, b: Tier) -> bool {
    fn speed(t: Tier) -> u8 {
        match t {
            Tier::Hot => 0,
            Tier::Vector => 1,
            Tier::Archive => 2,
        }
    }
    speed(a) < speed(b)
}

// =============================================================================
// Tests
// =============================================================================
