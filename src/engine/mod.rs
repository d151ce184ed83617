//! `ContextEngine` - top-level façade.
//!
//! Validates input, runs the compliance check before any side effect,
//! requests embeddings best-effort, delegates tier placement to the
//! orchestrator, serves searches through the fingerprint cache and the
//! ranking pipeline, and queues expiry intents for the background sweep.

pub mod expiry;
pub mod sweeper;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::compliance::{ComplianceChecker, ComplianceVerdict, SimComplianceChecker};
use crate::constants::{
    CONTEXT_CONTENT_BYTES_MAX, CONTEXT_METADATA_COUNT_MAX, CONTEXT_METADATA_VALUE_BYTES_MAX,
    SEARCH_CACHE_TTL_MS_DEFAULT, SEARCH_CANDIDATES_COUNT_DEFAULT,
};
use crate::context::{Context, ContextStatus, ContextType, Priority};
use crate::dst::{FaultInjector, SimClock};
use crate::embedding::{EmbeddingProvider, SimEmbeddingProvider};
use crate::events::{EventSink, LifecycleEvent, SimEventSink};
use crate::oplog::{OpType, OperationLog, OperationRecord};
use crate::policy::TierPolicy;
use crate::search::{
    filter_candidates, paginate, rank_candidates, SearchCache, SearchPage, SearchQuery,
};
use crate::storage::{
    RetrieveMeta, SimTierStore, SimVectorIndex, StorageError, StorageOrchestrator, StorageResult,
    StoreMeta, Tier, TierStore, VectorIndex,
};

pub use expiry::{ExpiryIntent, ExpiryQueue};
pub use sweeper::{spawn_sweeper, spawn_sweeper_with_interval, SweepReport};

// =============================================================================
// Errors
// =============================================================================

pub type EngineResult<T> = Result<T, EngineError>;

/// Every variant carries `latency_ms` so failures still report how long
/// the operation ran before giving up, alongside the reason string.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Content failed (or could not complete) the compliance check.
    /// Aborts the operation with no side effects.
    #[error("compliance rejected: {reason}")]
    ComplianceRejected { reason: String, latency_ms: u64 },

    /// Malformed content or query. Aborts with no side effects.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String, latency_ms: u64 },

    /// Surfaced only once every fallback option is exhausted.
    #[error("storage failed: {source}")]
    Storage {
        #[source]
        source: StorageError,
        latency_ms: u64,
    },
}

impl EngineError {
    pub fn compliance_rejected(reason: impl Into<String>, latency_ms: u64) -> Self {
        Self::ComplianceRejected {
            reason: reason.into(),
            latency_ms,
        }
    }

    pub fn invalid_input(reason: impl Into<String>, latency_ms: u64) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
            latency_ms,
        }
    }

    pub fn storage(source: StorageError, latency_ms: u64) -> Self {
        Self::Storage { source, latency_ms }
    }

    /// How long the failed operation ran before it gave up.
    #[must_use]
    pub fn latency_ms(&self) -> u64 {
        match self {
            Self::ComplianceRejected { latency_ms, .. }
            | Self::InvalidInput { latency_ms, .. }
            | Self::Storage { latency_ms, .. } => *latency_ms,
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage { source, .. } => source.is_transient(),
            Self::ComplianceRejected { .. } | Self::InvalidInput { .. } => false,
        }
    }
}

// =============================================================================
// Requests and outcomes
// =============================================================================

/// Input to [`ContextEngine::store`].
#[derive(Debug, Clone)]
pub struct StoreRequest {
    pub context_type: ContextType,
    pub priority: Priority,
    pub content: String,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub parent_id: Option<Uuid>,
    /// Overrides the type-default TTL. `Some(None)` means never expires.
    pub expires_at_override: Option<Option<DateTime<Utc>>>,
}

impl StoreRequest {
    #[must_use]
    pub fn new(context_type: ContextType, priority: Priority, content: impl Into<String>) -> Self {
        Self {
            context_type,
            priority,
            content: content.into(),
            tags: Vec::new(),
            metadata: HashMap::new(),
            parent_id: None,
            expires_at_override: None,
        }
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    #[must_use]
    pub fn with_expires_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at_override = Some(expires_at);
        self
    }
}

/// Outcome of a successful store.
#[derive(Debug, Clone)]
pub struct StoreOutcome {
    pub id: Uuid,
    pub content_hash: String,
    pub meta: StoreMeta,
    /// Whether an embedding was generated and indexed.
    pub embedded: bool,
    /// Always approved on the success path; rejections surface as
    /// [`EngineError::ComplianceRejected`].
    pub compliance: ComplianceVerdict,
}

/// Outcome of a successful retrieve hit.
#[derive(Debug, Clone)]
pub struct RetrieveOutcome {
    pub context: Context,
    pub meta: RetrieveMeta,
    /// Whether the context was observed expired on this read. The content
    /// is still returned; the expiry action runs in the background sweep.
    pub expired: bool,
}

/// Outcome of a search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub page: SearchPage,
    pub cache_hit: bool,
    /// True when embedding or similarity search was unavailable and the
    /// query degraded to filter-only.
    pub degraded: bool,
    pub latency_ms: u64,
}

/// Aggregate counters, snapshot at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub stored_total: u64,
    pub retrieved_total: u64,
    pub searched_total: u64,
    pub cache_hits_total: u64,
    pub compliance_rejections_total: u64,
    pub store_fallbacks_total: u64,
    pub expired_observed_total: u64,
    pub oplog_appended_total: u64,
    pub oplog_failures_total: u64,
    pub search_cache_entries: usize,
    pub pending_expiry_intents: usize,
}

// =============================================================================
// Builder
// =============================================================================

/// Wires an engine from collaborators, defaulting every unset piece to
/// its deterministic sim implementation.
pub struct ContextEngineBuilder {
    clock: SimClock,
    policy: TierPolicy,
    hot: Option<Arc<dyn TierStore>>,
    vector: Option<Arc<dyn TierStore>>,
    archive: Option<Arc<dyn TierStore>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    embedding: Option<Arc<dyn EmbeddingProvider>>,
    compliance: Option<Arc<dyn ComplianceChecker>>,
    events: Option<Arc<dyn EventSink>>,
    cache_ttl_ms: u64,
    fault_injector: Option<FaultInjector>,
}

impl ContextEngineBuilder {
    #[must_use]
    pub fn new(clock: SimClock) -> Self {
        Self {
            clock,
            policy: TierPolicy::new(),
            hot: None,
            vector: None,
            archive: None,
            vector_index: None,
            embedding: None,
            compliance: None,
            events: None,
            cache_ttl_ms: SEARCH_CACHE_TTL_MS_DEFAULT,
            fault_injector: None,
        }
    }

    #[must_use]
    pub fn policy(mut self, policy: TierPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn hot_store(mut self, store: Arc<dyn TierStore>) -> Self {
        self.hot = Some(store);
        self
    }

    #[must_use]
    pub fn vector_store(mut self, store: Arc<dyn TierStore>) -> Self {
        self.vector = Some(store);
        self
    }

    #[must_use]
    pub fn archive_store(mut self, store: Arc<dyn TierStore>) -> Self {
        self.archive = Some(store);
        self
    }

    #[must_use]
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    #[must_use]
    pub fn embedding(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding = Some(provider);
        self
    }

    #[must_use]
    pub fn compliance(mut self, checker: Arc<dyn ComplianceChecker>) -> Self {
        self.compliance = Some(checker);
        self
    }

    #[must_use]
    pub fn events(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    #[must_use]
    pub fn cache_ttl_ms(mut self, ttl_ms: u64) -> Self {
        assert!(ttl_ms > 0, "ttl must be positive");
        self.cache_ttl_ms = ttl_ms;
        self
    }

    /// All defaulted sim stores and collaborators share this injector.
    #[must_use]
    pub fn fault_injector(mut self, injector: FaultInjector) -> Self {
        self.fault_injector = Some(injector);
        self
    }

    #[must_use]
    pub fn build(self) -> ContextEngine {
        let clock = self.clock;
        let oplog = Arc::new(OperationLog::new());

        let sim_store = |tier: Tier| -> Arc<dyn TierStore> {
            let store = SimTierStore::new(tier, clock.clone());
            match &self.fault_injector {
                Some(inj) => Arc::new(store.with_fault_injector(inj.clone())),
                None => Arc::new(store),
            }
        };

        let hot = self.hot.unwrap_or_else(|| sim_store(Tier::Hot));
        let vector = self.vector.unwrap_or_else(|| sim_store(Tier::Vector));
        let archive = self.archive.unwrap_or_else(|| sim_store(Tier::Archive));

        let orchestrator = StorageOrchestrator::new(
            vector,
            self.policy,
            Arc::clone(&oplog),
            clock.clone(),
        )
        .with_hot(hot)
        .with_archive(archive);

        let vector_index = self.vector_index.unwrap_or_else(|| {
            let index = SimVectorIndex::new();
            match &self.fault_injector {
                Some(inj) => Arc::new(index.with_fault_injector(inj.clone())),
                None => Arc::new(index),
            }
        });
        let embedding = self.embedding.unwrap_or_else(|| {
            let provider = SimEmbeddingProvider::new();
            match &self.fault_injector {
                Some(inj) => Arc::new(provider.with_fault_injector(inj.clone())),
                None => Arc::new(provider),
            }
        });
        let compliance = self
            .compliance
            .unwrap_or_else(|| Arc::new(SimComplianceChecker::permissive()));
        let events = self.events.unwrap_or_else(|| Arc::new(SimEventSink::new()));

        ContextEngine {
            orchestrator,
            vector_index,
            embedding,
            compliance,
            events,
            cache: SearchCache::with_ttl_ms(self.cache_ttl_ms, clock.clone()),
            expiry_queue: ExpiryQueue::new(),
            oplog,
            clock,
            stored_total: AtomicU64::new(0),
            retrieved_total: AtomicU64::new(0),
            searched_total: AtomicU64::new(0),
            cache_hits_total: AtomicU64::new(0),
            compliance_rejections_total: AtomicU64::new(0),
            store_fallbacks_total: AtomicU64::new(0),
            expired_observed_total: AtomicU64::new(0),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

pub struct ContextEngine {
    orchestrator: StorageOrchestrator,
    vector_index: Arc<dyn VectorIndex>,
    embedding: Arc<dyn EmbeddingProvider>,
    compliance: Arc<dyn ComplianceChecker>,
    events: Arc<dyn EventSink>,
    cache: SearchCache,
    expiry_queue: ExpiryQueue,
    oplog: Arc<OperationLog>,
    clock: SimClock,
    stored_total: AtomicU64,
    retrieved_total: AtomicU64,
    searched_total: AtomicU64,
    cache_hits_total: AtomicU64,
    compliance_rejections_total: AtomicU64,
    store_fallbacks_total: AtomicU64,
    expired_observed_total: AtomicU64,
}

impl ContextEngine {
    #[must_use]
    pub fn builder(clock: SimClock) -> ContextEngineBuilder {
        ContextEngineBuilder::new(clock)
    }

    // -------------------------------------------------------------------------
    // Store
    // -------------------------------------------------------------------------

    /// Store a new context.
    ///
    /// The compliance check runs before any side effect: a rejected store
    /// produces no tier write, no embedding call, no event, and no
    /// operation record.
    #[tracing::instrument(skip(self, request), fields(context_type = %request.context_type))]
    pub async fn store(&self, request: StoreRequest) -> EngineResult<StoreOutcome> {
        let start_ms = self.clock.now_ms();
        if request.content.is_empty() {
            return Err(self.invalid(start_ms, "content must not be empty"));
        }
        if request.content.len() > CONTEXT_CONTENT_BYTES_MAX {
            return Err(self.invalid(
                start_ms,
                format!("content exceeds {CONTEXT_CONTENT_BYTES_MAX} bytes"),
            ));
        }
        if request.metadata.len() > CONTEXT_METADATA_COUNT_MAX {
            return Err(self.invalid(
                start_ms,
                format!("metadata exceeds {CONTEXT_METADATA_COUNT_MAX} entries"),
            ));
        }
        for (key, value) in &request.metadata {
            let bytes = value.to_string().len();
            if bytes > CONTEXT_METADATA_VALUE_BYTES_MAX {
                return Err(self.invalid(
                    start_ms,
                    format!(
                        "metadata value for \"{key}\" exceeds {CONTEXT_METADATA_VALUE_BYTES_MAX} bytes"
                    ),
                ));
            }
        }

        match self
            .compliance
            .check(request.context_type, &request.content)
            .await
        {
            Ok(ComplianceVerdict::Approved) => {}
            Ok(ComplianceVerdict::Rejected { reason }) => {
                self.compliance_rejections_total.fetch_add(1, Ordering::Relaxed);
                return Err(EngineError::compliance_rejected(
                    reason,
                    self.clock.elapsed_since(start_ms),
                ));
            }
            // Content that could not be checked is not stored.
            Err(e) => {
                self.compliance_rejections_total.fetch_add(1, Ordering::Relaxed);
                return Err(EngineError::compliance_rejected(
                    e.to_string(),
                    self.clock.elapsed_since(start_ms),
                ));
            }
        }
        self.oplog.append(
            OperationRecord::ok(OpType::Compliance, None, None).at_ms(self.clock.now_ms()),
        );

        let mut context = Context::new(
            request.context_type,
            request.priority,
            request.content,
            &self.clock,
        )
        .with_tags(request.tags)
        .with_metadata(request.metadata);
        if let Some(parent_id) = request.parent_id {
            context = context.with_parent(parent_id);
        }
        if let Some(expires_at) = request.expires_at_override {
            context = context.with_expires_at(expires_at);
        }

        let embedded = self.embed_and_attach(&mut context).await;
        let meta = self
            .orchestrator
            .store(&context)
            .await
            .map_err(|e| self.failed(start_ms, e))?;
        if meta.fallback {
            self.store_fallbacks_total.fetch_add(1, Ordering::Relaxed);
        }
        if embedded {
            if let Some(vector) = context.embedding_vector.clone() {
                if let Err(e) = self
                    .vector_index
                    .index(context.id, vector, context.context_type)
                    .await
                {
                    tracing::warn!(id = %context.id, error = %e, "vector indexing failed");
                }
            }
        }

        self.emit(LifecycleEvent::ContextStored {
            id: context.id,
            context_type: context.context_type,
            priority: context.priority,
            content_hash: context.content_hash.clone(),
            tier: meta.tier,
            stored_at: self.clock.now(),
        })
        .await;
        self.stored_total.fetch_add(1, Ordering::Relaxed);

        Ok(StoreOutcome {
            id: context.id,
            content_hash: context.content_hash,
            meta,
            embedded,
            compliance: ComplianceVerdict::Approved,
        })
    }

    /// Best-effort embedding. Returns whether a vector was attached.
    async fn embed_and_attach(&self, context: &mut Context) -> bool {
        let start_ms = self.clock.now_ms();
        match self.embedding.embed(&context.content).await {
            Ok(vector) => {
                context.embedding_vector = Some(vector);
                self.oplog.append(
                    OperationRecord::ok(OpType::Embedding, None, Some(context.id))
                        .with_latency_ms(self.clock.elapsed_since(start_ms))
                        .at_ms(self.clock.now_ms()),
                );
                true
            }
            Err(e) => {
                // Absence of an embedding is valid; the context just skips
                // semantic search.
                self.oplog.append(
                    OperationRecord::failed(OpType::Embedding, None, Some(context.id), e.to_string())
                        .with_latency_ms(self.clock.elapsed_since(start_ms))
                        .at_ms(self.clock.now_ms()),
                );
                tracing::warn!(id = %context.id, error = %e, "embedding unavailable");
                false
            }
        }
    }

    // -------------------------------------------------------------------------
    // Retrieve
    // -------------------------------------------------------------------------

    /// Retrieve by id. Absent reads as `Ok(None)`.
    ///
    /// An expired hit still returns the last-known content, marked
    /// `Expired`, and queues the expiry intent for the background sweep.
    #[tracing::instrument(skip(self), fields(%id))]
    pub async fn retrieve(
        &self,
        id: Uuid,
        update_access_time: bool,
    ) -> EngineResult<Option<RetrieveOutcome>> {
        let start_ms = self.clock.now_ms();
        let outcome = self
            .retrieve_inner(id, update_access_time)
            .await
            .map_err(|e| self.failed(start_ms, e))?;
        if let Some(outcome) = &outcome {
            self.emit(LifecycleEvent::ContextRetrieved {
                id,
                tier: outcome.meta.tier,
                expired: outcome.expired,
                retrieved_at: self.clock.now(),
            })
            .await;
            self.retrieved_total.fetch_add(1, Ordering::Relaxed);
        }
        Ok(outcome)
    }

    /// Shared retrieve path: expiry observation and promotion apply to
    /// every caller, including search candidate fetches.
    async fn retrieve_inner(
        &self,
        id: Uuid,
        update_access_time: bool,
    ) -> StorageResult<Option<RetrieveOutcome>> {
        let Some((mut context, meta)) = self.orchestrator.retrieve(id).await? else {
            return Ok(None);
        };

        // Archived contexts past their deadline have already been handled.
        let expired =
            context.status != ContextStatus::Archived && context.is_expired(&self.clock);
        if expired {
            if context.status != ContextStatus::Expired {
                context.status = ContextStatus::Expired;
            }
            self.expiry_queue
                .push(ExpiryIntent::for_type(id, context.context_type));
            self.expired_observed_total.fetch_add(1, Ordering::Relaxed);
            self.emit(LifecycleEvent::ContextExpired {
                id,
                context_type: context.context_type,
                archived: context.context_type.archives_on_expiry(),
                observed_at: self.clock.now(),
            })
            .await;
        } else if update_access_time {
            context.touch(&self.clock);
            // Lost updates under concurrent retrieval are acceptable.
            if let Err(e) = self.orchestrator.write_back(&context, meta.tier).await {
                tracing::debug!(%id, error = %e, "accessed_at refresh failed");
            }
        }

        Ok(Some(RetrieveOutcome {
            context,
            meta,
            expired,
        }))
    }

    // -------------------------------------------------------------------------
    // Search
    // -------------------------------------------------------------------------

    /// Execute a search: cache lookup, then on a miss embed, fetch
    /// candidates, rank, filter, paginate, and cache the page.
    #[tracing::instrument(skip(self, query))]
    pub async fn search(&self, query: SearchQuery) -> EngineResult<SearchOutcome> {
        let start_ms = self.clock.now_ms();
        query
            .validate()
            .map_err(|reason| self.invalid(start_ms, reason))?;
        let fingerprint = query.fingerprint();
        self.searched_total.fetch_add(1, Ordering::Relaxed);

        if let Some(page) = self.cache.get(&fingerprint) {
            self.oplog.append(
                OperationRecord::ok(OpType::CacheLookup, None, None).at_ms(self.clock.now_ms()),
            );
            self.cache_hits_total.fetch_add(1, Ordering::Relaxed);
            self.emit(LifecycleEvent::ContextSearched {
                fingerprint: fingerprint.clone(),
                result_count: page.results.len(),
                cache_hit: true,
                searched_at: self.clock.now(),
            })
            .await;
            let degraded = page.degraded;
            return Ok(SearchOutcome {
                page,
                cache_hit: true,
                degraded,
                latency_ms: self.clock.elapsed_since(start_ms),
            });
        }
        self.oplog.append(
            OperationRecord::ok(OpType::CacheLookup, None, None).at_ms(self.clock.now_ms()),
        );

        let (candidate_ids, degraded) = self
            .candidates(&query)
            .await
            .map_err(|e| self.failed(start_ms, e))?;

        // Candidate records go through the normal retrieve path so search
        // never bypasses expiry or promotion. Expired candidates drop out.
        let mut candidates: Vec<(Context, f32)> = Vec::with_capacity(candidate_ids.len());
        for (id, score) in candidate_ids {
            match self
                .retrieve_inner(id, false)
                .await
                .map_err(|e| self.failed(start_ms, e))?
            {
                Some(outcome) if !outcome.expired => candidates.push((outcome.context, score)),
                _ => {}
            }
        }

        let ranked = rank_candidates(candidates);
        let filtered = filter_candidates(ranked, &query);
        let results = paginate(filtered, query.offset, query.limit);
        let page = SearchPage {
            results,
            fingerprint: fingerprint.clone(),
            degraded,
        };
        self.cache.put(page.clone());

        self.emit(LifecycleEvent::ContextSearched {
            fingerprint,
            result_count: page.results.len(),
            cache_hit: false,
            searched_at: self.clock.now(),
        })
        .await;

        Ok(SearchOutcome {
            page,
            cache_hit: false,
            degraded,
            latency_ms: self.clock.elapsed_since(start_ms),
        })
    }

    /// Produce scored candidate ids. Semantic when the query has text and
    /// both embedding and similarity search are available; otherwise
    /// degrades to an unscored scan (score 0).
    async fn candidates(&self, query: &SearchQuery) -> StorageResult<(Vec<(Uuid, f32)>, bool)> {
        let type_filter = if query.type_filters.is_empty() {
            None
        } else {
            Some(query.type_filters.as_slice())
        };

        if let Some(text) = &query.text {
            let embed_start_ms = self.clock.now_ms();
            match self.embedding.embed(text).await {
                Ok(query_vector) => {
                    self.oplog.append(
                        OperationRecord::ok(OpType::Embedding, None, None)
                            .with_latency_ms(self.clock.elapsed_since(embed_start_ms))
                            .at_ms(self.clock.now_ms()),
                    );
                    let search_start_ms = self.clock.now_ms();
                    match self
                        .vector_index
                        .similar(
                            &query_vector,
                            type_filter,
                            SEARCH_CANDIDATES_COUNT_DEFAULT,
                            query.min_score,
                        )
                        .await
                    {
                        Ok(scored) => {
                            self.oplog.append(
                                OperationRecord::ok(OpType::VectorSearch, Some(Tier::Vector), None)
                                    .with_latency_ms(self.clock.elapsed_since(search_start_ms))
                                    .at_ms(self.clock.now_ms()),
                            );
                            return Ok((scored, false));
                        }
                        Err(e) => {
                            self.oplog.append(
                                OperationRecord::failed(
                                    OpType::VectorSearch,
                                    Some(Tier::Vector),
                                    None,
                                    e.to_string(),
                                )
                                .with_latency_ms(self.clock.elapsed_since(search_start_ms))
                                .at_ms(self.clock.now_ms()),
                            );
                            tracing::warn!(error = %e, "similarity search unavailable");
                        }
                    }
                }
                Err(e) => {
                    self.oplog.append(
                        OperationRecord::failed(OpType::Embedding, None, None, e.to_string())
                            .with_latency_ms(self.clock.elapsed_since(embed_start_ms))
                            .at_ms(self.clock.now_ms()),
                    );
                    tracing::warn!(error = %e, "query embedding unavailable");
                }
            }
            // Semantic portion disabled for this call only.
            let ids = self
                .vector_index
                .scan(type_filter, SEARCH_CANDIDATES_COUNT_DEFAULT)
                .await?;
            return Ok((ids.into_iter().map(|id| (id, 0.0)).collect(), true));
        }

        let ids = self
            .vector_index
            .scan(type_filter, SEARCH_CANDIDATES_COUNT_DEFAULT)
            .await?;
        Ok((ids.into_iter().map(|id| (id, 0.0)).collect(), false))
    }

    // -------------------------------------------------------------------------
    // Delete / maintenance
    // -------------------------------------------------------------------------

    /// Remove a context from every tier and the vector index. Cached
    /// search pages may reference it, so the cache is invalidated.
    #[tracing::instrument(skip(self), fields(%id))]
    pub async fn delete(&self, id: Uuid) -> EngineResult<bool> {
        let start_ms = self.clock.now_ms();
        let deleted = self
            .orchestrator
            .delete(id)
            .await
            .map_err(|e| self.failed(start_ms, e))?;
        if let Err(e) = self.vector_index.remove(id).await {
            tracing::warn!(%id, error = %e, "vector index removal failed");
        }
        if deleted {
            self.cache.invalidate();
        }
        Ok(deleted)
    }

    /// Execute queued expiry intents and reclaim expired cache entries.
    /// Called periodically by the background sweeper.
    pub async fn sweep_once(&self) -> SweepReport {
        let intents = self
            .expiry_queue
            .drain(crate::constants::EXPIRY_SWEEP_BATCH_COUNT_MAX);
        let mut archived = 0;
        let mut deleted = 0;
        for intent in intents {
            match intent {
                ExpiryIntent::Archive { id } => {
                    match self.orchestrator.archive_context(id).await {
                        Ok(true) => archived += 1,
                        Ok(false) => {}
                        // Transient failures re-queue for the next pass. A
                        // vanished record (NotFound) drops its intent.
                        Err(e) if e.is_transient() => {
                            tracing::warn!(%id, error = %e, "archive sweep failed");
                            self.expiry_queue.push(ExpiryIntent::Archive { id });
                        }
                        Err(e) => {
                            tracing::debug!(%id, error = %e, "archive intent dropped");
                        }
                    }
                }
                ExpiryIntent::Delete { id } => match self.orchestrator.delete(id).await {
                    Ok(was_present) => {
                        if let Err(e) = self.vector_index.remove(id).await {
                            tracing::debug!(%id, error = %e, "vector index removal failed");
                        }
                        if was_present {
                            deleted += 1;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(%id, error = %e, "delete sweep failed");
                        self.expiry_queue.push(ExpiryIntent::Delete { id });
                    }
                },
            }
        }

        let cache_entries_removed = self.cache.sweep();
        let report = SweepReport {
            archived,
            deleted,
            cache_entries_removed,
        };
        if report.archived + report.deleted + report.cache_entries_removed > 0 {
            tracing::info!(?report, "sweep completed");
        }
        report
    }

    /// Drop every cached search page.
    pub fn invalidate_search_cache(&self) {
        self.cache.invalidate();
    }

    #[must_use]
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            stored_total: self.stored_total.load(Ordering::Relaxed),
            retrieved_total: self.retrieved_total.load(Ordering::Relaxed),
            searched_total: self.searched_total.load(Ordering::Relaxed),
            cache_hits_total: self.cache_hits_total.load(Ordering::Relaxed),
            compliance_rejections_total: self.compliance_rejections_total.load(Ordering::Relaxed),
            store_fallbacks_total: self.store_fallbacks_total.load(Ordering::Relaxed),
            expired_observed_total: self.expired_observed_total.load(Ordering::Relaxed),
            oplog_appended_total: self.oplog.appended_total(),
            oplog_failures_total: self.oplog.failures_total(),
            search_cache_entries: self.cache.len(),
            pending_expiry_intents: self.expiry_queue.len(),
        }
    }

    #[must_use]
    pub fn oplog(&self) -> &OperationLog {
        &self.oplog
    }

    #[must_use]
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    #[must_use]
    pub fn pending_expiry_intents(&self) -> usize {
        self.expiry_queue.len()
    }

    fn invalid(&self, start_ms: u64, reason: impl Into<String>) -> EngineError {
        EngineError::invalid_input(reason, self.clock.elapsed_since(start_ms))
    }

    fn failed(&self, start_ms: u64, source: StorageError) -> EngineError {
        EngineError::storage(source, self.clock.elapsed_since(start_ms))
    }

    /// Publish failures never fail the operation that produced the event.
    async fn emit(&self, event: LifecycleEvent) {
        let name = event.name();
        if let Err(e) = self.events.publish(event).await {
            self.oplog.append(
                OperationRecord::failed(OpType::EventPublish, None, None, e.to_string())
                    .at_ms(self.clock.now_ms()),
            );
            tracing::warn!(event = name, error = %e, "event publish failed");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ContextEngine {
        ContextEngine::builder(SimClock::at_ms(1_700_000_000_000)).build()
    }

    #[tokio::test]
    async fn test_store_empty_content_rejected() {
        let engine = engine();
        let err = engine
            .store(StoreRequest::new(ContextType::Domain, Priority::Medium, ""))
            .await
            .unwrap_err();
        // Failures still report how long the call ran.
        assert_eq!(err.latency_ms(), 0);
        assert!(matches!(err, EngineError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_store_oversized_metadata_value_rejected() {
        let engine = engine();
        let mut metadata = HashMap::new();
        metadata.insert(
            "big".to_string(),
            serde_json::Value::String("x".repeat(CONTEXT_METADATA_VALUE_BYTES_MAX + 1)),
        );
        let err = engine
            .store(
                StoreRequest::new(ContextType::Domain, Priority::Medium, "ok")
                    .with_metadata(metadata),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_expires_at_override_wins_over_type_default() {
        let engine = engine();
        let outcome = engine
            .store(
                StoreRequest::new(ContextType::Conversation, Priority::Medium, "kept")
                    .with_expires_at(None),
            )
            .await
            .unwrap();
        let hit = engine.retrieve(outcome.id, false).await.unwrap().unwrap();
        assert_eq!(hit.context.expires_at, None);
    }

    #[tokio::test]
    async fn test_retrieve_absent_is_none() {
        let engine = engine();
        assert!(engine.retrieve(Uuid::new_v4(), false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_accessed_at_refresh() {
        let engine = engine();
        let clock = engine.clock().clone();
        let outcome = engine
            .store(StoreRequest::new(ContextType::Domain, Priority::Medium, "touched"))
            .await
            .unwrap();

        clock.advance_ms(5000);
        engine.retrieve(outcome.id, true).await.unwrap().unwrap();
        let hit = engine.retrieve(outcome.id, false).await.unwrap().unwrap();
        assert!(hit.context.accessed_at > hit.context.created_at);
    }

    #[tokio::test]
    async fn test_filter_only_search_is_not_degraded() {
        let engine = engine();
        engine
            .store(StoreRequest::new(ContextType::Domain, Priority::Medium, "plain"))
            .await
            .unwrap();
        let outcome = engine.search(SearchQuery::filter_only()).await.unwrap();
        assert!(!outcome.degraded);
        assert_eq!(outcome.page.results.len(), 1);
    }
}
