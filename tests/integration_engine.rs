//! End-to-end engine scenarios over fully simulated collaborators.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use context_engine::compliance::SimComplianceChecker;
use context_engine::context::{ContextStatus, ContextType, Priority};
use context_engine::dst::{FaultConfig, FaultInjector, FaultType, SimClock};
use context_engine::engine::{ContextEngine, EngineError, StoreRequest};
use context_engine::events::SimEventSink;
use context_engine::search::SearchQuery;
use context_engine::storage::error::StorageResult;
use context_engine::storage::{SimTierStore, Tier, TierRecord, TierStore, VectorIndex};

const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

fn start_clock() -> SimClock {
    SimClock::at_ms(1_700_000_000_000)
}

#[tokio::test]
async fn content_hash_matches_sha256() {
    let clock = start_clock();
    let engine = ContextEngine::builder(clock).build();
    let outcome = engine
        .store(StoreRequest::new(
            ContextType::Conversation,
            Priority::Medium,
            "hello",
        ))
        .await
        .unwrap();
    assert_eq!(outcome.content_hash, HELLO_SHA256);
}

#[tokio::test]
async fn conversation_expires_between_nine_and_eleven_minutes() {
    let clock = start_clock();
    let engine = ContextEngine::builder(clock.clone()).build();
    let outcome = engine
        .store(StoreRequest::new(
            ContextType::Conversation,
            Priority::Medium,
            "ephemeral",
        ))
        .await
        .unwrap();

    clock.advance(chrono::Duration::minutes(9));
    let hit = engine.retrieve(outcome.id, false).await.unwrap().unwrap();
    assert!(!hit.expired);
    assert_eq!(hit.context.status, ContextStatus::Active);

    clock.advance(chrono::Duration::minutes(2));
    let hit = engine.retrieve(outcome.id, false).await.unwrap().unwrap();
    assert!(hit.expired);
    assert_eq!(hit.context.status, ContextStatus::Expired);
}

#[tokio::test]
async fn store_falls_back_and_reports_original_tier() {
    let clock = start_clock();
    let injector = FaultInjector::new(42);
    injector.register(FaultType::HotPutFail, FaultConfig::always());
    let engine = ContextEngine::builder(clock)
        .fault_injector(injector)
        .build();

    // Conversation prefers Hot; the injected fault pushes it to Vector.
    let outcome = engine
        .store(StoreRequest::new(
            ContextType::Conversation,
            Priority::Medium,
            "displaced",
        ))
        .await
        .unwrap();
    assert_eq!(outcome.meta.tier, Tier::Vector);
    assert!(outcome.meta.fallback);
    assert_eq!(outcome.meta.original_tier, Some(Tier::Hot));
    assert_eq!(engine.stats().store_fallbacks_total, 1);
}

#[tokio::test]
async fn elevated_store_lands_on_hot_and_stays_there() {
    let clock = start_clock();
    let engine = ContextEngine::builder(clock).build();

    let outcome = engine
        .store(
            StoreRequest::new(ContextType::Domain, Priority::Critical, "pinned")
                .with_expires_at(None),
        )
        .await
        .unwrap();
    assert_eq!(outcome.meta.tier, Tier::Hot);

    // Hot hits never trigger promotion writes; repeated reads stay put.
    let first = engine.retrieve(outcome.id, true).await.unwrap().unwrap();
    let second = engine.retrieve(outcome.id, true).await.unwrap().unwrap();
    assert_eq!(first.meta.tier, Tier::Hot);
    assert_eq!(first.meta.promoted_to, None);
    assert_eq!(second.meta.tier, Tier::Hot);
    assert_eq!(second.context.content, "pinned");
}

#[tokio::test]
async fn archive_hit_promotes_to_hot_at_most_once() {
    let clock = start_clock();
    let hot: Arc<dyn TierStore> = Arc::new(SimTierStore::new(Tier::Hot, clock.clone()));
    let vector: Arc<dyn TierStore> = Arc::new(SimTierStore::new(Tier::Vector, clock.clone()));
    let archive: Arc<dyn TierStore> = Arc::new(SimTierStore::new(Tier::Archive, clock.clone()));

    // Seed the record into the Archive tier only, as if it had been moved
    // there long ago.
    let ctx = context_engine::Context::new(
        ContextType::Domain,
        Priority::Critical,
        "cold but wanted",
        &clock,
    );
    let record = TierRecord::new(
        ctx.id,
        serde_json::to_vec(&ctx).unwrap(),
        Tier::Archive,
        clock.now(),
    );
    archive.put(record, None).await.unwrap();

    let engine = ContextEngine::builder(clock)
        .hot_store(hot)
        .vector_store(vector)
        .archive_store(archive)
        .build();

    let first = engine.retrieve(ctx.id, true).await.unwrap().unwrap();
    assert_eq!(first.meta.tier, Tier::Archive);
    assert_eq!(first.meta.promoted_to, Some(Tier::Hot));

    // The second retrieve is served from Hot and promotes nothing further.
    let second = engine.retrieve(ctx.id, true).await.unwrap().unwrap();
    assert_eq!(second.meta.tier, Tier::Hot);
    assert_eq!(second.meta.promoted_to, None);
    assert_eq!(second.context.content, "cold but wanted");
}

#[tokio::test]
async fn vector_hit_promotes_then_serves_from_hot() {
    let clock = start_clock();
    let engine = ContextEngine::builder(clock).build();

    // Medium Domain context lands on Vector.
    let outcome = engine
        .store(StoreRequest::new(
            ContextType::Domain,
            Priority::Medium,
            "warming",
        ))
        .await
        .unwrap();
    assert_eq!(outcome.meta.tier, Tier::Vector);

    // Fresh context: accessed within the recency window, so the Vector hit
    // is promoted. Target equals hit tier, so nothing moves to Hot; a
    // Critical context does.
    let hit = engine.retrieve(outcome.id, true).await.unwrap().unwrap();
    assert_eq!(hit.meta.tier, Tier::Vector);
}

#[tokio::test]
async fn identical_search_twice_hits_cache_with_identical_page() {
    let clock = start_clock();
    let engine = ContextEngine::builder(clock).build();

    for content in ["alpha memo", "beta memo", "gamma memo"] {
        engine
            .store(StoreRequest::new(
                ContextType::Domain,
                Priority::Medium,
                content,
            ))
            .await
            .unwrap();
    }

    let query = SearchQuery::semantic("memo").with_types(vec![ContextType::Domain]);
    let first = engine.search(query.clone()).await.unwrap();
    assert!(!first.cache_hit);

    let second = engine.search(query).await.unwrap();
    assert!(second.cache_hit);

    let first_ids: Vec<Uuid> = first.page.results.iter().map(|r| r.id).collect();
    let second_ids: Vec<Uuid> = second.page.results.iter().map(|r| r.id).collect();
    assert_eq!(first_ids, second_ids);
    let first_ranks: Vec<usize> = first.page.results.iter().map(|r| r.rank).collect();
    let second_ranks: Vec<usize> = second.page.results.iter().map(|r| r.rank).collect();
    assert_eq!(first_ranks, second_ranks);
    assert_eq!(engine.stats().cache_hits_total, 1);
}

#[tokio::test]
async fn cached_page_expires_after_ttl() {
    let clock = start_clock();
    let engine = ContextEngine::builder(clock.clone())
        .cache_ttl_ms(60_000)
        .build();
    engine
        .store(StoreRequest::new(
            ContextType::Domain,
            Priority::Medium,
            "cached",
        ))
        .await
        .unwrap();

    let query = SearchQuery::semantic("cached");
    engine.search(query.clone()).await.unwrap();
    clock.advance_ms(61_000);
    let after = engine.search(query).await.unwrap();
    assert!(!after.cache_hit);
}

/// Index stub with preset scores, to pin down ranking order end to end.
struct FixedScoreIndex {
    scored: Vec<(Uuid, f32)>,
}

#[async_trait]
impl VectorIndex for FixedScoreIndex {
    async fn index(&self, _: Uuid, _: Vec<f32>, _: ContextType) -> StorageResult<()> {
        Ok(())
    }

    async fn similar(
        &self,
        _query: &[f32],
        _type_filter: Option<&[ContextType]>,
        limit: usize,
        _min_score: f32,
    ) -> StorageResult<Vec<(Uuid, f32)>> {
        Ok(self.scored.iter().take(limit).copied().collect())
    }

    async fn scan(
        &self,
        _type_filter: Option<&[ContextType]>,
        limit: usize,
    ) -> StorageResult<Vec<Uuid>> {
        Ok(self.scored.iter().take(limit).map(|(id, _)| *id).collect())
    }

    async fn remove(&self, _: Uuid) -> StorageResult<bool> {
        Ok(false)
    }
}

#[tokio::test]
async fn equal_scores_keep_retrieval_order() {
    let clock = start_clock();
    let hot: Arc<dyn TierStore> = Arc::new(SimTierStore::new(Tier::Hot, clock.clone()));
    let vector: Arc<dyn TierStore> = Arc::new(SimTierStore::new(Tier::Vector, clock.clone()));
    let archive: Arc<dyn TierStore> = Arc::new(SimTierStore::new(Tier::Archive, clock.clone()));

    // Seed the tiers through a staging engine, then search through an
    // engine sharing the same stores but a fixed-score index.
    let staging = ContextEngine::builder(clock.clone())
        .hot_store(Arc::clone(&hot))
        .vector_store(Arc::clone(&vector))
        .archive_store(Arc::clone(&archive))
        .build();
    let mut ids = Vec::new();
    for content in ["candidate a", "candidate b", "candidate c"] {
        let outcome = staging
            .store(StoreRequest::new(
                ContextType::Domain,
                Priority::Medium,
                content,
            ))
            .await
            .unwrap();
        ids.push(outcome.id);
    }
    drop(staging);

    let engine = ContextEngine::builder(clock)
        .hot_store(hot)
        .vector_store(vector)
        .archive_store(archive)
        .vector_index(Arc::new(FixedScoreIndex {
            scored: vec![(ids[0], 0.9), (ids[1], 0.9), (ids[2], 0.7)],
        }))
        .build();

    let outcome = engine
        .search(SearchQuery::semantic("candidate"))
        .await
        .unwrap();
    let ordered: Vec<Uuid> = outcome.page.results.iter().map(|r| r.id).collect();
    // Equal scores tie-break on retrieval order: a before b, c last.
    assert_eq!(ordered, ids);
    assert_eq!(
        outcome.page.results.iter().map(|r| r.rank).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[tokio::test]
async fn end_to_end_conversation_lifecycle() {
    let clock = start_clock();
    let engine = ContextEngine::builder(clock.clone()).build();

    let outcome = engine
        .store(StoreRequest::new(
            ContextType::Conversation,
            Priority::Medium,
            "hello",
        ))
        .await
        .unwrap();
    assert_eq!(outcome.content_hash, HELLO_SHA256);

    clock.advance(chrono::Duration::minutes(1));
    let hit = engine.retrieve(outcome.id, true).await.unwrap().unwrap();
    assert_eq!(hit.context.content, "hello");
    assert_eq!(hit.context.status, ContextStatus::Active);

    clock.advance(chrono::Duration::minutes(10));
    let hit = engine.retrieve(outcome.id, false).await.unwrap().unwrap();
    assert_eq!(hit.context.status, ContextStatus::Expired);
    assert_eq!(engine.pending_expiry_intents(), 1);

    // Conversation contexts are deleted, never archived.
    let report = engine.sweep_once().await;
    assert_eq!(report.deleted, 1);
    assert_eq!(report.archived, 0);
    assert!(engine.retrieve(outcome.id, false).await.unwrap().is_none());
}

#[tokio::test]
async fn expired_constitutional_context_is_archived() {
    let clock = start_clock();
    let engine = ContextEngine::builder(clock.clone()).build();

    let deadline = clock.now() + chrono::Duration::minutes(5);
    let outcome = engine
        .store(
            StoreRequest::new(ContextType::Constitutional, Priority::Medium, "bylaw")
                .with_expires_at(Some(deadline)),
        )
        .await
        .unwrap();

    clock.advance(chrono::Duration::minutes(6));
    let hit = engine.retrieve(outcome.id, false).await.unwrap().unwrap();
    assert!(hit.expired);

    let report = engine.sweep_once().await;
    assert_eq!(report.archived, 1);
    assert_eq!(report.deleted, 0);

    let hit = engine.retrieve(outcome.id, false).await.unwrap().unwrap();
    assert_eq!(hit.meta.tier, Tier::Archive);
    assert_eq!(hit.context.status, ContextStatus::Archived);
}

#[tokio::test]
async fn sweep_drops_intent_for_vanished_context() {
    let clock = start_clock();
    let engine = ContextEngine::builder(clock.clone()).build();

    let deadline = clock.now() + chrono::Duration::minutes(5);
    let outcome = engine
        .store(
            StoreRequest::new(ContextType::Constitutional, Priority::Medium, "withdrawn")
                .with_expires_at(Some(deadline)),
        )
        .await
        .unwrap();

    clock.advance(chrono::Duration::minutes(6));
    engine.retrieve(outcome.id, false).await.unwrap();
    assert_eq!(engine.pending_expiry_intents(), 1);

    // The record disappears before the sweep; the archive intent is
    // dropped rather than re-queued forever.
    engine.delete(outcome.id).await.unwrap();
    let report = engine.sweep_once().await;
    assert_eq!(report.archived, 0);
    assert_eq!(engine.pending_expiry_intents(), 0);
}

#[tokio::test]
async fn rejected_store_leaves_no_trace() {
    let clock = start_clock();
    let events = Arc::new(SimEventSink::new());
    let engine = ContextEngine::builder(clock)
        .compliance(Arc::new(SimComplianceChecker::with_banned_terms(vec![
            "classified".into(),
        ])))
        .events(events.clone())
        .build();

    let err = engine
        .store(StoreRequest::new(
            ContextType::Domain,
            Priority::Medium,
            "this is classified material",
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ComplianceRejected { .. }));

    // No tier writes, no embedding, no events: the log is untouched.
    assert_eq!(engine.oplog().appended_total(), 0);
    assert!(events.published().is_empty());
    let stats = engine.stats();
    assert_eq!(stats.stored_total, 0);
    assert_eq!(stats.compliance_rejections_total, 1);
}

#[tokio::test]
async fn compliance_checker_error_fails_closed() {
    let clock = start_clock();
    let injector = FaultInjector::new(42);
    injector.register(FaultType::ComplianceFail, FaultConfig::always());
    let engine = ContextEngine::builder(clock)
        .compliance(Arc::new(
            SimComplianceChecker::permissive().with_fault_injector(injector),
        ))
        .build();

    let err = engine
        .store(StoreRequest::new(
            ContextType::Domain,
            Priority::Medium,
            "unverifiable",
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ComplianceRejected { .. }));
    assert_eq!(engine.oplog().appended_total(), 0);
}

#[tokio::test]
async fn embedding_failure_degrades_store_and_search() {
    let clock = start_clock();
    let injector = FaultInjector::new(42);
    injector.register(FaultType::EmbeddingFail, FaultConfig::always());
    let engine = ContextEngine::builder(clock)
        .fault_injector(injector)
        .build();

    // Store succeeds without a vector.
    let outcome = engine
        .store(StoreRequest::new(
            ContextType::Domain,
            Priority::Medium,
            "unembedded",
        ))
        .await
        .unwrap();
    assert!(!outcome.embedded);

    // Search degrades to filter-only instead of failing.
    let search = engine
        .search(SearchQuery::semantic("unembedded"))
        .await
        .unwrap();
    assert!(search.degraded);

    // The cached page remembers it was computed in degraded mode.
    let cached = engine
        .search(SearchQuery::semantic("unembedded"))
        .await
        .unwrap();
    assert!(cached.cache_hit);
    assert!(cached.degraded);
}

#[tokio::test]
async fn store_failure_carries_latency_and_reason() {
    let clock = start_clock();
    let injector = FaultInjector::new(42);
    injector.register(FaultType::HotPutFail, FaultConfig::always());
    injector.register(FaultType::VectorPutFail, FaultConfig::always());
    let engine = ContextEngine::builder(clock)
        .fault_injector(injector)
        .build();

    let err = engine
        .store(StoreRequest::new(
            ContextType::Conversation,
            Priority::Medium,
            "nowhere to go",
        ))
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert!(err.to_string().contains("unavailable"));
    // Simulated time did not advance during the call.
    assert_eq!(err.latency_ms(), 0);
    assert!(matches!(err, EngineError::Storage { .. }));
}

#[tokio::test]
async fn invalid_query_is_rejected_without_side_effects() {
    let clock = start_clock();
    let engine = ContextEngine::builder(clock).build();
    let err = engine
        .search(SearchQuery::semantic("q").with_limit(0))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput { .. }));
    assert_eq!(engine.stats().search_cache_entries, 0);
}

#[tokio::test]
async fn search_filters_apply_after_ranking() {
    let clock = start_clock();
    let engine = ContextEngine::builder(clock).build();

    engine
        .store(
            StoreRequest::new(ContextType::Domain, Priority::Medium, "tagged memo")
                .with_tags(vec!["audit".into()]),
        )
        .await
        .unwrap();
    engine
        .store(StoreRequest::new(
            ContextType::Domain,
            Priority::Medium,
            "untagged memo",
        ))
        .await
        .unwrap();

    let outcome = engine
        .search(SearchQuery::semantic("memo").with_tags(vec!["audit".into()]))
        .await
        .unwrap();
    assert_eq!(outcome.page.results.len(), 1);
    assert_eq!(outcome.page.results[0].context.tags, vec!["audit"]);
    assert_eq!(outcome.page.results[0].rank, 1);
}

#[tokio::test]
async fn expired_candidates_drop_out_of_search() {
    let clock = start_clock();
    let engine = ContextEngine::builder(clock.clone()).build();

    engine
        .store(StoreRequest::new(
            ContextType::Conversation,
            Priority::Low,
            "fleeting note",
        ))
        .await
        .unwrap();
    engine
        .store(StoreRequest::new(
            ContextType::Domain,
            Priority::Medium,
            "lasting note",
        ))
        .await
        .unwrap();

    clock.advance(chrono::Duration::minutes(11));
    let outcome = engine.search(SearchQuery::semantic("note")).await.unwrap();
    assert_eq!(outcome.page.results.len(), 1);
    assert_eq!(
        outcome.page.results[0].context.context_type,
        ContextType::Domain
    );
}

#[tokio::test]
async fn stats_track_operations() {
    let clock = start_clock();
    let engine = ContextEngine::builder(clock).build();

    let outcome = engine
        .store(StoreRequest::new(
            ContextType::Domain,
            Priority::Medium,
            "counted",
        ))
        .await
        .unwrap();
    engine.retrieve(outcome.id, false).await.unwrap();
    engine
        .search(SearchQuery::semantic("counted"))
        .await
        .unwrap();

    let stats = engine.stats();
    assert_eq!(stats.stored_total, 1);
    assert_eq!(stats.retrieved_total, 1);
    assert_eq!(stats.searched_total, 1);
    assert!(stats.oplog_appended_total > 0);
    assert_eq!(stats.search_cache_entries, 1);
}

#[tokio::test]
async fn delete_removes_from_all_tiers_and_invalidates_cache() {
    let clock = start_clock();
    let engine = ContextEngine::builder(clock).build();
    let outcome = engine
        .store(StoreRequest::new(
            ContextType::Domain,
            Priority::Medium,
            "deletable",
        ))
        .await
        .unwrap();
    engine
        .search(SearchQuery::semantic("deletable"))
        .await
        .unwrap();
    assert_eq!(engine.stats().search_cache_entries, 1);

    assert!(engine.delete(outcome.id).await.unwrap());
    assert!(engine.retrieve(outcome.id, false).await.unwrap().is_none());
    assert_eq!(engine.stats().search_cache_entries, 0);
}
