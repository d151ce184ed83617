//! Search types and the ranking pipeline.
//!
//! A query is canonicalized into a stable fingerprint for caching, then
//! (on a cache miss) candidates are ranked by similarity, filtered, and
//! paginated. Filtering happens after ranking so ranking always sees the
//! full candidate pool; ranks are renumbered from `offset + 1` after
//! pagination.

pub mod cache;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::constants::{
    SEARCH_MIN_SCORE_DEFAULT, SEARCH_QUERY_BYTES_MAX, SEARCH_RESULTS_COUNT_DEFAULT,
    SEARCH_RESULTS_COUNT_MAX,
};
use crate::context::{Context, ContextType, Priority};

pub use cache::SearchCache;

// =============================================================================
// Query
// =============================================================================

/// A search request. `text = None` disables the semantic portion and the
/// query runs filter-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub type_filters: Vec<ContextType>,
    pub priority_filter: Option<Priority>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub tag_filters: Vec<String>,
    pub limit: usize,
    pub offset: usize,
    pub min_score: f32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: None,
            type_filters: Vec::new(),
            priority_filter: None,
            created_after: None,
            created_before: None,
            tag_filters: Vec::new(),
            limit: SEARCH_RESULTS_COUNT_DEFAULT,
            offset: 0,
            min_score: SEARCH_MIN_SCORE_DEFAULT,
        }
    }
}

impl SearchQuery {
    #[must_use]
    pub fn semantic(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn filter_only() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_types(mut self, types: Vec<ContextType>) -> Self {
        self.type_filters = types;
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority_filter = Some(priority);
        self
    }

    #[must_use]
    pub fn with_date_range(
        mut self,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_after = after;
        self.created_before = before;
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tag_filters = tags;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Reject malformed queries before any collaborator is touched.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(text) = &self.text {
            if text.is_empty() {
                return Err("query text must not be empty".into());
            }
            if text.len() > SEARCH_QUERY_BYTES_MAX {
                return Err(format!(
                    "query text exceeds {SEARCH_QUERY_BYTES_MAX} bytes"
                ));
            }
        }
        if self.limit == 0 || self.limit > SEARCH_RESULTS_COUNT_MAX {
            return Err(format!(
                "limit must be in 1..={SEARCH_RESULTS_COUNT_MAX}"
            ));
        }
        if let (Some(after), Some(before)) = (self.created_after, self.created_before) {
            if after > before {
                return Err("created_after must not exceed created_before".into());
            }
        }
        Ok(())
    }

    /// Whether the semantic portion is requested.
    #[must_use]
    pub fn is_semantic(&self) -> bool {
        self.text.is_some()
    }

    /// Deterministic hash over the full canonicalized query. Identical
    /// inputs always produce identical fingerprints; filter order within
    /// a query does not matter.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut types: Vec<&str> = self.type_filters.iter().map(ContextType::as_str).collect();
        types.sort_unstable();
        types.dedup();
        let mut tags: Vec<&str> = self.tag_filters.iter().map(String::as_str).collect();
        tags.sort_unstable();
        tags.dedup();

        let canonical = format!(
            "text={}|types={}|priority={}|after={}|before={}|tags={}|limit={}|offset={}|min_score={}",
            self.text.as_deref().unwrap_or(""),
            types.join(","),
            self.priority_filter.map_or("", |p| p.as_str()),
            self.created_after
                .map_or_else(String::new, |d| d.timestamp_millis().to_string()),
            self.created_before
                .map_or_else(String::new, |d| d.timestamp_millis().to_string()),
            tags.join(","),
            self.limit,
            self.offset,
            self.min_score,
        );

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
    }
}

// =============================================================================
// Results
// =============================================================================

/// One ranked hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: Uuid,
    pub context: Context,
    pub score: f32,
    /// 1-based position within the full (pre-pagination) result list,
    /// renumbered from `offset + 1` after pagination.
    pub rank: usize,
}

/// The paginated, ranked, filtered page produced by one search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    pub results: Vec<SearchResult>,
    pub fingerprint: String,
    /// Whether the page was computed in degraded (filter-only fallback)
    /// mode. Travels with the page so cache hits report it faithfully.
    pub degraded: bool,
}

// =============================================================================
// Ranking pipeline
// =============================================================================

/// Sort candidates by score descending. Ties keep their original order
/// (stable sort): retrieval order is the only tie-break signal.
#[must_use]
pub fn rank_candidates(mut candidates: Vec<(Context, f32)>) -> Vec<(Context, f32)> {
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    candidates
}

/// Apply type, priority, date, and tag filters. Runs after ranking, not
/// before, so ranking always sees the maximum candidate pool.
#[must_use]
pub fn filter_candidates(
    candidates: Vec<(Context, f32)>,
    query: &SearchQuery,
) -> Vec<(Context, f32)> {
    candidates
        .into_iter()
        .filter(|(ctx, _)| {
            query.type_filters.is_empty() || query.type_filters.contains(&ctx.context_type)
        })
        .filter(|(ctx, _)| {
            query
                .priority_filter
                .map_or(true, |p| ctx.priority == p)
        })
        .filter(|(ctx, _)| query.created_after.map_or(true, |d| ctx.created_at >= d))
        .filter(|(ctx, _)| query.created_before.map_or(true, |d| ctx.created_at <= d))
        .filter(|(ctx, _)| {
            query
                .tag_filters
                .iter()
                .all(|tag| ctx.tags.iter().any(|t| t == tag))
        })
        .collect()
}

/// Apply offset/limit and number ranks starting at `offset + 1`.
#[must_use]
pub fn paginate(
    candidates: Vec<(Context, f32)>,
    offset: usize,
    limit: usize,
) -> Vec<SearchResult> {
    assert!(limit > 0, "limit must be positive");
    candidates
        .into_iter()
        .skip(offset)
        .take(limit)
        .enumerate()
        .map(|(i, (context, score))| SearchResult {
            id: context.id,
            context,
            score,
            rank: offset + i + 1,
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
