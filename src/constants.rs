//! `TigerStyle` Constants
//!
//! All limits use big-endian naming: `CATEGORY_SPECIFICS_UNIT_LIMIT`
//! Example: `CONTEXT_CONTENT_BYTES_MAX` (not `MAX_CONTENT_SIZE`)
//!
//! Every constant includes units in the name:
//! - _`BYTES_MAX/MIN` for size limits
//! - _MS for milliseconds
//! - _`COUNT_MAX` for quantity limits

// =============================================================================
// Time Constants
// =============================================================================

/// Milliseconds per second
pub const TIME_MS_PER_SEC: u64 = 1000;

/// Milliseconds per minute
pub const TIME_MS_PER_MIN: u64 = 60 * TIME_MS_PER_SEC;

/// Milliseconds per hour
pub const TIME_MS_PER_HOUR: u64 = 60 * TIME_MS_PER_MIN;

/// Milliseconds per day
pub const TIME_MS_PER_DAY: u64 = 24 * TIME_MS_PER_HOUR;

// =============================================================================
// Context Limits
// =============================================================================

/// Maximum size of context content
pub const CONTEXT_CONTENT_BYTES_MAX: usize = 1_000_000; // 1MB

/// Maximum size of a single metadata value
pub const CONTEXT_METADATA_VALUE_BYTES_MAX: usize = 4096;

/// Maximum number of metadata entries per context
pub const CONTEXT_METADATA_COUNT_MAX: usize = 100;

// =============================================================================
// Lifecycle TTL Defaults (per context type)
// =============================================================================

/// Default TTL for Conversation contexts (10 minutes)
pub const TTL_CONVERSATION_MS_DEFAULT: u64 = 10 * TIME_MS_PER_MIN;

/// Default TTL for Domain contexts (24 hours)
pub const TTL_DOMAIN_MS_DEFAULT: u64 = TIME_MS_PER_DAY;

/// Default TTL for Constitutional contexts (4 weeks)
pub const TTL_CONSTITUTIONAL_MS_DEFAULT: u64 = 28 * TIME_MS_PER_DAY;

/// Default TTL for Agent contexts (48 hours)
pub const TTL_AGENT_MS_DEFAULT: u64 = 2 * TIME_MS_PER_DAY;

/// Grace added to tier-level TTLs past the logical deadline (1 hour).
/// Expiry is observed lazily by reads and executed by the sweep; the
/// tier TTL is only a backstop that reclaims records nothing observed.
pub const TIER_TTL_GRACE_MS_DEFAULT: u64 = TIME_MS_PER_HOUR;

// Policy contexts never expire by default; there is deliberately no
// TTL_POLICY_MS_DEFAULT constant.

// =============================================================================
// Tier Policy
// =============================================================================

/// Recency window for promotion to the Vector tier (1 hour)
pub const POLICY_PROMOTION_RECENCY_MS_DEFAULT: u64 = TIME_MS_PER_HOUR;

// =============================================================================
// Search Limits
// =============================================================================

/// Maximum length of a search query
pub const SEARCH_QUERY_BYTES_MAX: usize = 10_000;

/// Maximum number of search results per page
pub const SEARCH_RESULTS_COUNT_MAX: usize = 100;

/// Default number of search results per page
pub const SEARCH_RESULTS_COUNT_DEFAULT: usize = 10;

/// Candidate pool fetched from the vector index before filtering
pub const SEARCH_CANDIDATES_COUNT_DEFAULT: usize = 200;

/// Default minimum similarity score for semantic candidates
pub const SEARCH_MIN_SCORE_DEFAULT: f32 = 0.0;

// =============================================================================
// Search Cache
// =============================================================================

/// Default TTL for cached search pages (15 minutes)
pub const SEARCH_CACHE_TTL_MS_DEFAULT: u64 = 15 * TIME_MS_PER_MIN;

/// Maximum number of cached search pages
pub const SEARCH_CACHE_ENTRIES_COUNT_MAX: usize = 10_000;

// =============================================================================
// Expiry Sweep
// =============================================================================

/// Default interval between expiry sweeps (30 seconds)
pub const EXPIRY_SWEEP_INTERVAL_MS_DEFAULT: u64 = 30 * TIME_MS_PER_SEC;

/// Maximum intents drained per expiry sweep pass
pub const EXPIRY_SWEEP_BATCH_COUNT_MAX: usize = 256;

// =============================================================================
// Operation Log
// =============================================================================

/// Capacity of the operation log ring buffer (oldest evicted on overflow)
pub const OPLOG_RECORDS_COUNT_MAX: usize = 4096;

/// Maximum length of a recorded error string
pub const OPLOG_ERROR_BYTES_MAX: usize = 512;

// =============================================================================
// Embedding Limits
// =============================================================================

/// Number of dimensions in embeddings
pub const EMBEDDING_DIMENSIONS_COUNT: usize = 384;

/// Maximum text size for a single embedding request
pub const EMBEDDING_TEXT_BYTES_MAX: usize = 100_000;

// =============================================================================
// DST (Deterministic Simulation Testing) Limits
// =============================================================================

/// Maximum time advance per step in milliseconds
pub const DST_TIME_ADVANCE_MS_MAX: u64 = 365 * TIME_MS_PER_DAY;

/// Maximum probability for fault injection (1.0 = 100%)
pub const DST_FAULT_PROBABILITY_MAX: f64 = 1.0;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_constants_consistent() {
        assert_eq!(TIME_MS_PER_MIN, 60_000);
        assert_eq!(TIME_MS_PER_HOUR, 3_600_000);
        assert_eq!(TIME_MS_PER_DAY, 86_400_000);
    }

    #[test]
    fn test_ttl_defaults_ordered() {
        assert!(TTL_CONVERSATION_MS_DEFAULT < TTL_DOMAIN_MS_DEFAULT);
        assert!(TTL_DOMAIN_MS_DEFAULT < TTL_AGENT_MS_DEFAULT);
        assert!(TTL_AGENT_MS_DEFAULT < TTL_CONSTITUTIONAL_MS_DEFAULT);
    }

    #[test]
    fn test_search_limits_valid() {
        assert!(SEARCH_RESULTS_COUNT_DEFAULT <= SEARCH_RESULTS_COUNT_MAX);
        assert!(SEARCH_RESULTS_COUNT_MAX <= SEARCH_CANDIDATES_COUNT_DEFAULT);
    }
}
