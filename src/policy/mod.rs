//! `TierPolicy` - pure tier placement decisions.
//!
//! No I/O, no hidden state beyond configuration. The orchestrator consults
//! this for every write (preferred tier) and every slow-tier read hit
//! (promotion target).

use crate::constants::POLICY_PROMOTION_RECENCY_MS_DEFAULT;
use crate::context::{Context, ContextType};
use crate::dst::SimClock;
use crate::storage::tier::Tier;

/// Placement policy configuration.
#[derive(Debug, Clone)]
pub struct TierPolicy {
    /// A context accessed within this window is promoted to Vector even
    /// without elevated priority.
    promotion_recency_ms: u64,
}

impl TierPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            promotion_recency_ms: POLICY_PROMOTION_RECENCY_MS_DEFAULT,
        }
    }

    /// # Panics
    /// Panics if `promotion_recency_ms` is zero.
    #[must_use]
    pub fn with_promotion_recency_ms(mut self, promotion_recency_ms: u64) -> Self {
        assert!(promotion_recency_ms > 0, "recency window must be positive");
        self.promotion_recency_ms = promotion_recency_ms;
        self
    }

    /// Preferred tier for a write. Priority is checked before type:
    /// elevated priority pins to Hot, then Conversation goes Hot, and
    /// everything else defaults to Vector.
    #[must_use]
    pub fn preferred_tier(&self, context: &Context) -> Tier {
        if context.priority.is_elevated() {
            return Tier::Hot;
        }
        match context.context_type {
            ContextType::Conversation => Tier::Hot,
            ContextType::Domain
            | ContextType::Constitutional
            | ContextType::Agent
            | ContextType::Policy => Tier::Vector,
        }
    }

    /// Promotion target after a slow-tier read hit, or `None` when the
    /// record should stay where it is.
    #[must_use]
    pub fn promotion_tier(&self, context: &Context, clock: &SimClock) -> Option<Tier> {
        if context.priority.is_elevated() {
            return Some(Tier::Hot);
        }
        let accessed_ms = context.accessed_at.timestamp_millis().max(0) as u64;
        if clock.now_ms().saturating_sub(accessed_ms) < self.promotion_recency_ms {
            return Some(Tier::Vector);
        }
        None
    }
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Priority;

    fn context(context_type: ContextType, priority: Priority, clock: &SimClock) -> Context {
        Context::new(context_type, priority, "payload", clock)
    }

    #[test]
    fn test_elevated_priority_prefers_hot() {
        let clock = SimClock::new();
        let policy = TierPolicy::new();
        // Priority wins over type, even for types that default to Vector.
        let ctx = context(ContextType::Constitutional, Priority::Critical, &clock);
        assert_eq!(policy.preferred_tier(&ctx), Tier::Hot);
        let ctx = context(ContextType::Policy, Priority::High, &clock);
        assert_eq!(policy.preferred_tier(&ctx), Tier::Hot);
    }

    #[test]
    fn test_conversation_prefers_hot() {
        let clock = SimClock::new();
        let policy = TierPolicy::new();
        let ctx = context(ContextType::Conversation, Priority::Low, &clock);
        assert_eq!(policy.preferred_tier(&ctx), Tier::Hot);
    }

    #[test]
    fn test_other_types_prefer_vector() {
        let clock = SimClock::new();
        let policy = TierPolicy::new();
        for t in [
            ContextType::Domain,
            ContextType::Constitutional,
            ContextType::Agent,
            ContextType::Policy,
        ] {
            let ctx = context(t, Priority::Medium, &clock);
            assert_eq!(policy.preferred_tier(&ctx), Tier::Vector);
        }
    }

    #[test]
    fn test_promotion_elevated_priority() {
        let clock = SimClock::new();
        let policy = TierPolicy::new();
        let ctx = context(ContextType::Domain, Priority::Critical, &clock);
        assert_eq!(policy.promotion_tier(&ctx, &clock), Some(Tier::Hot));
    }

    #[test]
    fn test_promotion_recent_access() {
        let clock = SimClock::at_ms(1_700_000_000_000);
        let policy = TierPolicy::new();
        let ctx = context(ContextType::Domain, Priority::Medium, &clock);
        clock.advance(chrono::Duration::minutes(30));
        assert_eq!(policy.promotion_tier(&ctx, &clock), Some(Tier::Vector));
    }

    #[test]
    fn test_promotion_stale_access() {
        let clock = SimClock::at_ms(1_700_000_000_000);
        let policy = TierPolicy::new();
        let ctx = context(ContextType::Domain, Priority::Medium, &clock);
        clock.advance(chrono::Duration::hours(2));
        assert_eq!(policy.promotion_tier(&ctx, &clock), None);
    }

    #[test]
    fn test_promotion_custom_recency() {
        let clock = SimClock::at_ms(1_700_000_000_000);
        let policy = TierPolicy::new().with_promotion_recency_ms(1000);
        let ctx = context(ContextType::Domain, Priority::Medium, &clock);
        clock.advance_ms(500);
        assert_eq!(policy.promotion_tier(&ctx, &clock), Some(Tier::Vector));
        clock.advance_ms(600);
        assert_eq!(policy.promotion_tier(&ctx, &clock), None);
    }
}
