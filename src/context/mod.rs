//! Context data model.
//!
//! A [`Context`] is the unit of storage for the engine: an opaque text
//! payload plus the lifecycle fields (type, priority, status, timestamps,
//! TTL) that drive tier placement and expiry.
//!
//! `TigerStyle`: Explicit types, validated construction, assertions on
//! state transitions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::constants::{
    CONTEXT_CONTENT_BYTES_MAX, TTL_AGENT_MS_DEFAULT, TTL_CONSTITUTIONAL_MS_DEFAULT,
    TTL_CONVERSATION_MS_DEFAULT, TTL_DOMAIN_MS_DEFAULT,
};
use crate::dst::SimClock;

// =============================================================================
// Enums
// =============================================================================

/// Context category. Immutable after creation; determines the default TTL
/// and which expiry intent (archive vs delete) applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    Conversation,
    Domain,
    Constitutional,
    Agent,
    Policy,
}

impl ContextType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversation => "conversation",
            Self::Domain => "domain",
            Self::Constitutional => "constitutional",
            Self::Agent => "agent",
            Self::Policy => "policy",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "conversation" => Some(Self::Conversation),
            "domain" => Some(Self::Domain),
            "constitutional" => Some(Self::Constitutional),
            "agent" => Some(Self::Agent),
            "policy" => Some(Self::Policy),
            _ => None,
        }
    }

    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::Conversation,
            Self::Domain,
            Self::Constitutional,
            Self::Agent,
            Self::Policy,
        ]
    }

    /// Default time-to-live in milliseconds. `None` means never expires.
    #[must_use]
    pub fn default_ttl_ms(&self) -> Option<u64> {
        match self {
            Self::Conversation => Some(TTL_CONVERSATION_MS_DEFAULT),
            Self::Domain => Some(TTL_DOMAIN_MS_DEFAULT),
            Self::Constitutional => Some(TTL_CONSTITUTIONAL_MS_DEFAULT),
            Self::Agent => Some(TTL_AGENT_MS_DEFAULT),
            Self::Policy => None,
        }
    }

    /// Whether an expired context of this type is archived instead of
    /// deleted. Governance material (constitutional, policy) is never
    /// destroyed by the expiry sweep.
    #[must_use]
    pub fn archives_on_expiry(&self) -> bool {
        matches!(self, Self::Constitutional | Self::Policy)
    }
}

impl std::fmt::Display for ContextType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Placement priority. Mutable; Critical and High pin a context to the
/// hot tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Whether this priority pins the context to the hot tier.
    #[must_use]
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status. Transitions are one-directional except
/// Active <-> Pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextStatus {
    Active,
    Pending,
    Archived,
    Expired,
}

impl ContextStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Archived => "archived",
            Self::Expired => "expired",
        }
    }

    /// Whether a transition to `next` is legal.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Active, Self::Pending) | (Self::Pending, Self::Active) => true,
            (Self::Active | Self::Pending, Self::Archived | Self::Expired) => true,
            (Self::Expired, Self::Archived) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ContextStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Context
// =============================================================================

/// The unit of storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub id: Uuid,
    pub context_type: ContextType,
    pub priority: Priority,
    pub status: ContextStatus,
    pub content: String,
    /// Hex SHA-256 of `content`. Recomputed on every content mutation.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    /// `None` means never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Populated by the embedding collaborator; absence is valid and means
    /// semantic search skips this context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_vector: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_ids: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Context {
    /// Create an active context at the clock's current time, with
    /// `expires_at` derived from the type's default TTL.
    ///
    /// # Panics
    /// Panics if `content` is empty or exceeds `CONTEXT_CONTENT_BYTES_MAX`.
    #[must_use]
    pub fn new(
        context_type: ContextType,
        priority: Priority,
        content: impl Into<String>,
        clock: &SimClock,
    ) -> Self {
        let content = content.into();
        // Preconditions
        assert!(!content.is_empty(), "content must not be empty");
        assert!(
            content.len() <= CONTEXT_CONTENT_BYTES_MAX,
            "content exceeds {} bytes",
            CONTEXT_CONTENT_BYTES_MAX
        );

        let now = clock.now();
        let expires_at = context_type
            .default_ttl_ms()
            .map(|ttl_ms| now + chrono::Duration::milliseconds(ttl_ms as i64));
        let content_hash = content_hash(&content);

        let context = Self {
            id: Uuid::new_v4(),
            context_type,
            priority,
            status: ContextStatus::Active,
            content,
            content_hash,
            created_at: now,
            updated_at: now,
            accessed_at: now,
            expires_at,
            embedding_vector: None,
            parent_id: None,
            child_ids: Vec::new(),
            tags: Vec::new(),
            metadata: HashMap::new(),
        };

        // Postcondition
        debug_assert_eq!(context.content_hash, self::content_hash(&context.content));
        context
    }

    #[must_use]
    pub fn with_expires_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Replace the content, recomputing the hash and bumping `updated_at`.
    ///
    /// # Panics
    /// Panics if `content` is empty or exceeds `CONTEXT_CONTENT_BYTES_MAX`.
    pub fn set_content(&mut self, content: impl Into<String>, clock: &SimClock) {
        let content = content.into();
        assert!(!content.is_empty(), "content must not be empty");
        assert!(
            content.len() <= CONTEXT_CONTENT_BYTES_MAX,
            "content exceeds {} bytes",
            CONTEXT_CONTENT_BYTES_MAX
        );

        self.content_hash = content_hash(&content);
        self.content = content;
        self.updated_at = clock.now();
    }

    /// Whether `expires_at` is in the past on the given clock.
    ///
    /// A context whose deadline has passed is logically expired regardless
    /// of its stored `status` field (lazy expiry).
    #[must_use]
    pub fn is_expired(&self, clock: &SimClock) -> bool {
        match self.expires_at {
            Some(deadline) => clock.is_past(deadline),
            None => false,
        }
    }

    /// Refresh `accessed_at` to the clock's current time.
    pub fn touch(&mut self, clock: &SimClock) {
        let now = clock.now();
        // accessed_at is monotonically non-decreasing
        if now > self.accessed_at {
            self.accessed_at = now;
        }
    }

    /// Transition status, enforcing the legal transition graph.
    ///
    /// # Panics
    /// Panics on an illegal transition.
    pub fn set_status(&mut self, next: ContextStatus) {
        assert!(
            self.status.can_transition_to(next),
            "illegal status transition {} -> {}",
            self.status,
            next
        );
        self.status = next;
    }
}

/// Hex SHA-256 of a content string.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    debug_assert_eq!(hex.len(), 64);
    hex
}

// =============================================================================
// Tests
// =============================================================================
