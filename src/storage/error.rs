//! Storage error types.
//!
//! `TigerStyle`: Explicit error taxonomy, constructor helpers, transience
//! classification. A tier being unreachable is one uniform error no matter
//! why it failed (timeout, backend down, rejected write); fallback logic
//! never branches on the cause.

use thiserror::Error;
use uuid::Uuid;

use crate::storage::tier::Tier;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// A tier store failed or was unreachable. Absorbed by the fallback
    /// chain; only surfaced once every fallback option is exhausted.
    #[error("tier {tier} unavailable during {operation}: {reason}")]
    TierUnavailable {
        tier: Tier,
        operation: String,
        reason: String,
    },

    /// Id absent from every tier. Internal; the public retrieve surface
    /// maps this to an absent value rather than an error.
    #[error("context {id} not found in any tier")]
    NotFound { id: Uuid },

    /// A record could not be encoded or decoded.
    #[error("serialization failed: {reason}")]
    Serialization { reason: String },
}

impl StorageError {
    pub fn tier_unavailable(
        tier: Tier,
        operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::TierUnavailable {
            tier,
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(id: Uuid) -> Self {
        Self::NotFound { id }
    }

    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TierUnavailable { .. } => true,
            Self::NotFound { .. } | Self::Serialization { .. } => false,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}
