//! Expiry intents.
//!
//! Observing an expired context never deletes or archives it inline; the
//! observation queues an intent and the background sweep executes it.
//! Governance material (Constitutional, Policy) is archived, everything
//! else is deleted.

use std::collections::VecDeque;
use std::sync::Mutex;

use uuid::Uuid;

use crate::context::ContextType;

/// What the sweep should do with an expired context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryIntent {
    Archive { id: Uuid },
    Delete { id: Uuid },
}

impl ExpiryIntent {
    /// The intent appropriate for an expired context of the given type.
    #[must_use]
    pub fn for_type(id: Uuid, context_type: ContextType) -> Self {
        if context_type.archives_on_expiry() {
            Self::Archive { id }
        } else {
            Self::Delete { id }
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            Self::Archive { id } | Self::Delete { id } => *id,
        }
    }
}

/// FIFO queue of pending intents, deduplicated by context id.
#[derive(Debug, Default)]
pub struct ExpiryQueue {
    intents: Mutex<VecDeque<ExpiryIntent>>,
}

impl ExpiryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an intent. A second observation of the same id before the
    /// sweep runs is a no-op.
    pub fn push(&self, intent: ExpiryIntent) {
        let mut intents = self.intents.lock().unwrap();
        if intents.iter().any(|i| i.id() == intent.id()) {
            return;
        }
        intents.push_back(intent);
    }

    /// Remove and return up to `max` intents, oldest first.
    #[must_use]
    pub fn drain(&self, max: usize) -> Vec<ExpiryIntent> {
        assert!(max > 0, "max must be positive");
        let mut intents = self.intents.lock().unwrap();
        let take = max.min(intents.len());
        intents.drain(..take).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.intents.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
