//! Lifecycle event sink.
//!
//! The engine emits an event after each successful store, retrieve,
//! search, and expiry observation. Publish failures are logged and never
//! fail the operation that produced the event.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::context::{ContextType, Priority};
use crate::dst::{FaultInjector, FaultType};
use crate::storage::tier::Tier;

pub type EventResult<T> = Result<T, EventError>;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("event sink unavailable: {reason}")]
    Unavailable { reason: String },
}

impl EventError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Lifecycle events published to the external bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    ContextStored {
        id: Uuid,
        context_type: ContextType,
        priority: Priority,
        content_hash: String,
        tier: Tier,
        stored_at: DateTime<Utc>,
    },
    ContextRetrieved {
        id: Uuid,
        tier: Tier,
        expired: bool,
        retrieved_at: DateTime<Utc>,
    },
    ContextSearched {
        fingerprint: String,
        result_count: usize,
        cache_hit: bool,
        searched_at: DateTime<Utc>,
    },
    ContextExpired {
        id: Uuid,
        context_type: ContextType,
        archived: bool,
        observed_at: DateTime<Utc>,
    },
}

impl LifecycleEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ContextStored { .. } => "context_stored",
            Self::ContextRetrieved { .. } => "context_retrieved",
            Self::ContextSearched { .. } => "context_searched",
            Self::ContextExpired { .. } => "context_expired",
        }
    }
}

/// Event bus boundary.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: LifecycleEvent) -> EventResult<()>;
}

/// Collects published events in memory for inspection.
#[derive(Default)]
pub struct SimEventSink {
    events: Arc<Mutex<Vec<LifecycleEvent>>>,
    fault_injector: Option<FaultInjector>,
}

impl SimEventSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_fault_injector(mut self, injector: FaultInjector) -> Self {
        self.fault_injector = Some(injector);
        self
    }

    #[must_use]
    pub fn published(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }

    #[must_use]
    pub fn count_named(&self, name: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.name() == name)
            .count()
    }
}

/// Discards every event. For deployments without a bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn publish(&self, _event: LifecycleEvent) -> EventResult<()> {
        Ok(())
    }
}

#[async_trait]
impl EventSink for SimEventSink {
    async fn publish(&self, event: LifecycleEvent) -> EventResult<()> {
        if let Some(injector) = &self.fault_injector {
            if injector.should_inject(FaultType::EventPublishFail, event.name()) {
                return Err(EventError::unavailable("injected fault"));
            }
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}
