//! Tiered context-management engine.
//!
//! Stores governance contexts across three storage tiers (Hot, Vector,
//! Archive) with policy-driven placement, deterministic cross-tier
//! fallback, promotion on access, TTL-driven lifecycle, and a cached
//! hybrid-ranked search.
//!
//! # Architecture
//!
//! - [`engine::ContextEngine`] - façade: validation, compliance gating,
//!   embedding, search, expiry intents, events.
//! - [`storage::StorageOrchestrator`] - cross-tier store/retrieve with
//!   fallback and promotion.
//! - [`policy::TierPolicy`] - pure tier placement decisions.
//! - [`search::SearchCache`] - TTL-keyed cache of ranked result pages.
//! - [`dst`] - deterministic simulation: seeded RNG, simulated clock,
//!   fault injection. The engine reads all time from [`dst::SimClock`],
//!   so every TTL behavior is reproducible under test.
//!
//! # Example
//!
//! ```
//! use context_engine::context::{ContextType, Priority};
//! use context_engine::dst::SimClock;
//! use context_engine::engine::{ContextEngine, StoreRequest};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let clock = SimClock::from_system_time();
//! let engine = ContextEngine::builder(clock).build();
//!
//! let outcome = engine
//!     .store(StoreRequest::new(
//!         ContextType::Conversation,
//!         Priority::Medium,
//!         "hello",
//!     ))
//!     .await
//!     .unwrap();
//!
//! let hit = engine.retrieve(outcome.id, true).await.unwrap().unwrap();
//! assert_eq!(hit.context.content, "hello");
//! # }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]

pub mod compliance;
pub mod constants;
pub mod context;
pub mod dst;
pub mod embedding;
pub mod engine;
pub mod events;
pub mod oplog;
pub mod policy;
pub mod search;
pub mod storage;
pub mod telemetry;

pub use context::{Context, ContextStatus, ContextType, Priority};
pub use engine::{ContextEngine, EngineError, EngineResult, StoreRequest};
pub use search::SearchQuery;
pub use storage::Tier;
