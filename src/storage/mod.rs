//! Storage layer: tier stores, vector index, and the orchestrator that
//! coordinates them.

pub mod error;
pub mod orchestrator;
pub mod sim;
pub mod tier;
pub mod vector;

pub use error::{StorageError, StorageResult};
pub use orchestrator::{RetrieveMeta, StorageOrchestrator, StoreMeta};
pub use sim::SimTierStore;
pub use tier::{Tier, TierRecord, TierStore};
pub use vector::{cosine_similarity, SimVectorIndex, VectorIndex};
