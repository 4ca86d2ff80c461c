//! Entity store port and the in-process implementation
//!
//! - `EntityStore`: keyed get/upsert per entity type plus dispatch cursors
//! - `MemoryStore`: JSON documents behind a tokio `RwLock`
//!
//! The Postgres implementation lives in `adapters::postgres`.

pub mod memory;
pub mod store;

pub use memory::MemoryStore;
pub use store::{rank_leaderboard, EntityStore};

#[cfg(test)]
pub use store::MockEntityStore;
