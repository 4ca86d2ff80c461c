pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod services;

pub use adapters::{PostgresStore, RpcEventSource};
pub use config::AppConfig;
pub use domain::{ArenaEvent, ChainEvent};
pub use engine::{EventProcessor, FeeSchedule, SettlementState};
pub use error::{PredictronError, Result};
pub use persistence::{EntityStore, MemoryStore};
pub use services::{ChainIndexer, EventSource};
