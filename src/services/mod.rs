pub mod indexer;
pub mod replay;

pub use indexer::{ChainIndexer, EventSource, PollSummary};
pub use replay::{load_events, parse_events, replay, ReplaySummary};
