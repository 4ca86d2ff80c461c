//! JSON-lines event replay
//!
//! One `ChainEvent` per line, applied in file order. Blank lines and lines
//! starting with `#` are ignored.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::domain::ChainEvent;
use crate::engine::EventProcessor;
use crate::error::{PredictronError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    /// Applied events by event name
    pub by_event: BTreeMap<&'static str, usize>,
}

/// Parse a JSON-lines event stream
pub fn parse_events(input: &str) -> Result<Vec<ChainEvent>> {
    let mut events = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event: ChainEvent = serde_json::from_str(trimmed).map_err(|e| {
            PredictronError::Validation(format!("line {}: {}", idx + 1, e))
        })?;
        events.push(event);
    }
    Ok(events)
}

pub async fn load_events<P: AsRef<Path>>(path: P) -> Result<Vec<ChainEvent>> {
    let content = tokio::fs::read_to_string(path.as_ref()).await?;
    parse_events(&content)
}

/// Apply events in order; the first store failure aborts the replay
pub async fn replay(processor: &EventProcessor, events: &[ChainEvent]) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    for event in events {
        processor.handle(event).await?;
        summary.applied += 1;
        *summary.by_event.entry(event.event.name()).or_default() += 1;
    }

    info!("Replayed {} events", summary.applied);
    Ok(summary)
}
