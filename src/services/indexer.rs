//! Per-chain dispatch loop
//!
//! Pulls arena events from an `EventSource` in bounded block batches and
//! hands them to the `EventProcessor` strictly in (block, log index) order.
//! Progress is saved after every event so a restart resumes right after the
//! last applied log.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::config::IndexerConfig;
use crate::domain::{ChainEvent, IndexerCursor};
use crate::engine::EventProcessor;
use crate::error::Result;

/// Ordered supply of arena events for one chain
#[async_trait]
pub trait EventSource: Send + Sync {
    fn chain_id(&self) -> u64;

    async fn latest_block(&self) -> Result<u64>;

    /// Events in `from_block..=to_block`, ordered by (block, log index)
    async fn fetch_events(&self, from_block: u64, to_block: u64) -> Result<Vec<ChainEvent>>;
}

/// Outcome of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollSummary {
    /// Events applied in this poll
    pub applied: usize,
    /// Events skipped because the cursor already covered them
    pub skipped: usize,
    /// Last block fully processed, if any range was fetched
    pub to_block: Option<u64>,
    /// More blocks are available beyond `to_block`
    pub behind: bool,
}

pub struct ChainIndexer {
    config: IndexerConfig,
    start_block: u64,
    source: Arc<dyn EventSource>,
    processor: EventProcessor,
}

impl ChainIndexer {
    pub fn new(
        config: IndexerConfig,
        start_block: u64,
        source: Arc<dyn EventSource>,
        processor: EventProcessor,
    ) -> Self {
        Self {
            config,
            start_block,
            source,
            processor,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.source.chain_id()
    }

    /// Fetch and apply the next batch of blocks
    #[instrument(skip(self), fields(chain_id = self.chain_id()))]
    pub async fn poll_once(&self) -> Result<PollSummary> {
        let chain_id = self.chain_id();
        let store = self.processor.store();

        let cursor = store.get_cursor(chain_id).await?;
        let from_block = cursor
            .map(|c| c.resume_block())
            .unwrap_or(self.start_block)
            .max(self.start_block);

        let head = self.source.latest_block().await?;
        let safe_head = head.saturating_sub(self.config.confirmations);
        if from_block > safe_head {
            return Ok(PollSummary::default());
        }

        let batch = self.config.block_batch_size.max(1);
        let to_block = from_block.saturating_add(batch - 1).min(safe_head);
        let events = self.source.fetch_events(from_block, to_block).await?;

        let mut summary = PollSummary {
            to_block: Some(to_block),
            behind: to_block < safe_head,
            ..Default::default()
        };

        for event in &events {
            if cursor.is_some_and(|c| c.covers(event.block_number, event.log_index)) {
                summary.skipped += 1;
                continue;
            }
            self.processor.handle(event).await?;
            store
                .save_cursor(&IndexerCursor {
                    chain_id,
                    block_number: event.block_number,
                    log_index: Some(event.log_index),
                })
                .await?;
            summary.applied += 1;
        }

        store
            .save_cursor(&IndexerCursor::block_done(chain_id, to_block))
            .await?;

        debug!(
            "Chain {}: blocks {}..={} applied {} skipped {}",
            chain_id, from_block, to_block, summary.applied, summary.skipped
        );
        Ok(summary)
    }

    /// Poll until the shutdown flag flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let chain_id = self.chain_id();
        info!(
            "Indexer for chain {} started (batch {} blocks, {} confirmations)",
            chain_id, self.config.block_batch_size, self.config.confirmations
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = match self.poll_once().await {
                Ok(summary) => {
                    if summary.applied > 0 {
                        info!(
                            "Chain {}: applied {} events through block {:?}",
                            chain_id, summary.applied, summary.to_block
                        );
                    }
                    if summary.behind {
                        Duration::ZERO
                    } else {
                        Duration::from_millis(self.config.poll_interval_ms)
                    }
                }
                Err(e) => {
                    error!("Chain {}: poll failed: {}", chain_id, e);
                    warn!(
                        "Chain {}: retrying from saved cursor in {}ms",
                        chain_id, self.config.retry_backoff_ms
                    );
                    Duration::from_millis(self.config.retry_backoff_ms)
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Indexer for chain {} stopped", chain_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::amount::eth;
    use crate::domain::{keys, ArenaEvent, BetPlaced, Side};
    use crate::persistence::{EntityStore, MemoryStore};
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FakeSource {
        head: AtomicU64,
        events: Vec<ChainEvent>,
    }

    #[async_trait]
    impl EventSource for FakeSource {
        fn chain_id(&self) -> u64 {
            1
        }

        async fn latest_block(&self) -> Result<u64> {
            Ok(self.head.load(Ordering::SeqCst))
        }

        async fn fetch_events(&self, from_block: u64, to_block: u64) -> Result<Vec<ChainEvent>> {
            Ok(self
                .events
                .iter()
                .filter(|e| e.block_number >= from_block && e.block_number <= to_block)
                .cloned()
                .collect())
        }
    }

    fn bet(block: u64, index: u64, user: &str) -> ChainEvent {
        ChainEvent::new(
            1,
            ArenaEvent::BetPlaced(BetPlaced {
                round_id: 1,
                user: user.to_string(),
                amount: eth(1),
                side: Side::Up,
            }),
        )
        .at(block, index)
    }

    fn indexer(store: Arc<MemoryStore>, source: Arc<FakeSource>, batch: u64) -> ChainIndexer {
        let config = IndexerConfig {
            block_batch_size: batch,
            confirmations: 0,
            ..Default::default()
        };
        ChainIndexer::new(
            config,
            10,
            source,
            EventProcessor::with_default_fees(store),
        )
    }

    #[tokio::test]
    async fn test_poll_applies_in_batches_and_advances_cursor() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(FakeSource {
            head: AtomicU64::new(30),
            events: vec![bet(12, 0, "0xa"), bet(12, 1, "0xb"), bet(25, 0, "0xc")],
        });
        let indexer = indexer(store.clone(), source, 10);

        let first = indexer.poll_once().await.unwrap();
        assert_eq!(first.applied, 2);
        assert_eq!(first.to_block, Some(19));
        assert!(first.behind);

        let second = indexer.poll_once().await.unwrap();
        assert_eq!(second.applied, 1);
        assert_eq!(second.to_block, Some(29));

        let third = indexer.poll_once().await.unwrap();
        assert_eq!(third.applied, 0);
        assert_eq!(third.to_block, Some(30));
        assert!(!third.behind);

        let idle = indexer.poll_once().await.unwrap();
        assert_eq!(idle, PollSummary::default());

        let round = store.get_round(&keys::round_key(1, 1)).await.unwrap().unwrap();
        assert_eq!(round.total_up, eth(3));
        assert_eq!(round.participants, vec!["0xa", "0xb", "0xc"]);
    }

    #[tokio::test]
    async fn test_partial_block_resumes_after_last_applied_log() {
        let store = Arc::new(MemoryStore::new());
        // Crash after applying the first log of block 12
        store
            .save_cursor(&IndexerCursor {
                chain_id: 1,
                block_number: 12,
                log_index: Some(0),
            })
            .await
            .unwrap();

        let source = Arc::new(FakeSource {
            head: AtomicU64::new(12),
            events: vec![bet(12, 0, "0xa"), bet(12, 1, "0xb")],
        });
        let summary = indexer(store.clone(), source, 100).poll_once().await.unwrap();

        assert_eq!(summary.applied, 1);
        assert_eq!(summary.skipped, 1);
        let round = store.get_round(&keys::round_key(1, 1)).await.unwrap().unwrap();
        assert_eq!(round.total_up, eth(1));
        assert_eq!(
            store.get_cursor(1).await.unwrap(),
            Some(IndexerCursor::block_done(1, 12))
        );
    }

    #[tokio::test]
    async fn test_confirmations_hold_back_head() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(FakeSource {
            head: AtomicU64::new(14),
            events: vec![bet(12, 0, "0xa")],
        });
        let config = IndexerConfig {
            confirmations: 5,
            ..Default::default()
        };
        let indexer = ChainIndexer::new(
            config,
            10,
            source.clone(),
            EventProcessor::with_default_fees(store.clone()),
        );

        assert_eq!(indexer.poll_once().await.unwrap(), PollSummary::default());

        source.head.store(17, Ordering::SeqCst);
        let summary = indexer.poll_once().await.unwrap();
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.to_block, Some(12));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(FakeSource {
            head: AtomicU64::new(10),
            events: Vec::new(),
        });
        let indexer = indexer(store, source, 10);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { indexer.run(rx).await });
        tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("indexer did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
