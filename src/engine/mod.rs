//! Event processor
//!
//! Folds contract events into the derived entities. One event is handled to
//! completion before the next one on the same chain; every handler re-reads
//! the entities it touches from the store instead of caching between events.
//!
//! - `positions`: BetPlaced (pools, position, fence, volume)
//! - `rounds`: RoundStarted, ExternalPredictionAdded, RoundEnded, AI accuracy
//! - `settlement`: per (round, user) finalization and RewardClaimed
//! - `stats`: the once-per-round statistics tail
//! - `reward`: payout arithmetic

mod positions;
pub mod reward;
mod rounds;
mod settlement;
mod stats;

pub use reward::{compute_gross_reward, FeeSchedule, PRECISION};
pub use settlement::SettlementState;
pub use stats::record_settlement;

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::domain::{ArenaEvent, ChainEvent};
use crate::error::Result;
use crate::persistence::EntityStore;

/// Applies contract events to the entity store
#[derive(Clone)]
pub struct EventProcessor {
    store: Arc<dyn EntityStore>,
    fees: FeeSchedule,
}

impl EventProcessor {
    pub fn new(store: Arc<dyn EntityStore>, fees: FeeSchedule) -> Self {
        Self { store, fees }
    }

    /// Processor with the contract's default 2% fee
    pub fn with_default_fees(store: Arc<dyn EntityStore>) -> Self {
        Self::new(store, FeeSchedule::default())
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn fees(&self) -> FeeSchedule {
        self.fees
    }

    /// Apply one event. Store failures abort the event and propagate.
    #[instrument(
        skip(self, event),
        fields(
            chain_id = event.chain_id,
            event = event.event.name(),
            round_id = event.event.round_id(),
        )
    )]
    pub async fn handle(&self, event: &ChainEvent) -> Result<()> {
        let chain_id = event.chain_id;
        debug!(
            "Handling {} at block {} log {}",
            event.event.name(),
            event.block_number,
            event.log_index
        );

        match &event.event {
            ArenaEvent::BetPlaced(bet) => self.on_bet_placed(chain_id, bet).await,
            ArenaEvent::RoundStarted(started) => self.on_round_started(chain_id, started).await,
            ArenaEvent::RoundEnded(ended) => self.on_round_ended(chain_id, ended).await,
            ArenaEvent::ExternalPredictionAdded(prediction) => {
                self.on_prediction_added(chain_id, prediction).await
            }
            ArenaEvent::RewardClaimed(claim) => self.on_reward_claimed(chain_id, claim).await,
        }
    }

    /// Apply a sequence of events in order, stopping at the first failure
    pub async fn handle_all<'a, I>(&self, events: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a ChainEvent>,
    {
        let mut applied = 0;
        for event in events {
            self.handle(event).await?;
            applied += 1;
        }
        Ok(applied)
    }
}
