use tracing::debug;

use super::EventProcessor;
use crate::domain::{keys, BetPlaced, Round, RoundParticipant, UserRound, UserStats};
use crate::error::Result;

impl EventProcessor {
    /// BetPlaced: settle the user's earlier rounds, then book the stake on
    /// the round, the position and the user's lifetime volume.
    pub(crate) async fn on_bet_placed(&self, chain_id: u64, bet: &BetPlaced) -> Result<()> {
        let previous = 1..=bet.round_id.saturating_sub(1);
        let finalized = self.finalize_range(chain_id, &bet.user, previous).await?;
        debug!(
            "BetPlaced: scanned {} previous rounds for {} ({} finalized)",
            bet.round_id.saturating_sub(1),
            bet.user,
            finalized
        );

        // Round pools and participants
        let round_key = keys::round_key(chain_id, bet.round_id);
        let mut round = self
            .store
            .get_round(&round_key)
            .await?
            .unwrap_or_else(|| Round::new(chain_id, bet.round_id, &self.fees));
        round.add_stake(bet.side, bet.amount);
        round.add_participant(&bet.user);
        self.store.upsert_round(&round).await?;

        // Position; settlement fields are left for the result processor
        let position_key = keys::user_round_key(chain_id, bet.round_id, &bet.user);
        let mut position = self
            .store
            .get_user_round(&position_key)
            .await?
            .unwrap_or_else(|| UserRound::new(chain_id, bet.round_id, &bet.user));
        position.add_stake(bet.side, bet.amount);
        self.store.upsert_user_round(&position).await?;

        // Fence is created once and never reset
        let fence_key = keys::participant_key(chain_id, bet.round_id, &bet.user);
        if self.store.get_round_participant(&fence_key).await?.is_none() {
            let fence = RoundParticipant::new(chain_id, bet.round_id, &bet.user);
            self.store.upsert_round_participant(&fence).await?;
        }

        // Volume counts now; rounds played only count at resolution
        let stats_key = keys::user_key(chain_id, &bet.user);
        let mut stats = self
            .store
            .get_user_stats(&stats_key)
            .await?
            .unwrap_or_else(|| UserStats::new(chain_id, &bet.user));
        stats.total_bet += bet.amount;
        self.save_user_stats(&stats).await?;

        debug!(
            "BetPlaced: {} staked {} {} in round {} (pools up={} down={})",
            bet.user, bet.amount, bet.side, bet.round_id, round.total_up, round.total_down
        );
        Ok(())
    }
}
