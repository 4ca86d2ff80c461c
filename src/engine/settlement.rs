//! Result processor
//!
//! `finalize_user_round` is the single reconciliation step for a
//! (round, user) pair. It is called from three places: the catch-up scan on
//! BetPlaced, the participant sweep on RoundEnded and the double scan on
//! RewardClaimed. Derived position fields are recomputed in full on every
//! call; user statistics move only on the first call after the round has a
//! result, gated by the RoundParticipant fence.

use std::fmt;
use std::ops::RangeInclusive;
use tracing::{debug, instrument};

use super::EventProcessor;
use crate::domain::{keys, RewardClaimed, RoundParticipant, UserStats};
use crate::error::Result;

/// State of a (round, user) pair as found on entry to finalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementState {
    /// User never bet in this round
    NoPosition,
    /// Round missing or without a result/end time yet
    RoundUnresolved,
    /// First settlement: reward written, statistics counted, fence set
    ResolvedUnprocessed,
    /// Already counted: reward recomputed, statistics untouched
    ResolvedProcessed,
}

impl SettlementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementState::NoPosition => "NO_POSITION",
            SettlementState::RoundUnresolved => "ROUND_UNRESOLVED",
            SettlementState::ResolvedUnprocessed => "RESOLVED_UNPROCESSED",
            SettlementState::ResolvedProcessed => "RESOLVED_PROCESSED",
        }
    }

    /// Did this call run the statistics tail?
    pub fn ran_statistics(&self) -> bool {
        matches!(self, SettlementState::ResolvedUnprocessed)
    }
}

impl fmt::Display for SettlementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl EventProcessor {
    /// Settle one user's position in one round, if the round is resolved.
    ///
    /// Missing entities are "not ready yet" and return without writing.
    #[instrument(skip(self))]
    pub async fn finalize_user_round(
        &self,
        chain_id: u64,
        round_id: u64,
        user: &str,
    ) -> Result<SettlementState> {
        let position_key = keys::user_round_key(chain_id, round_id, user);
        let Some(mut position) = self.store.get_user_round(&position_key).await? else {
            return Ok(SettlementState::NoPosition);
        };

        let round_key = keys::round_key(chain_id, round_id);
        let round = match self.store.get_round(&round_key).await? {
            Some(round) if round.is_resolved() => round,
            _ => return Ok(SettlementState::RoundUnresolved),
        };
        let Some(result) = round.result else {
            return Ok(SettlementState::RoundUnresolved);
        };

        let gross = round.fee_schedule().gross_reward(
            result,
            position.up_amount,
            position.down_amount,
            round.total_up,
            round.total_down,
        );
        position.apply_reward(gross);
        self.store.upsert_user_round(&position).await?;

        let fence_key = keys::participant_key(chain_id, round_id, user);
        let fence = self.store.get_round_participant(&fence_key).await?;
        if fence.as_ref().is_some_and(|f| f.processed_results) {
            return Ok(SettlementState::ResolvedProcessed);
        }

        let stats_key = keys::user_key(chain_id, user);
        let mut stats = self
            .store
            .get_user_stats(&stats_key)
            .await?
            .unwrap_or_else(|| UserStats::new(chain_id, user));
        super::record_settlement(&mut stats, result, &position);
        self.save_user_stats(&stats).await?;

        let mut fence = fence.unwrap_or_else(|| RoundParticipant::new(chain_id, round_id, user));
        fence.processed_results = true;
        self.store.upsert_round_participant(&fence).await?;

        debug!(
            "Settled round {} for {}: result {} gross {} net {} won {}",
            round_id, position.user, result, position.gross_reward, position.net_pnl, position.won
        );
        Ok(SettlementState::ResolvedUnprocessed)
    }

    /// Finalize each round in `rounds` for `user`; returns how many were
    /// counted for the first time.
    pub(crate) async fn finalize_range(
        &self,
        chain_id: u64,
        user: &str,
        rounds: RangeInclusive<u64>,
    ) -> Result<usize> {
        let mut finalized = 0;
        for round_id in rounds {
            if self
                .finalize_user_round(chain_id, round_id, user)
                .await?
                .ran_statistics()
            {
                finalized += 1;
            }
        }
        Ok(finalized)
    }

    /// RewardClaimed: full catch-up through the claimed round, a second pass
    /// over the last three rounds, then mark the position claimed.
    pub(crate) async fn on_reward_claimed(
        &self,
        chain_id: u64,
        claim: &RewardClaimed,
    ) -> Result<()> {
        let finalized = self
            .finalize_range(chain_id, &claim.user, 1..=claim.round_id)
            .await?;

        // Re-scan in case the round ended just before the claim
        let recent_start = claim.round_id.saturating_sub(2).max(1);
        let rescanned = self
            .finalize_range(chain_id, &claim.user, recent_start..=claim.round_id)
            .await?;
        debug!(
            "RewardClaimed: {} rounds 1..={} ({} finalized, {} on re-scan from {})",
            claim.user, claim.round_id, finalized, rescanned, recent_start
        );

        let position_key = keys::user_round_key(chain_id, claim.round_id, &claim.user);
        if let Some(mut position) = self.store.get_user_round(&position_key).await? {
            if !position.claimed {
                position.claimed = true;
                self.store.upsert_user_round(&position).await?;
            }
        } else {
            debug!(
                "RewardClaimed: no position for {} in round {}",
                claim.user, claim.round_id
            );
        }
        Ok(())
    }
}
