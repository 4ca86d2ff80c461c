use super::EventProcessor;
use crate::domain::{LeaderboardRow, Outcome, UserRound, UserStats};
use crate::error::Result;

/// Fold one settled position into the user's totals.
///
/// Callers must guarantee this runs once per (round, user). A push counts as
/// a push regardless of `won`; any other non-winning position is a loss,
/// including a one-sided round that only returned the stake.
pub fn record_settlement(stats: &mut UserStats, result: Outcome, position: &UserRound) {
    stats.rounds_played += 1;

    if result.is_push() {
        stats.pushes += 1;
    } else if position.won {
        stats.wins += 1;
        stats.total_gross_rewards += position.gross_reward;
    } else {
        stats.losses += 1;
    }
    stats.total_net_pnl += position.net_pnl;

    stats.recompute_win_rate();
}

impl EventProcessor {
    /// Write user stats and overwrite the mirrored leaderboard row
    pub(crate) async fn save_user_stats(&self, stats: &UserStats) -> Result<()> {
        self.store.upsert_user_stats(stats).await?;
        self.store
            .upsert_leaderboard_row(&LeaderboardRow::from(stats))
            .await
    }
}
