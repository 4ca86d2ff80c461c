use async_trait::async_trait;
use std::cmp::Ordering;

use crate::domain::{
    AiStats, IndexerCursor, LeaderboardRow, Round, RoundParticipant, UserRound, UserStats,
};
use crate::error::Result;

/// Keyed get/upsert access to every derived entity.
///
/// Reads must observe all writes made by earlier events on the same chain.
/// Nothing here is transactional: the processor relies on handling one event
/// at a time per chain.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_round(&self, id: &str) -> Result<Option<Round>>;

    async fn upsert_round(&self, round: &Round) -> Result<()>;

    async fn get_user_round(&self, id: &str) -> Result<Option<UserRound>>;

    async fn upsert_user_round(&self, position: &UserRound) -> Result<()>;

    async fn get_round_participant(&self, id: &str) -> Result<Option<RoundParticipant>>;

    async fn upsert_round_participant(&self, participant: &RoundParticipant) -> Result<()>;

    async fn get_user_stats(&self, id: &str) -> Result<Option<UserStats>>;

    async fn upsert_user_stats(&self, stats: &UserStats) -> Result<()>;

    async fn get_leaderboard_row(&self, id: &str) -> Result<Option<LeaderboardRow>>;

    async fn upsert_leaderboard_row(&self, row: &LeaderboardRow) -> Result<()>;

    async fn get_ai_stats(&self, id: &str) -> Result<Option<AiStats>>;

    async fn upsert_ai_stats(&self, stats: &AiStats) -> Result<()>;

    /// Top rows for a chain, best net P&L first
    async fn leaderboard(&self, chain_id: u64, limit: usize) -> Result<Vec<LeaderboardRow>>;

    /// A user's positions on a chain, newest round first
    async fn user_rounds(&self, chain_id: u64, user: &str, limit: usize) -> Result<Vec<UserRound>>;

    /// Most recent rounds on a chain, newest first
    async fn latest_rounds(&self, chain_id: u64, limit: usize) -> Result<Vec<Round>>;

    async fn get_cursor(&self, chain_id: u64) -> Result<Option<IndexerCursor>>;

    async fn save_cursor(&self, cursor: &IndexerCursor) -> Result<()>;
}

/// Leaderboard order: net P&L desc, then win rate desc, then address
pub fn rank_leaderboard(rows: &mut [LeaderboardRow]) {
    rows.sort_by(|a, b| {
        b.total_net_pnl
            .cmp(&a.total_net_pnl)
            .then_with(|| {
                b.win_rate
                    .partial_cmp(&a.win_rate)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.user.cmp(&b.user))
    });
}
