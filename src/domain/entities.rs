//! Derived entities maintained by the event processor.
//!
//! Field names serialize in camelCase so stored documents match what the
//! query layer exposes to the dashboard.

use alloy::primitives::{I256, U256};
use serde::{Deserialize, Serialize};

use super::amount::{i256_dec, opt_i256_dec, to_signed, u256_dec};
use super::keys;
use super::outcome::{Outcome, Side};
use crate::engine::FeeSchedule;

/// Anything the store can persist as a keyed document
pub trait Entity: Serialize + serde::de::DeserializeOwned + Send + Sync {
    /// Collection name
    const KIND: &'static str;

    fn id(&self) -> &str;

    fn chain_id(&self) -> u64;
}

/// One betting epoch on one chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub id: String,
    pub chain_id: u64,
    pub round_id: u64,
    #[serde(default)]
    pub start_ts: Option<u64>,
    #[serde(default)]
    pub end_ts: Option<u64>,
    #[serde(default, with = "opt_i256_dec")]
    pub start_price: Option<I256>,
    #[serde(default, with = "opt_i256_dec")]
    pub end_price: Option<I256>,
    #[serde(default)]
    pub ai_prediction: Option<Outcome>,
    #[serde(default)]
    pub result: Option<Outcome>,
    #[serde(with = "u256_dec")]
    pub total_up: U256,
    #[serde(with = "u256_dec")]
    pub total_down: U256,
    pub protocol_fee_bps: u32,
    pub protocol_fee_precision: u32,
    /// Lowercased addresses in first-bet order
    #[serde(default)]
    pub participants: Vec<String>,
}

impl Round {
    /// A round seen for the first time; fee parameters are fixed here
    pub fn new(chain_id: u64, round_id: u64, fees: &FeeSchedule) -> Self {
        Self {
            id: keys::round_key(chain_id, round_id),
            chain_id,
            round_id,
            start_ts: None,
            end_ts: None,
            start_price: None,
            end_price: None,
            ai_prediction: None,
            result: None,
            total_up: U256::ZERO,
            total_down: U256::ZERO,
            protocol_fee_bps: fees.bps,
            protocol_fee_precision: fees.precision,
            participants: Vec::new(),
        }
    }

    /// A reward can only be computed once both the result and end time are known
    pub fn is_resolved(&self) -> bool {
        self.result.is_some() && self.end_ts.is_some()
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            bps: self.protocol_fee_bps,
            precision: self.protocol_fee_precision,
        }
    }

    pub fn total_pool(&self) -> U256 {
        self.total_up + self.total_down
    }

    pub fn pool(&self, side: Side) -> U256 {
        match side {
            Side::Up => self.total_up,
            Side::Down => self.total_down,
        }
    }

    /// Add stake to one side's pool
    pub fn add_stake(&mut self, side: Side, amount: U256) {
        match side {
            Side::Up => self.total_up += amount,
            Side::Down => self.total_down += amount,
        }
    }

    /// Record a participant; returns false if already present
    pub fn add_participant(&mut self, user: &str) -> bool {
        let user = keys::normalize_user(user);
        if self.participants.iter().any(|p| *p == user) {
            return false;
        }
        self.participants.push(user);
        true
    }
}

impl Entity for Round {
    const KIND: &'static str = "round";

    fn id(&self) -> &str {
        &self.id
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

/// A user's position in one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRound {
    pub id: String,
    pub chain_id: u64,
    pub round_id: u64,
    pub user: String,
    #[serde(with = "u256_dec")]
    pub up_amount: U256,
    #[serde(with = "u256_dec")]
    pub down_amount: U256,
    #[serde(with = "u256_dec")]
    pub total_bet: U256,
    /// Side of the most recent bet
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(with = "u256_dec")]
    pub gross_reward: U256,
    #[serde(with = "i256_dec")]
    pub net_pnl: I256,
    pub won: bool,
    pub claimed: bool,
}

impl UserRound {
    pub fn new(chain_id: u64, round_id: u64, user: &str) -> Self {
        Self {
            id: keys::user_round_key(chain_id, round_id, user),
            chain_id,
            round_id,
            user: keys::normalize_user(user),
            up_amount: U256::ZERO,
            down_amount: U256::ZERO,
            total_bet: U256::ZERO,
            side: None,
            gross_reward: U256::ZERO,
            net_pnl: I256::ZERO,
            won: false,
            claimed: false,
        }
    }

    /// Add a stake; `side` always follows the latest bet
    pub fn add_stake(&mut self, side: Side, amount: U256) {
        match side {
            Side::Up => self.up_amount += amount,
            Side::Down => self.down_amount += amount,
        }
        self.total_bet = self.up_amount + self.down_amount;
        self.side = Some(side);
    }

    /// Side holding the larger stake; ties fall back to the latest bet's side
    pub fn dominant_side(&self) -> Option<Side> {
        if self.up_amount > self.down_amount {
            Some(Side::Up)
        } else if self.down_amount > self.up_amount {
            Some(Side::Down)
        } else {
            self.side
        }
    }

    /// Overwrite the derived settlement fields from a freshly computed reward
    pub fn apply_reward(&mut self, gross_reward: U256) {
        self.total_bet = self.up_amount + self.down_amount;
        self.gross_reward = gross_reward;
        self.net_pnl = to_signed(gross_reward) - to_signed(self.total_bet);
        self.won = self.net_pnl.is_positive();
    }
}

impl Entity for UserRound {
    const KIND: &'static str = "user_round";

    fn id(&self) -> &str {
        &self.id
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

/// At-most-once fence for the statistics of one (round, user)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundParticipant {
    pub id: String,
    pub chain_id: u64,
    pub round_id: u64,
    pub user: String,
    pub processed_results: bool,
}

impl RoundParticipant {
    pub fn new(chain_id: u64, round_id: u64, user: &str) -> Self {
        Self {
            id: keys::participant_key(chain_id, round_id, user),
            chain_id,
            round_id,
            user: keys::normalize_user(user),
            processed_results: false,
        }
    }
}

impl Entity for RoundParticipant {
    const KIND: &'static str = "round_participant";

    fn id(&self) -> &str {
        &self.id
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

/// Lifetime totals for one user on one chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub id: String,
    pub chain_id: u64,
    pub user: String,
    pub rounds_played: u64,
    pub wins: u64,
    pub losses: u64,
    pub pushes: u64,
    #[serde(with = "u256_dec")]
    pub total_bet: U256,
    #[serde(with = "u256_dec")]
    pub total_gross_rewards: U256,
    #[serde(with = "i256_dec")]
    pub total_net_pnl: I256,
    pub win_rate: f64,
}

impl UserStats {
    pub fn new(chain_id: u64, user: &str) -> Self {
        Self {
            id: keys::user_key(chain_id, user),
            chain_id,
            user: keys::normalize_user(user),
            rounds_played: 0,
            wins: 0,
            losses: 0,
            pushes: 0,
            total_bet: U256::ZERO,
            total_gross_rewards: U256::ZERO,
            total_net_pnl: I256::ZERO,
            win_rate: 0.0,
        }
    }

    pub fn completed_rounds(&self) -> u64 {
        self.wins + self.losses + self.pushes
    }

    pub fn recompute_win_rate(&mut self) {
        let completed = self.completed_rounds();
        self.win_rate = if completed > 0 {
            self.wins as f64 / completed as f64
        } else {
            0.0
        };
    }
}

impl Entity for UserStats {
    const KIND: &'static str = "user_stats";

    fn id(&self) -> &str {
        &self.id
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

/// Sort-friendly projection of `UserStats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub id: String,
    pub chain_id: u64,
    pub user: String,
    #[serde(with = "i256_dec")]
    pub total_net_pnl: I256,
    pub win_rate: f64,
    pub rounds_played: u64,
}

impl From<&UserStats> for LeaderboardRow {
    fn from(stats: &UserStats) -> Self {
        Self {
            id: stats.id.clone(),
            chain_id: stats.chain_id,
            user: stats.user.clone(),
            total_net_pnl: stats.total_net_pnl,
            win_rate: stats.win_rate,
            rounds_played: stats.rounds_played,
        }
    }
}

impl Entity for LeaderboardRow {
    const KIND: &'static str = "leaderboard_row";

    fn id(&self) -> &str {
        &self.id
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

/// Running accuracy of the AI predictions on one chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiStats {
    pub id: String,
    pub chain_id: u64,
    pub rounds_with_prediction: u64,
    pub correct: u64,
    pub incorrect: u64,
    pub pushes: u64,
    pub accuracy: f64,
}

impl AiStats {
    pub fn new(chain_id: u64) -> Self {
        Self {
            id: keys::ai_key(chain_id),
            chain_id,
            rounds_with_prediction: 0,
            correct: 0,
            incorrect: 0,
            pushes: 0,
            accuracy: 0.0,
        }
    }

    /// Score one resolved round against the prediction made for it
    pub fn record(&mut self, prediction: Outcome, result: Outcome) {
        self.rounds_with_prediction += 1;
        if result.is_push() {
            self.pushes += 1;
        } else if result == prediction {
            self.correct += 1;
        } else {
            self.incorrect += 1;
        }
        self.accuracy = if self.rounds_with_prediction > 0 {
            self.correct as f64 / self.rounds_with_prediction as f64
        } else {
            0.0
        };
    }
}

impl Entity for AiStats {
    const KIND: &'static str = "ai_stats";

    fn id(&self) -> &str {
        &self.id
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

/// Dispatch progress for one chain.
///
/// Everything up to and including (`block_number`, `log_index`) has been
/// applied. `log_index == None` means the whole block is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerCursor {
    pub chain_id: u64,
    pub block_number: u64,
    pub log_index: Option<u64>,
}

impl IndexerCursor {
    pub fn block_done(chain_id: u64, block_number: u64) -> Self {
        Self {
            chain_id,
            block_number,
            log_index: None,
        }
    }

    /// True if the log at (block, index) was already applied
    pub fn covers(&self, block_number: u64, log_index: u64) -> bool {
        if block_number != self.block_number {
            return block_number < self.block_number;
        }
        match self.log_index {
            None => true,
            Some(last) => log_index <= last,
        }
    }

    /// First block that may still hold unapplied logs
    pub fn resume_block(&self) -> u64 {
        match self.log_index {
            None => self.block_number + 1,
            Some(_) => self.block_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::amount::eth;

    #[test]
    fn test_round_participants_are_deduplicated_in_order() {
        let mut round = Round::new(1, 3, &FeeSchedule::default());
        assert!(round.add_participant("0xBBB"));
        assert!(round.add_participant("0xaaa"));
        assert!(!round.add_participant("0xbbb"));
        assert_eq!(round.participants, vec!["0xbbb", "0xaaa"]);
    }

    #[test]
    fn test_round_is_resolved_needs_result_and_end() {
        let mut round = Round::new(1, 1, &FeeSchedule::default());
        round.result = Some(Outcome::Up);
        assert!(!round.is_resolved());
        round.end_ts = Some(1_700_000_000);
        assert!(round.is_resolved());
    }

    #[test]
    fn test_user_round_side_is_last_write_but_dominant_follows_stake() {
        let mut position = UserRound::new(1, 1, "0xabc");
        position.add_stake(Side::Up, eth(3));
        position.add_stake(Side::Down, eth(1));

        assert_eq!(position.side, Some(Side::Down));
        assert_eq!(position.dominant_side(), Some(Side::Up));
        assert_eq!(position.total_bet, eth(4));
    }

    #[test]
    fn test_apply_reward_marks_loss_when_net_is_zero() {
        let mut position = UserRound::new(1, 1, "0xabc");
        position.add_stake(Side::Up, eth(1));
        position.apply_reward(eth(1));

        assert_eq!(position.net_pnl, I256::ZERO);
        assert!(!position.won);
    }

    #[test]
    fn test_ai_stats_record() {
        let mut ai = AiStats::new(1);
        ai.record(Outcome::Up, Outcome::Up);
        ai.record(Outcome::Up, Outcome::Down);
        ai.record(Outcome::Down, Outcome::None);
        ai.record(Outcome::Down, Outcome::Down);

        assert_eq!(ai.rounds_with_prediction, 4);
        assert_eq!(ai.correct, 2);
        assert_eq!(ai.incorrect, 1);
        assert_eq!(ai.pushes, 1);
        assert!((ai.accuracy - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cursor_covers() {
        let partial = IndexerCursor {
            chain_id: 1,
            block_number: 10,
            log_index: Some(3),
        };
        assert!(partial.covers(9, 50));
        assert!(partial.covers(10, 3));
        assert!(!partial.covers(10, 4));
        assert!(!partial.covers(11, 0));
        assert_eq!(partial.resume_block(), 10);

        let full = IndexerCursor::block_done(1, 10);
        assert!(full.covers(10, 99));
        assert_eq!(full.resume_block(), 11);
    }
}
