//! Payout arithmetic for a finished round.
//!
//! Mirrors the contract's claim math: winners split the winning pool plus the
//! losing pool net of the protocol fee, pro rata to their stake. All integer,
//! all truncating.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::domain::Outcome;

/// Fixed-point scale for a user's share of the winning pool
pub const PRECISION: u64 = 100_000_000;

/// Protocol fee taken from the losing pool (2%)
pub const PROTOCOL_FEE_BPS: u32 = 200;

pub const PROTOCOL_FEE_PRECISION: u32 = 10_000;

/// Protocol fee parameters, recorded on each round at first sight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub bps: u32,
    pub precision: u32,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            bps: PROTOCOL_FEE_BPS,
            precision: PROTOCOL_FEE_PRECISION,
        }
    }
}

impl FeeSchedule {
    /// Fee skimmed from a losing pool
    pub fn fee_on(&self, total_losing: U256) -> U256 {
        total_losing * U256::from(self.bps) / U256::from(self.precision.max(1))
    }

    /// Gross payout for one position. Zero on a push or when the user holds
    /// nothing on the winning side.
    pub fn gross_reward(
        &self,
        winning_side: Outcome,
        user_up: U256,
        user_down: U256,
        total_up: U256,
        total_down: U256,
    ) -> U256 {
        let (user_winning, total_winning, total_losing) = match winning_side {
            Outcome::Up if !user_up.is_zero() => (user_up, total_up, total_down),
            Outcome::Down if !user_down.is_zero() => (user_down, total_down, total_up),
            _ => return U256::ZERO,
        };

        let precision = U256::from(PRECISION);
        let user_share = user_winning * precision / total_winning.max(U256::from(1u64));

        // An empty winning pool forfeits the whole losing side
        let fee = if total_winning.is_zero() {
            total_losing
        } else {
            self.fee_on(total_losing)
        };

        let reward_pool = total_losing.saturating_sub(fee);
        let total_payout = total_winning + reward_pool;

        user_share * total_payout / precision
    }
}

/// Gross payout under the default 2% fee schedule
pub fn compute_gross_reward(
    winning_side: Outcome,
    user_up: U256,
    user_down: U256,
    total_up: U256,
    total_down: U256,
) -> U256 {
    FeeSchedule::default().gross_reward(winning_side, user_up, user_down, total_up, total_down)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::amount::eth;

    fn wei(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn test_push_pays_nothing() {
        let reward = compute_gross_reward(Outcome::None, eth(1), eth(1), eth(2), eth(2));
        assert_eq!(reward, U256::ZERO);
    }

    #[test]
    fn test_no_stake_on_winning_side_pays_nothing() {
        let reward = compute_gross_reward(Outcome::Up, U256::ZERO, eth(1), eth(3), eth(1));
        assert_eq!(reward, U256::ZERO);

        let reward = compute_gross_reward(Outcome::Down, eth(2), U256::ZERO, eth(3), eth(1));
        assert_eq!(reward, U256::ZERO);
    }

    #[test]
    fn test_sole_winner_takes_pool_minus_fee() {
        // 3 ETH up, 1 ETH down, Up wins: fee = 0.02 ETH, payout 3.98 ETH
        let reward = compute_gross_reward(Outcome::Up, eth(3), U256::ZERO, eth(3), eth(1));
        assert_eq!(reward, wei(3_980_000_000_000_000_000));
    }

    #[test]
    fn test_even_two_sided_round() {
        let winner = compute_gross_reward(Outcome::Up, eth(1), U256::ZERO, eth(1), eth(1));
        let loser = compute_gross_reward(Outcome::Up, U256::ZERO, eth(1), eth(1), eth(1));

        assert_eq!(winner, wei(1_980_000_000_000_000_000));
        assert_eq!(loser, U256::ZERO);
    }

    #[test]
    fn test_one_sided_round_returns_stake() {
        let reward = compute_gross_reward(Outcome::Up, eth(1), U256::ZERO, eth(1), U256::ZERO);
        assert_eq!(reward, eth(1));
    }

    #[test]
    fn test_down_side_wins_with_hedged_position() {
        // User holds 1 up and 1 down; pools 2 up / 2 down; Down wins
        let reward = compute_gross_reward(Outcome::Down, eth(1), eth(1), eth(2), eth(2));
        // share = 0.5, payout = 2 + (2 - 0.04) = 3.96
        assert_eq!(reward, wei(1_980_000_000_000_000_000));
    }

    #[test]
    fn test_share_truncates() {
        // 1 of 3 wei on the winning side: share = 33_333_333 / 1e8
        let reward = compute_gross_reward(Outcome::Up, wei(1), U256::ZERO, wei(3), wei(300));
        // fee = 300 * 200 / 10000 = 6; payout = 3 + 294 = 297
        assert_eq!(reward, wei(33_333_333 * 297 / 100_000_000));
        assert_eq!(reward, wei(98));
    }

    #[test]
    fn test_winner_payouts_never_exceed_payout_pool() {
        let total_up = wei(7_000_000_000_000_000_001);
        let total_down = wei(5_000_000_000_000_000_003);
        let a = wei(4_000_000_000_000_000_000);
        let b = total_up - a;

        let paid = compute_gross_reward(Outcome::Up, a, U256::ZERO, total_up, total_down)
            + compute_gross_reward(Outcome::Up, b, U256::ZERO, total_up, total_down);
        let fee = FeeSchedule::default().fee_on(total_down);
        let pool = total_up + total_down - fee;

        assert!(paid <= pool);
        // Truncation loses at most a couple of share units worth of wei
        assert!(pool - paid < wei(1_000_000_000_000));
    }

    #[test]
    fn test_custom_fee_schedule() {
        let fees = FeeSchedule {
            bps: 500,
            precision: 10_000,
        };
        let reward = fees.gross_reward(Outcome::Up, eth(1), U256::ZERO, eth(1), eth(1));
        assert_eq!(reward, wei(1_950_000_000_000_000_000));
    }
}
