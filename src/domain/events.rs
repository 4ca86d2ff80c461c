//! Contract events as seen by the processor.

use alloy::primitives::{I256, U256};
use serde::{Deserialize, Serialize};

use super::amount::{i256_dec, u256_dec};
use super::outcome::{Outcome, Side};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetPlaced {
    pub round_id: u64,
    pub user: String,
    #[serde(with = "u256_dec")]
    pub amount: U256,
    pub side: Side,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStarted {
    pub round_id: u64,
    pub start_ts: u64,
    #[serde(with = "i256_dec")]
    pub start_price: I256,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundEnded {
    pub round_id: u64,
    pub end_ts: u64,
    #[serde(with = "i256_dec")]
    pub end_price: I256,
    pub result: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalPredictionAdded {
    pub round_id: u64,
    pub ai_prediction: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardClaimed {
    pub round_id: u64,
    pub user: String,
    #[serde(with = "u256_dec")]
    pub amount: U256,
}

/// Every event the arena contract emits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "params")]
pub enum ArenaEvent {
    BetPlaced(BetPlaced),
    RoundStarted(RoundStarted),
    RoundEnded(RoundEnded),
    ExternalPredictionAdded(ExternalPredictionAdded),
    RewardClaimed(RewardClaimed),
}

impl ArenaEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ArenaEvent::BetPlaced(_) => "BetPlaced",
            ArenaEvent::RoundStarted(_) => "RoundStarted",
            ArenaEvent::RoundEnded(_) => "RoundEnded",
            ArenaEvent::ExternalPredictionAdded(_) => "ExternalPredictionAdded",
            ArenaEvent::RewardClaimed(_) => "RewardClaimed",
        }
    }

    pub fn round_id(&self) -> u64 {
        match self {
            ArenaEvent::BetPlaced(e) => e.round_id,
            ArenaEvent::RoundStarted(e) => e.round_id,
            ArenaEvent::RoundEnded(e) => e.round_id,
            ArenaEvent::ExternalPredictionAdded(e) => e.round_id,
            ArenaEvent::RewardClaimed(e) => e.round_id,
        }
    }
}

/// An event plus where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainEvent {
    pub chain_id: u64,
    #[serde(default)]
    pub block_number: u64,
    #[serde(default)]
    pub log_index: u64,
    #[serde(flatten)]
    pub event: ArenaEvent,
}

impl ChainEvent {
    pub fn new(chain_id: u64, event: ArenaEvent) -> Self {
        Self {
            chain_id,
            block_number: 0,
            log_index: 0,
            event,
        }
    }

    pub fn at(mut self, block_number: u64, log_index: u64) -> Self {
        self.block_number = block_number;
        self.log_index = log_index;
        self
    }

    /// Ordering key within a chain
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_event_parses_from_json_line() {
        let line = r#"{"chainId":11155111,"blockNumber":42,"logIndex":3,"event":"BetPlaced","params":{"roundId":7,"user":"0xAbC","amount":"1000000000000000000","side":1}}"#;
        let parsed: ChainEvent = serde_json::from_str(line).unwrap();

        assert_eq!(parsed.chain_id, 11155111);
        assert_eq!(parsed.position(), (42, 3));
        match parsed.event {
            ArenaEvent::BetPlaced(bet) => {
                assert_eq!(bet.round_id, 7);
                assert_eq!(bet.side, Side::Up);
                assert_eq!(bet.amount, U256::from(1_000_000_000_000_000_000u64));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_round_ended_push_result() {
        let line = r#"{"chainId":1,"event":"RoundEnded","params":{"roundId":2,"endTs":100,"endPrice":"-5","result":0}}"#;
        let parsed: ChainEvent = serde_json::from_str(line).unwrap();

        assert_eq!(parsed.event.name(), "RoundEnded");
        assert_eq!(parsed.event.round_id(), 2);
        assert_eq!(parsed.position(), (0, 0));
    }
}
