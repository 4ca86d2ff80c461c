//! PredictronArena log decoding
//!
//! Maps raw `eth_getLogs` entries from the arena contract to `ChainEvent`s.
//! Logs with an unknown topic0 are skipped; a known topic that fails to decode
//! is an error.

use alloy::primitives::U256;
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;

use crate::domain::{
    keys, ArenaEvent, BetPlaced as BetPlacedEvent, ChainEvent,
    ExternalPredictionAdded as PredictionEvent, Outcome, RewardClaimed as ClaimEvent,
    RoundEnded as RoundEndedEvent, RoundStarted as RoundStartedEvent, Side,
};
use crate::error::{PredictronError, Result};

// ============================================================================
// Solidity event definitions (alloy sol! macro)
// ============================================================================

sol! {
    #[derive(Debug)]
    event BetPlaced(uint256 indexed roundId, address indexed user, uint256 amount, uint8 side);

    #[derive(Debug)]
    event RoundStarted(uint256 indexed roundId, uint256 startTs, int256 startPrice);

    #[derive(Debug)]
    event RoundEnded(uint256 indexed roundId, uint256 endTs, int256 endPrice, uint8 result);

    #[derive(Debug)]
    event RewardClaimed(uint256 indexed roundId, address indexed user, uint256 amount);

    #[derive(Debug)]
    event ExternalPredictionAdded(uint256 indexed roundId, uint8 aiPrediction);
}

/// topic0 of every event the processor consumes
pub fn event_signatures() -> Vec<alloy::primitives::B256> {
    vec![
        BetPlaced::SIGNATURE_HASH,
        RoundStarted::SIGNATURE_HASH,
        RoundEnded::SIGNATURE_HASH,
        RewardClaimed::SIGNATURE_HASH,
        ExternalPredictionAdded::SIGNATURE_HASH,
    ]
}

/// Round ids and timestamps fit in u64 on any real deployment
fn to_u64(value: U256) -> u64 {
    value.saturating_to::<u64>()
}

fn address_string(address: &alloy::primitives::Address) -> String {
    keys::normalize_user(&address.to_string())
}

/// Decode one log; `Ok(None)` for logs this indexer does not track
pub fn decode_log(chain_id: u64, log: &Log) -> Result<Option<ChainEvent>> {
    let Some(topic0) = log.topic0().copied() else {
        return Ok(None);
    };

    let event = if topic0 == BetPlaced::SIGNATURE_HASH {
        let decoded = log.log_decode::<BetPlaced>()?.inner.data;
        ArenaEvent::BetPlaced(BetPlacedEvent {
            round_id: to_u64(decoded.roundId),
            user: address_string(&decoded.user),
            amount: decoded.amount,
            side: Side::from(decoded.side),
        })
    } else if topic0 == RoundStarted::SIGNATURE_HASH {
        let decoded = log.log_decode::<RoundStarted>()?.inner.data;
        ArenaEvent::RoundStarted(RoundStartedEvent {
            round_id: to_u64(decoded.roundId),
            start_ts: to_u64(decoded.startTs),
            start_price: decoded.startPrice,
        })
    } else if topic0 == RoundEnded::SIGNATURE_HASH {
        let decoded = log.log_decode::<RoundEnded>()?.inner.data;
        ArenaEvent::RoundEnded(RoundEndedEvent {
            round_id: to_u64(decoded.roundId),
            end_ts: to_u64(decoded.endTs),
            end_price: decoded.endPrice,
            result: Outcome::from(decoded.result),
        })
    } else if topic0 == RewardClaimed::SIGNATURE_HASH {
        let decoded = log.log_decode::<RewardClaimed>()?.inner.data;
        ArenaEvent::RewardClaimed(ClaimEvent {
            round_id: to_u64(decoded.roundId),
            user: address_string(&decoded.user),
            amount: decoded.amount,
        })
    } else if topic0 == ExternalPredictionAdded::SIGNATURE_HASH {
        let decoded = log.log_decode::<ExternalPredictionAdded>()?.inner.data;
        ArenaEvent::ExternalPredictionAdded(PredictionEvent {
            round_id: to_u64(decoded.roundId),
            ai_prediction: Outcome::from(decoded.aiPrediction),
        })
    } else {
        return Ok(None);
    };

    let block_number = log
        .block_number
        .ok_or_else(|| PredictronError::Decode(format!("{} log without block number", event.name())))?;
    let log_index = log
        .log_index
        .ok_or_else(|| PredictronError::Decode(format!("{} log without log index", event.name())))?;

    Ok(Some(ChainEvent::new(chain_id, event).at(block_number, log_index)))
}

/// Decode a batch and order it by (block, log index)
pub fn decode_logs(chain_id: u64, logs: &[Log]) -> Result<Vec<ChainEvent>> {
    let mut events = Vec::with_capacity(logs.len());
    for log in logs {
        if let Some(event) = decode_log(chain_id, log)? {
            events.push(event);
        }
    }
    events.sort_by_key(|e| e.position());
    Ok(events)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::amount::eth;
    use alloy::primitives::{address, Address, LogData, B256, I256};

    const CONTRACT: Address = address!("e62Fcb22480950aA6c9f49Dc1057752e1aDd52c2");
    const USER: Address = address!("1234567890123456789012345678901234567890");

    fn rpc_log<E: SolEvent>(event: &E, block: u64, index: u64) -> Log {
        let data: LogData = event.encode_log_data();
        Log {
            inner: alloy::primitives::Log {
                address: CONTRACT,
                data,
            },
            block_number: Some(block),
            log_index: Some(index),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_bet_placed() {
        let raw = BetPlaced {
            roundId: U256::from(3u64),
            user: USER,
            amount: eth(1),
            side: 2,
        };
        let event = decode_log(11155111, &rpc_log(&raw, 100, 4)).unwrap().unwrap();

        assert_eq!(event.chain_id, 11155111);
        assert_eq!(event.position(), (100, 4));
        match event.event {
            ArenaEvent::BetPlaced(bet) => {
                assert_eq!(bet.round_id, 3);
                assert_eq!(bet.user, "0x1234567890123456789012345678901234567890");
                assert_eq!(bet.amount, eth(1));
                assert_eq!(bet.side, Side::Down);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_decode_round_ended_with_negative_price() {
        let raw = RoundEnded {
            roundId: U256::from(9u64),
            endTs: U256::from(1_700_000_000u64),
            endPrice: I256::from_dec_str("-42").unwrap(),
            result: 0,
        };
        let event = decode_log(1, &rpc_log(&raw, 7, 0)).unwrap().unwrap();

        match event.event {
            ArenaEvent::RoundEnded(ended) => {
                assert_eq!(ended.round_id, 9);
                assert_eq!(ended.end_ts, 1_700_000_000);
                assert_eq!(ended.end_price, I256::from_dec_str("-42").unwrap());
                assert_eq!(ended.result, Outcome::None);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_unknown_topic_is_skipped() {
        let log = Log {
            inner: alloy::primitives::Log {
                address: CONTRACT,
                data: LogData::new_unchecked(vec![B256::repeat_byte(0x11)], Default::default()),
            },
            block_number: Some(1),
            log_index: Some(0),
            ..Default::default()
        };
        assert!(decode_log(1, &log).unwrap().is_none());
    }

    #[test]
    fn test_missing_block_number_is_an_error() {
        let raw = ExternalPredictionAdded {
            roundId: U256::from(1u64),
            aiPrediction: 1,
        };
        let mut log = rpc_log(&raw, 1, 0);
        log.block_number = None;

        assert!(matches!(
            decode_log(1, &log),
            Err(PredictronError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_logs_sorts_by_position() {
        let start = RoundStarted {
            roundId: U256::from(2u64),
            startTs: U256::from(10u64),
            startPrice: I256::from_dec_str("250000000000").unwrap(),
        };
        let claim = RewardClaimed {
            roundId: U256::from(1u64),
            user: USER,
            amount: eth(2),
        };
        let logs = vec![rpc_log(&start, 12, 1), rpc_log(&claim, 12, 0), rpc_log(&start, 11, 5)];

        let events = decode_logs(1, &logs).unwrap();
        let positions: Vec<(u64, u64)> = events.iter().map(|e| e.position()).collect();
        assert_eq!(positions, vec![(11, 5), (12, 0), (12, 1)]);
        assert_eq!(event_signatures().len(), 5);
    }
}
