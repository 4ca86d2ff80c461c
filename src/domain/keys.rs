//! Composite identifiers for stored entities.
//!
//! Every key is chain-scoped and user addresses are lowercased, so two
//! checksum spellings of the same address land on the same row.

/// Lowercase a user address for keys and participant lists
pub fn normalize_user(user: &str) -> String {
    user.trim().to_lowercase()
}

/// `{chainId}_{roundId}`
pub fn round_key(chain_id: u64, round_id: u64) -> String {
    format!("{}_{}", chain_id, round_id)
}

/// `{chainId}_{roundId}_{user}`
pub fn user_round_key(chain_id: u64, round_id: u64, user: &str) -> String {
    format!("{}_{}_{}", chain_id, round_id, normalize_user(user))
}

/// Participant fences share the position's key
pub fn participant_key(chain_id: u64, round_id: u64, user: &str) -> String {
    user_round_key(chain_id, round_id, user)
}

/// `{chainId}_{user}`; used by both UserStats and LeaderboardRow
pub fn user_key(chain_id: u64, user: &str) -> String {
    format!("{}_{}", chain_id, normalize_user(user))
}

/// `{chainId}`
pub fn ai_key(chain_id: u64) -> String {
    chain_id.to_string()
}
