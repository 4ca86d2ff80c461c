//! In-process entity store.
//!
//! Entities are kept as JSON documents, the same shape the Postgres store
//! writes, so serialization is exercised on both paths.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::store::{rank_leaderboard, EntityStore};
use crate::domain::{
    keys, AiStats, Entity, IndexerCursor, LeaderboardRow, Round, RoundParticipant, UserRound,
    UserStats,
};
use crate::error::Result;

#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<(&'static str, String), serde_json::Value>>,
    cursors: RwLock<HashMap<u64, IndexerCursor>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn load<T: Entity>(&self, id: &str) -> Result<Option<T>> {
        let documents = self.documents.read().await;
        match documents.get(&(T::KIND, id.to_string())) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    async fn save<T: Entity>(&self, entity: &T) -> Result<()> {
        let value = serde_json::to_value(entity)?;
        self.documents
            .write()
            .await
            .insert((T::KIND, entity.id().to_string()), value);
        Ok(())
    }

    /// All entities of one kind on one chain, in no particular order
    pub async fn list<T: Entity>(&self, chain_id: u64) -> Result<Vec<T>> {
        let documents = self.documents.read().await;
        let mut out = Vec::new();
        for ((kind, _), value) in documents.iter() {
            if *kind != T::KIND {
                continue;
            }
            let entity: T = serde_json::from_value(value.clone())?;
            if entity.chain_id() == chain_id {
                out.push(entity);
            }
        }
        Ok(out)
    }

    /// Number of stored entities of one kind across chains
    pub async fn count(&self, kind: &str) -> usize {
        self.documents
            .read()
            .await
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get_round(&self, id: &str) -> Result<Option<Round>> {
        self.load(id).await
    }

    async fn upsert_round(&self, round: &Round) -> Result<()> {
        self.save(round).await
    }

    async fn get_user_round(&self, id: &str) -> Result<Option<UserRound>> {
        self.load(id).await
    }

    async fn upsert_user_round(&self, position: &UserRound) -> Result<()> {
        self.save(position).await
    }

    async fn get_round_participant(&self, id: &str) -> Result<Option<RoundParticipant>> {
        self.load(id).await
    }

    async fn upsert_round_participant(&self, participant: &RoundParticipant) -> Result<()> {
        self.save(participant).await
    }

    async fn get_user_stats(&self, id: &str) -> Result<Option<UserStats>> {
        self.load(id).await
    }

    async fn upsert_user_stats(&self, stats: &UserStats) -> Result<()> {
        self.save(stats).await
    }

    async fn get_leaderboard_row(&self, id: &str) -> Result<Option<LeaderboardRow>> {
        self.load(id).await
    }

    async fn upsert_leaderboard_row(&self, row: &LeaderboardRow) -> Result<()> {
        self.save(row).await
    }

    async fn get_ai_stats(&self, id: &str) -> Result<Option<AiStats>> {
        self.load(id).await
    }

    async fn upsert_ai_stats(&self, stats: &AiStats) -> Result<()> {
        self.save(stats).await
    }

    async fn leaderboard(&self, chain_id: u64, limit: usize) -> Result<Vec<LeaderboardRow>> {
        let mut rows: Vec<LeaderboardRow> = self.list(chain_id).await?;
        rank_leaderboard(&mut rows);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn user_rounds(&self, chain_id: u64, user: &str, limit: usize) -> Result<Vec<UserRound>> {
        let user = keys::normalize_user(user);
        let mut positions: Vec<UserRound> = self
            .list::<UserRound>(chain_id)
            .await?
            .into_iter()
            .filter(|p| p.user == user)
            .collect();
        positions.sort_by(|a, b| b.round_id.cmp(&a.round_id));
        positions.truncate(limit);
        Ok(positions)
    }

    async fn latest_rounds(&self, chain_id: u64, limit: usize) -> Result<Vec<Round>> {
        let mut rounds: Vec<Round> = self.list(chain_id).await?;
        rounds.sort_by(|a, b| b.round_id.cmp(&a.round_id));
        rounds.truncate(limit);
        Ok(rounds)
    }

    async fn get_cursor(&self, chain_id: u64) -> Result<Option<IndexerCursor>> {
        Ok(self.cursors.read().await.get(&chain_id).copied())
    }

    async fn save_cursor(&self, cursor: &IndexerCursor) -> Result<()> {
        self.cursors.write().await.insert(cursor.chain_id, *cursor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::amount::eth;
    use crate::engine::FeeSchedule;
    use alloy::primitives::I256;

    #[tokio::test]
    async fn test_round_roundtrip_through_documents() {
        let store = MemoryStore::new();
        let mut round = Round::new(1, 2, &FeeSchedule::default());
        round.total_up = eth(3);
        round.start_price = Some(I256::from_dec_str("-250000000000").unwrap());
        round.add_participant("0xAAA");

        store.upsert_round(&round).await.unwrap();
        let loaded = store.get_round("1_2").await.unwrap().unwrap();

        assert_eq!(loaded, round);
        assert!(store.get_round("1_3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_same_id_different_kinds_do_not_collide() {
        let store = MemoryStore::new();
        let stats = UserStats::new(1, "0xabc");
        store.upsert_user_stats(&stats).await.unwrap();

        assert!(store.get_user_stats("1_0xabc").await.unwrap().is_some());
        assert!(store.get_leaderboard_row("1_0xabc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_leaderboard_is_chain_scoped_and_ranked() {
        let store = MemoryStore::new();
        for (chain, user, pnl) in [(1, "0xa", "5"), (1, "0xb", "-3"), (1, "0xc", "9"), (2, "0xd", "100")] {
            let mut stats = UserStats::new(chain, user);
            stats.total_net_pnl = I256::from_dec_str(pnl).unwrap();
            store
                .upsert_leaderboard_row(&LeaderboardRow::from(&stats))
                .await
                .unwrap();
        }

        let rows = store.leaderboard(1, 2).await.unwrap();
        let users: Vec<&str> = rows.iter().map(|r| r.user.as_str()).collect();
        assert_eq!(users, vec!["0xc", "0xa"]);
        assert_eq!(store.count(LeaderboardRow::KIND).await, 4);
    }

    #[tokio::test]
    async fn test_cursor_per_chain() {
        let store = MemoryStore::new();
        assert!(store.get_cursor(1).await.unwrap().is_none());

        store
            .save_cursor(&IndexerCursor::block_done(1, 500))
            .await
            .unwrap();
        assert_eq!(
            store.get_cursor(1).await.unwrap(),
            Some(IndexerCursor::block_done(1, 500))
        );
        assert!(store.get_cursor(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_rounds_newest_first_for_one_user() {
        let store = MemoryStore::new();
        for (chain, round_id, user) in [
            (1, 3, "0xAbc"),
            (1, 7, "0xabc"),
            (1, 5, "0xabc"),
            (1, 6, "0xdef"),
            (2, 9, "0xabc"),
        ] {
            store
                .upsert_user_round(&UserRound::new(chain, round_id, user))
                .await
                .unwrap();
        }

        let positions = store.user_rounds(1, "0xABC", 2).await.unwrap();
        let rounds: Vec<u64> = positions.iter().map(|p| p.round_id).collect();
        assert_eq!(rounds, vec![7, 5]);

        let all = store.user_rounds(1, "0xabc", 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(store.user_rounds(1, "0x999", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_latest_rounds_newest_first_per_chain() {
        let store = MemoryStore::new();
        for (chain, round_id) in [(1, 2), (1, 10), (1, 4), (2, 50)] {
            store
                .upsert_round(&Round::new(chain, round_id, &FeeSchedule::default()))
                .await
                .unwrap();
        }

        let rounds = store.latest_rounds(1, 2).await.unwrap();
        let ids: Vec<u64> = rounds.iter().map(|r| r.round_id).collect();
        assert_eq!(ids, vec![10, 4]);
        assert_eq!(store.latest_rounds(2, 10).await.unwrap().len(), 1);
    }
}
