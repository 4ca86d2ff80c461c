use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info, instrument};

use crate::domain::{
    keys, AiStats, Entity, IndexerCursor, LeaderboardRow, Round, RoundParticipant, UserRound,
    UserStats,
};
use crate::error::Result;
use crate::persistence::EntityStore;

/// PostgreSQL storage adapter.
///
/// Entities live as JSONB documents in `arena_entities`, keyed by
/// (kind, id) with the chain id broken out for scans.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a PostgreSQL store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load<T: Entity>(&self, id: &str) -> Result<Option<T>> {
        let row = sqlx::query(
            r#"
            SELECT data FROM arena_entities
            WHERE kind = $1 AND id = $2
            "#,
        )
        .bind(T::KIND)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let data: serde_json::Value = row.get("data");
                Ok(Some(serde_json::from_value(data)?))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, entity), fields(kind = T::KIND, id = entity.id()))]
    async fn save<T: Entity>(&self, entity: &T) -> Result<()> {
        let data = serde_json::to_value(entity)?;

        sqlx::query(
            r#"
            INSERT INTO arena_entities (kind, id, chain_id, data, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (kind, id) DO UPDATE SET
                data = EXCLUDED.data,
                updated_at = NOW()
            "#,
        )
        .bind(T::KIND)
        .bind(entity.id())
        .bind(entity.chain_id() as i64)
        .bind(&data)
        .execute(&self.pool)
        .await?;

        debug!("Upserted {} {}", T::KIND, entity.id());
        Ok(())
    }
}

fn decode_rows<T: Entity>(rows: Vec<PgRow>) -> Result<Vec<T>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let data: serde_json::Value = row.get("data");
        out.push(serde_json::from_value(data)?);
    }
    Ok(out)
}

#[async_trait]
impl EntityStore for PostgresStore {
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
        let rows = sqlx::query(
            r#"
            SELECT data FROM arena_entities
            WHERE kind = $1 AND chain_id = $2
            ORDER BY (data->>'totalNetPnl')::numeric DESC,
                     (data->>'winRate')::float8 DESC,
                     data->>'user' ASC
            LIMIT $3
            "#,
        )
        .bind(LeaderboardRow::KIND)
        .bind(chain_id as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        decode_rows(rows)
    }

    async fn user_rounds(&self, chain_id: u64, user: &str, limit: usize) -> Result<Vec<UserRound>> {
        let rows = sqlx::query(
            r#"
            SELECT data FROM arena_entities
            WHERE kind = $1 AND chain_id = $2 AND data->>'user' = $3
            ORDER BY (data->>'roundId')::bigint DESC
            LIMIT $4
            "#,
        )
        .bind(UserRound::KIND)
        .bind(chain_id as i64)
        .bind(keys::normalize_user(user))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        decode_rows(rows)
    }

    async fn latest_rounds(&self, chain_id: u64, limit: usize) -> Result<Vec<Round>> {
        let rows = sqlx::query(
            r#"
            SELECT data FROM arena_entities
            WHERE kind = $1 AND chain_id = $2
            ORDER BY (data->>'roundId')::bigint DESC
            LIMIT $3
            "#,
        )
        .bind(Round::KIND)
        .bind(chain_id as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        decode_rows(rows)
    }

    async fn get_cursor(&self, chain_id: u64) -> Result<Option<IndexerCursor>> {
        let row = sqlx::query(
            r#"
            SELECT block_number, log_index FROM indexer_cursors
            WHERE chain_id = $1
            "#,
        )
        .bind(chain_id as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| IndexerCursor {
            chain_id,
            block_number: r.get::<i64, _>("block_number") as u64,
            log_index: r.get::<Option<i64>, _>("log_index").map(|i| i as u64),
        }))
    }

    async fn save_cursor(&self, cursor: &IndexerCursor) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO indexer_cursors (chain_id, block_number, log_index, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (chain_id) DO UPDATE SET
                block_number = EXCLUDED.block_number,
                log_index = EXCLUDED.log_index,
                updated_at = NOW()
            "#,
        )
        .bind(cursor.chain_id as i64)
        .bind(cursor.block_number as i64)
        .bind(cursor.log_index.map(|i| i as i64))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
