use tracing::{debug, info, warn};

use super::EventProcessor;
use crate::domain::{
    keys, AiStats, ExternalPredictionAdded, Outcome, Round, RoundEnded, RoundStarted,
};
use crate::error::Result;

impl EventProcessor {
    async fn load_round(&self, chain_id: u64, round_id: u64) -> Result<Round> {
        let key = keys::round_key(chain_id, round_id);
        Ok(self
            .store
            .get_round(&key)
            .await?
            .unwrap_or_else(|| Round::new(chain_id, round_id, &self.fees)))
    }

    async fn ensure_ai_stats(&self, chain_id: u64) -> Result<()> {
        let key = keys::ai_key(chain_id);
        if self.store.get_ai_stats(&key).await?.is_none() {
            self.store.upsert_ai_stats(&AiStats::new(chain_id)).await?;
        }
        Ok(())
    }

    pub(crate) async fn on_round_started(
        &self,
        chain_id: u64,
        started: &RoundStarted,
    ) -> Result<()> {
        let mut round = self.load_round(chain_id, started.round_id).await?;

        if round.start_ts.is_some() {
            warn!(
                "RoundStarted: round {} already started at {:?}, keeping first start",
                started.round_id, round.start_ts
            );
        } else {
            round.start_ts = Some(started.start_ts);
            round.start_price = Some(started.start_price);
            self.store.upsert_round(&round).await?;
            debug!(
                "RoundStarted: round {} at {} price {}",
                started.round_id, started.start_ts, started.start_price
            );
        }

        self.ensure_ai_stats(chain_id).await
    }

    pub(crate) async fn on_prediction_added(
        &self,
        chain_id: u64,
        prediction: &ExternalPredictionAdded,
    ) -> Result<()> {
        let mut round = self.load_round(chain_id, prediction.round_id).await?;

        if round.result.is_some() {
            warn!(
                "ExternalPredictionAdded: round {} already resolved, ignoring late prediction {}",
                prediction.round_id, prediction.ai_prediction
            );
        } else {
            round.ai_prediction = Some(prediction.ai_prediction);
            self.store.upsert_round(&round).await?;
            debug!(
                "ExternalPredictionAdded: round {} predicted {}",
                prediction.round_id, prediction.ai_prediction
            );
        }

        self.ensure_ai_stats(chain_id).await
    }

    /// RoundEnded: record the outcome, settle every participant, then score
    /// the AI prediction if there was one.
    pub(crate) async fn on_round_ended(&self, chain_id: u64, ended: &RoundEnded) -> Result<()> {
        let mut round = self.load_round(chain_id, ended.round_id).await?;

        let first_end = round.result.is_none();
        if first_end {
            round.end_ts = Some(ended.end_ts);
            round.end_price = Some(ended.end_price);
            round.result = Some(ended.result);
            self.store.upsert_round(&round).await?;
            info!(
                "Round {} ended with result {} ({} participants)",
                ended.round_id,
                ended.result,
                round.participants.len()
            );
        } else {
            warn!(
                "RoundEnded: round {} already resolved as {:?}, keeping first result",
                ended.round_id, round.result
            );
        }

        let mut finalized = 0;
        for participant in &round.participants {
            let state = self
                .finalize_user_round(chain_id, ended.round_id, participant)
                .await?;
            if state.ran_statistics() {
                finalized += 1;
            }
        }
        info!(
            "Completed settlement sweep for round {}: {} of {} participants finalized",
            ended.round_id,
            finalized,
            round.participants.len()
        );

        if first_end {
            if let Some(prediction) = round.ai_prediction {
                self.record_ai_result(chain_id, prediction, ended.result)
                    .await?;
            }
        }
        Ok(())
    }

    async fn record_ai_result(
        &self,
        chain_id: u64,
        prediction: Outcome,
        result: Outcome,
    ) -> Result<()> {
        let key = keys::ai_key(chain_id);
        let mut ai = self
            .store
            .get_ai_stats(&key)
            .await?
            .unwrap_or_else(|| AiStats::new(chain_id));
        ai.record(prediction, result);
        self.store.upsert_ai_stats(&ai).await?;

        debug!(
            "AI stats: {} correct / {} predicted (accuracy {:.4})",
            ai.correct, ai.rounds_with_prediction, ai.accuracy
        );
        Ok(())
    }
}
