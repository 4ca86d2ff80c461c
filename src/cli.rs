use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tabled::{Table, Tabled};

use crate::domain::{keys, AiStats, Outcome, Round, Side, UserRound, UserStats};
use crate::persistence::EntityStore;
use crate::services::ReplaySummary;

#[derive(Parser)]
#[command(name = "predictron")]
#[command(version = "0.1.0")]
#[command(about = "Event indexer for the PredictronArena prediction market", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory
    #[arg(short, long, default_value = "config")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index every configured chain until interrupted
    Run,
    /// Run database migrations
    Migrate,
    /// Apply a JSON-lines event file to the configured store
    Replay {
        /// Path to the events file
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Show the leaderboard for a chain
    Leaderboard {
        #[arg(long)]
        chain: u64,
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Show a user's statistics
    User {
        #[arg(long)]
        chain: u64,
        /// User address
        address: String,
        #[arg(long)]
        json: bool,
    },
    /// Show a user's positions, newest round first
    History {
        #[arg(long)]
        chain: u64,
        /// User address
        address: String,
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Show the latest rounds on a chain
    Rounds {
        #[arg(long)]
        chain: u64,
        #[arg(long, default_value = "10")]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Show a round record
    Round {
        #[arg(long)]
        chain: u64,
        /// Round id
        round: u64,
        #[arg(long)]
        json: bool,
    },
    /// Show AI prediction accuracy
    Ai {
        #[arg(long)]
        chain: u64,
        #[arg(long)]
        json: bool,
    },
}

/// Output mode for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

/// Print a vec of Tabled + Serialize items in the chosen mode.
pub fn print_items<T: Tabled + Serialize>(items: &[T], mode: OutputMode) -> anyhow::Result<()> {
    match mode {
        OutputMode::Table => {
            if items.is_empty() {
                println!("(no results)");
            } else {
                let table = Table::new(items).to_string();
                println!("{table}");
            }
        }
        OutputMode::Json => {
            let json = serde_json::to_string_pretty(items)?;
            println!("{json}");
        }
    }
    Ok(())
}

/// Print a single Serialize item, or a placeholder when it is missing.
pub fn print_item<T: Serialize>(item: Option<&T>, mode: OutputMode) -> anyhow::Result<()> {
    match (item, mode) {
        (None, OutputMode::Table) => println!("(not found)"),
        (None, OutputMode::Json) => println!("null"),
        (Some(item), _) => println!("{}", serde_json::to_string_pretty(item)?),
    }
    Ok(())
}

fn format_pct(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

#[derive(Debug, Serialize, Tabled)]
pub struct LeaderboardDisplay {
    pub rank: usize,
    pub user: String,
    pub net_pnl_wei: String,
    pub win_rate: String,
    pub rounds: u64,
}

#[derive(Debug, Serialize, Tabled)]
pub struct UserStatsDisplay {
    pub user: String,
    pub rounds: u64,
    pub wins: u64,
    pub losses: u64,
    pub pushes: u64,
    pub total_bet_wei: String,
    pub gross_rewards_wei: String,
    pub net_pnl_wei: String,
    pub win_rate: String,
}

impl From<&UserStats> for UserStatsDisplay {
    fn from(stats: &UserStats) -> Self {
        Self {
            user: stats.user.clone(),
            rounds: stats.rounds_played,
            wins: stats.wins,
            losses: stats.losses,
            pushes: stats.pushes,
            total_bet_wei: stats.total_bet.to_string(),
            gross_rewards_wei: stats.total_gross_rewards.to_string(),
            net_pnl_wei: stats.total_net_pnl.to_string(),
            win_rate: format_pct(stats.win_rate),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct AiStatsDisplay {
    pub chain: u64,
    pub predicted: u64,
    pub correct: u64,
    pub incorrect: u64,
    pub pushes: u64,
    pub accuracy: String,
}

impl From<&AiStats> for AiStatsDisplay {
    fn from(ai: &AiStats) -> Self {
        Self {
            chain: ai.chain_id,
            predicted: ai.rounds_with_prediction,
            correct: ai.correct,
            incorrect: ai.incorrect,
            pushes: ai.pushes,
            accuracy: format_pct(ai.accuracy),
        }
    }
}

fn side_label(side: Option<Side>) -> String {
    side.map_or("-", |s| s.as_str()).to_string()
}

fn outcome_label(outcome: Option<Outcome>) -> String {
    outcome.map_or("-", |o| o.as_str()).to_string()
}

#[derive(Debug, Serialize, Tabled)]
pub struct UserRoundDisplay {
    pub round: u64,
    pub last_side: String,
    pub dominant_side: String,
    pub total_bet_wei: String,
    pub result: String,
    /// Dominant side matched the round result
    pub called_it: bool,
    pub gross_reward_wei: String,
    pub net_pnl_wei: String,
    pub won: bool,
    pub claimed: bool,
}

impl UserRoundDisplay {
    pub fn new(position: &UserRound, result: Option<Outcome>) -> Self {
        let dominant = position.dominant_side();
        Self {
            round: position.round_id,
            last_side: side_label(position.side),
            dominant_side: side_label(dominant),
            total_bet_wei: position.total_bet.to_string(),
            result: outcome_label(result),
            called_it: matches!(
                (dominant, result),
                (Some(side), Some(r)) if Outcome::from(side) == r
            ),
            gross_reward_wei: position.gross_reward.to_string(),
            net_pnl_wei: position.net_pnl.to_string(),
            won: position.won,
            claimed: position.claimed,
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct RoundDisplay {
    pub round: u64,
    pub status: String,
    pub winner: String,
    pub ai_prediction: String,
    pub up_pool_wei: String,
    pub down_pool_wei: String,
    pub total_pool_wei: String,
    pub participants: usize,
}

impl From<&Round> for RoundDisplay {
    fn from(round: &Round) -> Self {
        let status = if round.is_resolved() {
            "ENDED"
        } else if round.start_ts.is_some() {
            "LIVE"
        } else {
            "OPEN"
        };
        Self {
            round: round.round_id,
            status: status.to_string(),
            winner: match round.result {
                Some(result) => result.winning_side().map_or("PUSH", |s| s.as_str()).to_string(),
                None => "-".to_string(),
            },
            ai_prediction: outcome_label(round.ai_prediction),
            up_pool_wei: round.pool(Side::Up).to_string(),
            down_pool_wei: round.pool(Side::Down).to_string(),
            total_pool_wei: round.total_pool().to_string(),
            participants: round.participants.len(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct ReplayDisplay {
    pub event: String,
    pub count: usize,
}

pub async fn show_leaderboard(
    store: &dyn EntityStore,
    chain_id: u64,
    limit: usize,
    mode: OutputMode,
) -> anyhow::Result<()> {
    let rows: Vec<LeaderboardDisplay> = store
        .leaderboard(chain_id, limit)
        .await?
        .iter()
        .enumerate()
        .map(|(idx, row)| LeaderboardDisplay {
            rank: idx + 1,
            user: row.user.clone(),
            net_pnl_wei: row.total_net_pnl.to_string(),
            win_rate: format_pct(row.win_rate),
            rounds: row.rounds_played,
        })
        .collect();
    print_items(&rows, mode)
}

pub async fn show_user(
    store: &dyn EntityStore,
    chain_id: u64,
    address: &str,
    mode: OutputMode,
) -> anyhow::Result<()> {
    let stats = store.get_user_stats(&keys::user_key(chain_id, address)).await?;
    match (stats, mode) {
        (Some(stats), OutputMode::Table) => print_items(&[UserStatsDisplay::from(&stats)], mode),
        (stats, _) => print_item(stats.as_ref(), mode),
    }
}

pub async fn show_round(
    store: &dyn EntityStore,
    chain_id: u64,
    round_id: u64,
    mode: OutputMode,
) -> anyhow::Result<()> {
    let round: Option<Round> = store.get_round(&keys::round_key(chain_id, round_id)).await?;
    print_item(round.as_ref(), mode)
}

pub async fn show_user_history(
    store: &dyn EntityStore,
    chain_id: u64,
    address: &str,
    limit: usize,
    mode: OutputMode,
) -> anyhow::Result<()> {
    let positions = store.user_rounds(chain_id, address, limit).await?;
    let mut rows = Vec::with_capacity(positions.len());
    for position in &positions {
        let round = store
            .get_round(&keys::round_key(chain_id, position.round_id))
            .await?;
        let result = round.and_then(|r| r.result);
        rows.push(UserRoundDisplay::new(position, result));
    }
    print_items(&rows, mode)
}

pub async fn show_latest_rounds(
    store: &dyn EntityStore,
    chain_id: u64,
    limit: usize,
    mode: OutputMode,
) -> anyhow::Result<()> {
    let rows: Vec<RoundDisplay> = store
        .latest_rounds(chain_id, limit)
        .await?
        .iter()
        .map(RoundDisplay::from)
        .collect();
    print_items(&rows, mode)
}

pub async fn show_ai_stats(
    store: &dyn EntityStore,
    chain_id: u64,
    mode: OutputMode,
) -> anyhow::Result<()> {
    let ai = store.get_ai_stats(&keys::ai_key(chain_id)).await?;
    match (ai, mode) {
        (Some(ai), OutputMode::Table) => print_items(&[AiStatsDisplay::from(&ai)], mode),
        (ai, _) => print_item(ai.as_ref(), mode),
    }
}

pub fn show_replay_summary(summary: &ReplaySummary) -> anyhow::Result<()> {
    let rows: Vec<ReplayDisplay> = summary
        .by_event
        .iter()
        .map(|(event, count)| ReplayDisplay {
            event: event.to_string(),
            count: *count,
        })
        .collect();
    print_items(&rows, OutputMode::Table)?;
    println!("{} events applied", summary.applied);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::amount::eth;
    use crate::engine::FeeSchedule;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_leaderboard_command() {
        let cli = Cli::try_parse_from(["predictron", "leaderboard", "--chain", "11155111", "--limit", "5"])
            .unwrap();
        match cli.command {
            Commands::Leaderboard { chain, limit, json } => {
                assert_eq!(chain, 11155111);
                assert_eq!(limit, 5);
                assert!(!json);
            }
            _ => panic!("expected leaderboard command"),
        }
        assert_eq!(cli.config, "config");
    }

    #[test]
    fn test_user_stats_display() {
        let mut stats = UserStats::new(1, "0xAbc");
        stats.wins = 1;
        stats.losses = 3;
        stats.recompute_win_rate();

        let display = UserStatsDisplay::from(&stats);
        assert_eq!(display.user, "0xabc");
        assert_eq!(display.win_rate, "25.00%");
    }

    #[test]
    fn test_parse_history_command() {
        let cli = Cli::try_parse_from(["predictron", "history", "--chain", "1", "0xAbc", "--json"])
            .unwrap();
        match cli.command {
            Commands::History {
                chain,
                address,
                limit,
                json,
            } => {
                assert_eq!(chain, 1);
                assert_eq!(address, "0xAbc");
                assert_eq!(limit, 20);
                assert!(json);
            }
            _ => panic!("expected history command"),
        }
    }

    #[test]
    fn test_user_round_display_uses_dominant_side() {
        let mut position = UserRound::new(1, 4, "0xabc");
        position.add_stake(Side::Up, eth(3));
        position.add_stake(Side::Down, eth(1));

        let display = UserRoundDisplay::new(&position, Some(Outcome::Up));
        assert_eq!(display.last_side, "DOWN");
        assert_eq!(display.dominant_side, "UP");
        assert_eq!(display.result, "UP");
        assert!(display.called_it);

        let unresolved = UserRoundDisplay::new(&position, None);
        assert_eq!(unresolved.result, "-");
        assert!(!unresolved.called_it);
    }

    #[test]
    fn test_round_display_pools_and_winner() {
        let mut round = Round::new(1, 9, &FeeSchedule::default());
        round.add_stake(Side::Up, eth(2));
        round.add_stake(Side::Down, eth(1));
        round.add_participant("0xa");
        assert_eq!(RoundDisplay::from(&round).status, "OPEN");

        round.start_ts = Some(100);
        round.end_ts = Some(200);
        round.result = Some(Outcome::None);
        let display = RoundDisplay::from(&round);
        assert_eq!(display.status, "ENDED");
        assert_eq!(display.winner, "PUSH");
        assert_eq!(display.up_pool_wei, eth(2).to_string());
        assert_eq!(display.total_pool_wei, eth(3).to_string());
        assert_eq!(display.participants, 1);
    }

    #[test]
    fn test_show_commands_on_empty_store() {
        let store = crate::persistence::MemoryStore::new();
        tokio_test::block_on(async {
            show_leaderboard(&store, 1, 10, OutputMode::Table).await.unwrap();
            show_user(&store, 1, "0xabc", OutputMode::Json).await.unwrap();
            show_round(&store, 1, 7, OutputMode::Table).await.unwrap();
            show_ai_stats(&store, 1, OutputMode::Json).await.unwrap();
            show_user_history(&store, 1, "0xabc", 5, OutputMode::Table).await.unwrap();
            show_latest_rounds(&store, 1, 5, OutputMode::Json).await.unwrap();
        });
    }
}
