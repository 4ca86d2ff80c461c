use clap::Parser;
use predictron::adapters::{PostgresStore, RpcEventSource};
use predictron::cli::{self, Cli, Commands, OutputMode};
use predictron::config::{AppConfig, LoggingConfig, StorageBackend};
use predictron::engine::EventProcessor;
use predictron::error::{PredictronError, Result};
use predictron::persistence::{EntityStore, MemoryStore};
use predictron::services::{self, ChainIndexer, EventSource};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run => {
            let config = load_config(&cli.config)?;
            init_logging(&config.logging);
            run_indexers(config).await?;
        }
        Commands::Migrate => {
            let config = load_config(&cli.config)?;
            init_logging(&config.logging);
            let db = config.database.as_ref().ok_or_else(|| {
                PredictronError::Validation("migrate requires a [database] section".to_string())
            })?;
            let store = PostgresStore::new(&db.url, db.max_connections).await?;
            store.migrate().await?;
        }
        Commands::Replay { file } => {
            let config = load_config(&cli.config)?;
            init_logging(&config.logging);
            let store = open_store(&config).await?;
            let processor = EventProcessor::new(store.clone(), config.fees.schedule());

            let events = services::load_events(file).await?;
            let summary = services::replay(&processor, &events).await?;
            cli::show_replay_summary(&summary)?;

            let mut chains: Vec<u64> = events.iter().map(|e| e.chain_id).collect();
            chains.sort_unstable();
            chains.dedup();
            for chain_id in chains {
                println!("\nChain {chain_id}");
                cli::show_leaderboard(store.as_ref(), chain_id, 20, OutputMode::Table).await?;
            }
        }
        Commands::Leaderboard { chain, limit, json } => {
            init_logging_simple();
            let store = open_store(&load_config(&cli.config)?).await?;
            cli::show_leaderboard(store.as_ref(), *chain, *limit, OutputMode::from_json_flag(*json))
                .await?;
        }
        Commands::User { chain, address, json } => {
            init_logging_simple();
            let store = open_store(&load_config(&cli.config)?).await?;
            cli::show_user(store.as_ref(), *chain, address, OutputMode::from_json_flag(*json))
                .await?;
        }
        Commands::History {
            chain,
            address,
            limit,
            json,
        } => {
            init_logging_simple();
            let store = open_store(&load_config(&cli.config)?).await?;
            cli::show_user_history(
                store.as_ref(),
                *chain,
                address,
                *limit,
                OutputMode::from_json_flag(*json),
            )
            .await?;
        }
        Commands::Rounds { chain, limit, json } => {
            init_logging_simple();
            let store = open_store(&load_config(&cli.config)?).await?;
            cli::show_latest_rounds(store.as_ref(), *chain, *limit, OutputMode::from_json_flag(*json))
                .await?;
        }
        Commands::Round { chain, round, json } => {
            init_logging_simple();
            let store = open_store(&load_config(&cli.config)?).await?;
            cli::show_round(store.as_ref(), *chain, *round, OutputMode::from_json_flag(*json))
                .await?;
        }
        Commands::Ai { chain, json } => {
            init_logging_simple();
            let store = open_store(&load_config(&cli.config)?).await?;
            cli::show_ai_stats(store.as_ref(), *chain, OutputMode::from_json_flag(*json)).await?;
        }
    }

    Ok(())
}

fn load_config(dir: &str) -> Result<AppConfig> {
    let config = AppConfig::load_from(dir)?;
    if let Err(errors) = config.validate() {
        return Err(PredictronError::Validation(errors.join("; ")));
    }
    Ok(config)
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn EntityStore>> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::Postgres => {
            let db = config.database.as_ref().ok_or_else(|| {
                PredictronError::Validation("postgres backend requires [database]".to_string())
            })?;
            let store = PostgresStore::new(&db.url, db.max_connections).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
    }
}

async fn run_indexers(config: AppConfig) -> Result<()> {
    if config.chains.is_empty() {
        return Err(PredictronError::Validation(
            "no [[chains]] configured".to_string(),
        ));
    }
    if config.storage.backend == StorageBackend::Memory {
        warn!("Using the in-memory store; indexed state is lost on exit");
    }

    let store = open_store(&config).await?;
    let processor = EventProcessor::new(store, config.fees.schedule());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::new();
    for chain in &config.chains {
        let source: Arc<dyn EventSource> = Arc::new(RpcEventSource::connect(chain)?);
        let indexer = ChainIndexer::new(
            config.indexer.clone(),
            chain.start_block,
            source,
            processor.clone(),
        );
        let rx = shutdown_rx.clone();
        let chain_id = chain.chain_id;
        handles.push(tokio::spawn(async move {
            if let Err(e) = indexer.run(rx).await {
                error!("Indexer for chain {} exited: {}", chain_id, e);
            }
        }));
    }

    info!("Indexing {} chain(s), press Ctrl+C to stop", handles.len());
    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    for handle in handles {
        match tokio::time::timeout(Duration::from_secs(30), handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Indexer task panicked: {}", e),
            Err(_) => warn!("Indexer task did not stop within 30s"),
        }
    }

    info!("Shutdown complete");
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", config.level)));

    if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }
}

fn init_logging_simple() {
    // Minimal logging for read-only commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
