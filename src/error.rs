use thiserror::Error;

/// Main error type for the indexer
#[derive(Error, Debug)]
pub enum PredictronError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Chain access errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Log decode error: {0}")]
    Decode(String),

    #[error("Address parsing error: {0}")]
    AddressParsing(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for PredictronError
pub type Result<T> = std::result::Result<T, PredictronError>;

impl From<alloy::transports::TransportError> for PredictronError {
    fn from(err: alloy::transports::TransportError) -> Self {
        PredictronError::Rpc(err.to_string())
    }
}

impl From<alloy::sol_types::Error> for PredictronError {
    fn from(err: alloy::sol_types::Error) -> Self {
        PredictronError::Decode(err.to_string())
    }
}
