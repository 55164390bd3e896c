use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Network counters unavailable: {0}")]
    CountersUnavailable(String),

    #[error("Corrupt usage record for {date}: {reason}")]
    CorruptRecord { date: String, reason: String },

    #[error("Value out of range: {0}")]
    ValueOutOfRange(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}
