use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid log level '{level}': {reason}")]
    InvalidLogLevel { level: String, reason: String },

    #[error("Tracing error: {0}")]
    Tracing(String),
}
