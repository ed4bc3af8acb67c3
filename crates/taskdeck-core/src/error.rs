//! Error taxonomy shared across TaskDeck crates.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TaskDeckError>;

/// All failure modes surfaced by TaskDeck components.
#[derive(Debug, Error)]
pub enum TaskDeckError {
    /// Bad input, rejected synchronously and never persisted.
    #[error("validation error: {0}")]
    Validation(String),

    /// The action store or task database is unavailable or corrupt.
    #[error("storage error: {0}")]
    Storage(String),

    /// Outbound notification transport failure.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
