//! Engine error types.

use thiserror::Error;

/// Errors surfaced by the trading subsystems.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Security id not present in the security master.
    #[error("Invalid security id: {0}")]
    UnknownSecurity(i64),

    /// Sub-account not present in the account master.
    #[error("Invalid sub_account: {0}")]
    UnknownAccount(String),

    /// Order id not present in the global order book.
    #[error("Invalid order id: {0}")]
    UnknownOrder(i64),

    /// No adapter registered for the given exchange or feed.
    #[error("No adapter for: {0}")]
    NoAdapter(String),

    /// Algo name not present in the adapter registry.
    #[error("Unknown algo name: {0}")]
    UnknownAlgo(String),

    /// Running algo not found by token or id.
    #[error("Unknown algo instance: {0}")]
    UnknownAlgoInstance(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
