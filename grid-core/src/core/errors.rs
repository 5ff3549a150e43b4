//! Error taxonomy for the grid engine and its adapters.

use rust_decimal::Decimal;
use thiserror::Error;

/// Top-level error type shared by the domain types, the grid engine,
/// and the order-transaction monitor.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("config error: {0}")]
    ConfigError(String),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("venue error {code}: {msg}")]
    VenueError { code: i64, msg: String },

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("insufficient funds: need {need}, have {have}")]
    InsufficientFunds { need: Decimal, have: Decimal },

    #[error("insufficient inventory: need {need}, have {have}")]
    InsufficientInventory { need: Decimal, have: Decimal },

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("invalid order status transition: {from:?} -> {to:?}")]
    InvalidStateTransition {
        from: crate::core::types::OrderStatus,
        to: crate::core::types::OrderStatus,
    },

    #[error("shutdown requested")]
    Shutdown,
}

/// Errors raised by an [`crate::adapter::ExchangeAdapter`] at the transport/response layer,
/// distinct from [`GridError`] because most of these are caught and translated into
/// a canonical `Rejected` execution report rather than propagated.
#[derive(Debug, Error, Clone)]
pub enum AdapterError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("venue error {code}: {msg}")]
    VenueError { code: i64, msg: String },

    #[error("failed to parse response: {0}")]
    ParseFailure(String),
}

impl From<AdapterError> for GridError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Transport(msg) => GridError::TransportError(msg),
            AdapterError::InvalidResponse(msg) => GridError::ParseError(msg),
            AdapterError::VenueError { code, msg } => GridError::VenueError { code, msg },
            AdapterError::ParseFailure(msg) => GridError::ParseError(msg),
        }
    }
}
