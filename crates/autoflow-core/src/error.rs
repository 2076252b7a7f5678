//! Error taxonomy for the engine and its collaborators.
//!
//! Expected business-rule failures (bad amounts, insufficient balances, a
//! declined card draw) are typed variants the caller branches on; nothing in
//! the engine panics for an expected condition. Provider failures bubble to
//! the connect flow, which must leave the engine in its pre-connect state.

use rust_decimal::Decimal;
use thiserror::Error;

/// Failures returned by the wallet provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("wallet provider unavailable: {0}")]
    Unavailable(String),
    #[error("wallet provider rejected the request: {0}")]
    Rejected(String),
}

/// Typed failure surface of every engine command.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Amount was zero or negative where a positive value is required.
    #[error("amount must be positive, got {amount}")]
    InvalidAmount { amount: Decimal },
    /// Requested amount exceeds the relevant balance.
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },
    /// Requested amount exceeds the accrued, uncollected yield.
    #[error("insufficient yield: requested {requested}, available {available}")]
    InsufficientYield {
        requested: Decimal,
        available: Decimal,
    },
    /// A card operation was attempted with no linked card.
    #[error("no card is linked to the active session")]
    CardNotLinked,
    /// The simulated card network declined the spend; the caller may retry.
    #[error("card transaction declined")]
    Declined,
    /// The same operation is already in flight for this session.
    #[error("{0} is already in flight")]
    OperationInFlight(&'static str),
    /// A command was issued without an active session.
    #[error("no active session")]
    SessionNotFound,
    /// Connect-time failure talking to the wallet provider.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl EngineError {
    /// Stable short code used as the observability counter key.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::InsufficientYield { .. } => "insufficient_yield",
            Self::CardNotLinked => "card_not_linked",
            Self::Declined => "declined",
            Self::OperationInFlight(_) => "operation_in_flight",
            Self::SessionNotFound => "session_not_found",
            Self::Provider(ProviderError::Unavailable(_)) => "provider_unavailable",
            Self::Provider(ProviderError::Rejected(_)) => "provider_rejected",
        }
    }
}
