//! Virtual card records.

use rust_decimal::Decimal;
use serde::Serialize;

/// Lifecycle state of a linked card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    Active,
    Pending,
    Blocked,
}

/// A virtual spending card linked to the session.
///
/// Presence of a `CardLink` on the session is what gates card operations;
/// there is no separate `is_linked` flag to drift out of sync.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardLink {
    pub last_four: String,
    pub credit_limit: Decimal,
    pub status: CardStatus,
}

impl CardLink {
    #[must_use]
    pub fn new(last_four: impl Into<String>, credit_limit: Decimal) -> Self {
        Self {
            last_four: last_four.into(),
            credit_limit,
            status: CardStatus::Active,
        }
    }
}
