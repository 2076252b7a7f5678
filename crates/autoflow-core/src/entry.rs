//! Ledger entry types.
//!
//! A [`LedgerEntry`] is one immutable record of a balance-affecting event.
//! Only the attached [`Receipt`](crate::receipt::Receipt) may change after
//! the entry is appended, and only through the receipt lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::receipt::Receipt;

/// Unique, time-based ledger entry identifier.
///
/// Identifiers are derived from the entry's creation timestamp in
/// milliseconds and are strictly monotonic with respect to append order,
/// even when entries are backdated during session seeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(u64);

impl EntryId {
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of balance-affecting event an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Deposit,
    Spend,
    #[serde(rename = "transfer")]
    TransferToCard,
    Yield,
    #[serde(rename = "topup")]
    TopUp,
}

impl EntryKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Spend => "spend",
            Self::TransferToCard => "transfer",
            Self::Yield => "yield",
            Self::TopUp => "topup",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable record of a balance-affecting event.
///
/// `signed_amount` is positive when the referenced balance increased and
/// negative when it decreased; a zero amount is rejected before an entry is
/// ever constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub kind: EntryKind,
    pub signed_amount: Decimal,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub receipt: Receipt,
}

#[cfg(test)]
mod tests {
    use super::EntryKind;

    #[test]
    fn entry_kind_labels_match_wire_names() {
        assert_eq!(EntryKind::Deposit.as_str(), "deposit");
        assert_eq!(EntryKind::TransferToCard.as_str(), "transfer");
        assert_eq!(EntryKind::TopUp.as_str(), "topup");
        assert_eq!(EntryKind::Yield.to_string(), "yield");
    }
}
