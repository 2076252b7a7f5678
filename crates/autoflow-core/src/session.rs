//! Session records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::card::CardLink;

/// How the connected wallet is authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthProvider {
    /// Wallet-as-a-service custodial wallet created for the user.
    Custodial,
    /// User-controlled wallet behind an external signer.
    ExternalSigner,
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custodial => f.write_str("custodial"),
            Self::ExternalSigner => f.write_str("external_signer"),
        }
    }
}

/// The single active user/wallet binding.
///
/// Created on a successful connect, destroyed together with all derived
/// state on disconnect. `user_address` is immutable once set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub user_address: String,
    pub auth_provider: AuthProvider,
    pub card: Option<CardLink>,
    pub connected_at: DateTime<Utc>,
}

impl Session {
    /// Whether a virtual card is linked to this session.
    #[must_use]
    pub fn card_linked(&self) -> bool {
        self.card.is_some()
    }
}
