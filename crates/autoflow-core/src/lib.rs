//! Domain primitives for the AutoFlow wallet and ledger simulation.
//!
//! The crate provides the strongly typed building blocks shared by the
//! engine and the CLI: ledger entries, the simulated on-chain settlement
//! receipt with its generator, card and session records, and the error
//! taxonomy. Nothing in here performs I/O or spawns tasks; the runtime
//! behaviour lives in `autoflow-engine`.

pub mod card;
pub mod entry;
pub mod error;
pub mod receipt;
pub mod session;

pub use crate::card::{CardLink, CardStatus};
pub use crate::entry::{EntryId, EntryKind, LedgerEntry};
pub use crate::error::{EngineError, ProviderError};
pub use crate::receipt::{
    Network, Receipt, ReceiptGenerator, ReceiptStatus, CONFIRMATION_THRESHOLD, MAX_CONFIRMATIONS,
};
pub use crate::session::{AuthProvider, Session};
