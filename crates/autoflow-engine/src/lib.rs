//! Session runtime for the AutoFlow wallet and ledger simulation.
//!
//! The engine tracks a single connected session's wallet, card and yield
//! balances, records every balance-affecting event in an append-only
//! ledger with a simulated on-chain settlement lifecycle, and runs the two
//! background tasks that advance receipts and post yield. The UI layer
//! talks to [`SessionEngine`] exclusively; see `autoflow-core` for the
//! underlying domain types.

pub mod accrual;
pub mod balances;
pub mod config;
pub mod ledger;
pub mod observability;
pub mod provider;
pub mod session;

pub use crate::accrual::{YieldAccrual, YieldProjection};
pub use crate::balances::{BalanceStateMachine, CardSpendPhase};
pub use crate::config::{EngineConfig, EngineConfigOverrides};
pub use crate::ledger::{DayGroup, LedgerView, TransactionLedger};
pub use crate::observability::{EngineObservability, ObservabilitySnapshot};
pub use crate::provider::{CreatedWallet, ProviderBalance, SimulatedProvider, WalletProvider};
pub use crate::session::{BalanceSnapshot, SessionEngine, YieldSummary};
