//! Session lifecycle and the engine command/query surface.
//!
//! [`SessionEngine`] owns the single active user/wallet binding and wires
//! the ledger, balance state machine and yield accrual together. All
//! mutation funnels through one command path that simulates network
//! latency, blocks duplicate in-flight submissions and discards the effect
//! of commands that outlive their session. Two background tasks advance
//! receipts and post yield for the lifetime of the session; both stop
//! synchronously on disconnect.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tokio::sync::Mutex;

use autoflow_core::{
    AuthProvider, CardLink, EngineError, EntryKind, LedgerEntry, ReceiptGenerator, Session,
};

use crate::accrual::{YieldAccrual, YieldProjection};
use crate::balances::{BalanceStateMachine, CardSpendPhase};
use crate::config::EngineConfig;
use crate::ledger::{LedgerView, TransactionLedger};
use crate::observability::{EngineObservability, ObservabilitySnapshot};
use crate::provider::WalletProvider;

mod tasks;

use tasks::SessionTasks;

/// Point-in-time view of the three balance pools.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSnapshot {
    pub wallet: Decimal,
    pub card: Decimal,
    pub yield_available: Decimal,
    pub card_spend_phase: CardSpendPhase,
}

/// Yield pool state plus rate projections for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldSummary {
    pub principal: Decimal,
    pub annual_rate: Decimal,
    pub available: Decimal,
    pub projection: YieldProjection,
}

struct ActiveSession {
    session: Session,
    ledger: TransactionLedger,
    balances: BalanceStateMachine,
    accrual: YieldAccrual,
}

struct EngineState {
    /// Bumped on every connect and disconnect; a delayed command re-checks
    /// it after its latency sleep so an effect never lands on a session
    /// other than the one that issued it.
    generation: u64,
    active: Option<ActiveSession>,
}

/// The engine: session owner plus the read/command surface the UI calls.
pub struct SessionEngine<P> {
    provider: Arc<P>,
    config: EngineConfig,
    observability: EngineObservability,
    state: Arc<Mutex<EngineState>>,
    tasks: Arc<StdMutex<Option<SessionTasks>>>,
    in_flight: Arc<StdMutex<HashSet<(u64, &'static str)>>>,
}

impl<P> Clone for SessionEngine<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            config: self.config.clone(),
            observability: self.observability.clone(),
            state: Arc::clone(&self.state),
            tasks: Arc::clone(&self.tasks),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

/// Releases a command's busy flag on drop, so a command future that is
/// dropped mid-latency can never leave its operation permanently blocked.
/// The flag is keyed by generation; a guard from a torn-down session
/// cannot release a flag held by its successor.
struct InFlightGuard {
    flags: Arc<StdMutex<HashSet<(u64, &'static str)>>>,
    key: (u64, &'static str),
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flags
            .lock()
            .expect("in-flight lock poisoned")
            .remove(&self.key);
    }
}

impl<P: WalletProvider> SessionEngine<P> {
    #[must_use]
    pub fn new(provider: P, config: EngineConfig) -> Self {
        Self {
            provider: Arc::new(provider),
            config,
            observability: EngineObservability::new(),
            state: Arc::new(Mutex::new(EngineState {
                generation: 0,
                active: None,
            })),
            tasks: Arc::new(StdMutex::new(None)),
            in_flight: Arc::new(StdMutex::new(HashSet::new())),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn observability(&self) -> ObservabilitySnapshot {
        self.observability.snapshot()
    }

    /// Connects a wallet and seeds a fresh session.
    ///
    /// A provider failure propagates before any state changes, leaving the
    /// engine exactly as it was. A connect while a session is live replaces
    /// it wholesale, as if `disconnect` had been called first.
    pub async fn connect(
        &self,
        auth_provider: AuthProvider,
        identity: &str,
    ) -> Result<Session, EngineError> {
        let created = self.provider.create_wallet(identity).await?;
        self.teardown().await;

        let (generator, mut session_rng) = match self.config.rng_seed {
            Some(seed) => (
                ReceiptGenerator::seeded(seed),
                StdRng::seed_from_u64(seed.wrapping_add(1)),
            ),
            None => (ReceiptGenerator::from_entropy(), StdRng::from_entropy()),
        };

        let card = match auth_provider {
            AuthProvider::Custodial => Some(CardLink::new("5432", dec!(800))),
            AuthProvider::ExternalSigner => session_rng
                // `gen_bool` panics outside [0, 1]; hand-built configs
                // bypass `EngineConfig::from_sources` validation.
                .gen_bool(self.config.card_prelink_probability.clamp(0.0, 1.0))
                .then(|| CardLink::new("1234", dec!(950))),
        };

        let mut ledger = TransactionLedger::new(generator);
        if self.config.seed_history {
            seed_history(&mut ledger, auth_provider);
        }

        let session = Session {
            user_address: created.address,
            auth_provider,
            card,
            connected_at: Utc::now(),
        };
        let active = ActiveSession {
            session: session.clone(),
            ledger,
            balances: BalanceStateMachine::new(
                self.config.seed_wallet_balance,
                self.config.seed_card_balance,
                self.config.spend_approval_probability,
                session_rng,
            ),
            accrual: YieldAccrual::new(self.config.principal, self.config.annual_rate),
        };

        {
            let mut state = self.state.lock().await;
            state.generation += 1;
            state.active = Some(active);
        }
        let tasks = SessionTasks::spawn(
            self.clone(),
            self.config.receipt_interval,
            self.config.accrual_interval,
        );
        *self.tasks.lock().expect("tasks lock poisoned") = Some(tasks);

        tracing::info!(
            address = %session.user_address,
            provider = %auth_provider,
            card_linked = session.card_linked(),
            "session connected"
        );
        Ok(session)
    }

    /// Stops both background tasks, then clears all session state.
    pub async fn disconnect(&self) -> Result<(), EngineError> {
        if self.teardown().await {
            tracing::info!("session disconnected");
            Ok(())
        } else {
            Err(EngineError::SessionNotFound)
        }
    }

    /// Cancels timers before touching state so no tick can fire against a
    /// cleared session.
    async fn teardown(&self) -> bool {
        let tasks = self.tasks.lock().expect("tasks lock poisoned").take();
        if let Some(tasks) = tasks {
            tasks.shutdown();
        }
        let mut state = self.state.lock().await;
        let had_session = state.active.take().is_some();
        if had_session {
            state.generation += 1;
        }
        had_session
    }

    /// Deposits an asset into the wallet balance.
    pub async fn deposit(
        &self,
        amount: Decimal,
        asset: &str,
    ) -> Result<LedgerEntry, EngineError> {
        let asset = asset.to_owned();
        self.command(
            "deposit",
            move |_| ensure_positive(amount),
            move |active| {
                let ActiveSession {
                    ledger, balances, ..
                } = active;
                balances.deposit(ledger, amount, &asset)
            },
        )
        .await
    }

    /// Moves wallet funds onto the card, recorded as a transfer.
    pub async fn transfer_to_card(&self, amount: Decimal) -> Result<LedgerEntry, EngineError> {
        self.command(
            "transfer_to_card",
            move |active| {
                ensure_positive(amount)?;
                ensure_card(active)
            },
            move |active| {
                let last_four = linked_last_four(active)?;
                let ActiveSession {
                    ledger, balances, ..
                } = active;
                balances.transfer_to_card(ledger, amount, &last_four)
            },
        )
        .await
    }

    /// Moves wallet funds onto the card, recorded as a top-up.
    pub async fn top_up_card(&self, amount: Decimal) -> Result<LedgerEntry, EngineError> {
        self.command(
            "top_up_card",
            move |active| {
                ensure_positive(amount)?;
                ensure_card(active)
            },
            move |active| {
                let last_four = linked_last_four(active)?;
                let ActiveSession {
                    ledger, balances, ..
                } = active;
                balances.top_up_card(ledger, amount, &last_four)
            },
        )
        .await
    }

    /// Attempts a card purchase; [`EngineError::Declined`] models the
    /// card-network losing the approval draw.
    pub async fn spend_from_card(&self, amount: Decimal) -> Result<LedgerEntry, EngineError> {
        self.command(
            "spend_from_card",
            move |active| {
                ensure_positive(amount)?;
                ensure_card(active)
            },
            move |active| {
                let last_four = linked_last_four(active)?;
                let ActiveSession {
                    ledger, balances, ..
                } = active;
                balances.spend_from_card(ledger, amount, &last_four)
            },
        )
        .await
    }

    /// Spends accrued yield directly, touching neither wallet nor card.
    pub async fn spend_yield_directly(
        &self,
        amount: Decimal,
    ) -> Result<LedgerEntry, EngineError> {
        self.command(
            "spend_yield_directly",
            move |_| ensure_positive(amount),
            move |active| {
                active.accrual.withdraw(amount)?;
                active
                    .ledger
                    .append(EntryKind::Spend, -amount, "Direct yield spend")
            },
        )
        .await
    }

    /// Collects accrued yield onto the card.
    pub async fn collect_yield_to_card(
        &self,
        amount: Decimal,
    ) -> Result<LedgerEntry, EngineError> {
        self.command(
            "collect_yield_to_card",
            move |active| {
                ensure_positive(amount)?;
                ensure_card(active)
            },
            move |active| {
                active.accrual.withdraw(amount)?;
                let ActiveSession {
                    ledger, balances, ..
                } = active;
                balances.credit_card_from_yield(ledger, amount)
            },
        )
        .await
    }

    /// Collects accrued yield into the wallet balance.
    pub async fn collect_yield_to_wallet(
        &self,
        amount: Decimal,
    ) -> Result<LedgerEntry, EngineError> {
        self.command(
            "collect_yield_to_wallet",
            move |_| ensure_positive(amount),
            move |active| {
                active.accrual.withdraw(amount)?;
                let ActiveSession {
                    ledger, balances, ..
                } = active;
                balances.credit_wallet_from_yield(ledger, amount)
            },
        )
        .await
    }

    /// Links a card to the session. Idempotent; a second link keeps the
    /// existing card.
    pub async fn link_card(&self, last_four: &str) -> Result<CardLink, EngineError> {
        let mut state = self.state.lock().await;
        let active = state
            .active
            .as_mut()
            .ok_or(EngineError::SessionNotFound)?;
        let newly_linked = active.session.card.is_none();
        let card = active
            .session
            .card
            .get_or_insert_with(|| CardLink::new(last_four, dec!(800)))
            .clone();
        if newly_linked {
            tracing::info!(last_four = %card.last_four, "card linked");
        }
        self.observability.record_command_ok();
        Ok(card)
    }

    /// The active session, if any.
    pub async fn session(&self) -> Option<Session> {
        let state = self.state.lock().await;
        state.active.as_ref().map(|active| active.session.clone())
    }

    pub async fn balances(&self) -> Result<BalanceSnapshot, EngineError> {
        let state = self.state.lock().await;
        let active = state.active.as_ref().ok_or(EngineError::SessionNotFound)?;
        Ok(BalanceSnapshot {
            wallet: active.balances.wallet(),
            card: active.balances.card(),
            yield_available: active.accrual.available(),
            card_spend_phase: active.balances.last_spend_phase(),
        })
    }

    pub async fn card_info(&self) -> Result<Option<CardLink>, EngineError> {
        let state = self.state.lock().await;
        let active = state.active.as_ref().ok_or(EngineError::SessionNotFound)?;
        Ok(active.session.card.clone())
    }

    /// Most-recent entries, newest first.
    pub async fn ledger_entries(&self, limit: usize) -> Result<Vec<LedgerEntry>, EngineError> {
        let state = self.state.lock().await;
        let active = state.active.as_ref().ok_or(EngineError::SessionNotFound)?;
        Ok(active.ledger.view(limit))
    }

    /// Most-recent entries grouped by local calendar day.
    pub async fn ledger_view(&self, limit: usize) -> Result<LedgerView, EngineError> {
        let state = self.state.lock().await;
        let active = state.active.as_ref().ok_or(EngineError::SessionNotFound)?;
        Ok(active.ledger.view_grouped(limit))
    }

    pub async fn yield_summary(&self) -> Result<YieldSummary, EngineError> {
        let state = self.state.lock().await;
        let active = state.active.as_ref().ok_or(EngineError::SessionNotFound)?;
        Ok(YieldSummary {
            principal: active.accrual.principal(),
            annual_rate: active.accrual.annual_rate(),
            available: active.accrual.available(),
            projection: active.accrual.projection(),
        })
    }

    /// Balance figure for display only.
    ///
    /// Asks the provider and falls back to the simulated balance when the
    /// call fails, flooring a zero result at the configured display floor.
    /// Never mutates ledger state; a presentation rule, not a ledger rule.
    pub async fn display_balance(&self) -> Result<Decimal, EngineError> {
        let (address, simulated) = {
            let state = self.state.lock().await;
            let active = state.active.as_ref().ok_or(EngineError::SessionNotFound)?;
            (
                active.session.user_address.clone(),
                active.balances.wallet(),
            )
        };
        match self.provider.fetch_balance(&address).await {
            Ok(balance) if balance.amount > Decimal::ZERO => Ok(balance.amount),
            Ok(_) => Ok(self.config.display_floor),
            Err(err) => {
                tracing::warn!(%err, "balance fetch failed, using simulated balance");
                if simulated > Decimal::ZERO {
                    Ok(simulated)
                } else {
                    Ok(self.config.display_floor)
                }
            }
        }
    }

    /// Advances every in-flight receipt one lifecycle step.
    ///
    /// Driven by the background task every receipt interval; also callable
    /// directly to step the simulation deterministically.
    pub async fn tick_receipts(&self) {
        let mut state = self.state.lock().await;
        if let Some(active) = state.active.as_mut() {
            active.ledger.tick(Utc::now());
            self.observability.record_receipt_tick();
        }
    }

    /// Posts one accrual interval of yield.
    pub async fn tick_yield(&self) {
        let mut state = self.state.lock().await;
        if let Some(active) = state.active.as_mut() {
            let ActiveSession {
                ledger, accrual, ..
            } = active;
            if accrual.tick(ledger).is_some() {
                self.observability.record_yield_tick();
            }
        }
    }

    async fn command<T>(
        &self,
        op: &'static str,
        validate: impl FnOnce(&ActiveSession) -> Result<(), EngineError>,
        apply: impl FnOnce(&mut ActiveSession) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let result = self.command_inner(op, validate, apply).await;
        match &result {
            Ok(_) => self.observability.record_command_ok(),
            Err(err) => self.observability.record_command_err(err.code()),
        }
        result
    }

    async fn command_inner<T>(
        &self,
        op: &'static str,
        validate: impl FnOnce(&ActiveSession) -> Result<(), EngineError>,
        apply: impl FnOnce(&mut ActiveSession) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let (generation, _guard) = {
            let mut state = self.state.lock().await;
            let generation = state.generation;
            let active = state
                .active
                .as_mut()
                .ok_or(EngineError::SessionNotFound)?;
            // Fail fast on caller errors before the simulated latency.
            validate(active)?;
            let key = (generation, op);
            if !self
                .in_flight
                .lock()
                .expect("in-flight lock poisoned")
                .insert(key)
            {
                return Err(EngineError::OperationInFlight(op));
            }
            let guard = InFlightGuard {
                flags: Arc::clone(&self.in_flight),
                key,
            };
            (generation, guard)
        };

        // Simulated network latency; the in-flight flag above rejects a
        // duplicate submission while this one is pending.
        tokio::time::sleep(self.config.op_delay).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::warn!(op, "discarding command that outlived its session");
            return Err(EngineError::SessionNotFound);
        }
        let active = state
            .active
            .as_mut()
            .ok_or(EngineError::SessionNotFound)?;
        apply(active)
    }
}

fn ensure_positive(amount: Decimal) -> Result<(), EngineError> {
    if amount <= Decimal::ZERO {
        return Err(EngineError::InvalidAmount { amount });
    }
    Ok(())
}

fn ensure_card(active: &ActiveSession) -> Result<(), EngineError> {
    if active.session.card_linked() {
        Ok(())
    } else {
        Err(EngineError::CardNotLinked)
    }
}

fn linked_last_four(active: &ActiveSession) -> Result<String, EngineError> {
    active
        .session
        .card
        .as_ref()
        .map(|card| card.last_four.clone())
        .ok_or(EngineError::CardNotLinked)
}

/// Seeds roughly a month of believable history so the transaction log is
/// never empty right after connect. The custodial flow mirrors a freshly
/// onboarded account; the external-signer flow mirrors an account that has
/// been earning and spending for a while.
fn seed_history(ledger: &mut TransactionLedger, auth_provider: AuthProvider) {
    let seeds: &[(EntryKind, Decimal, &str, u32)] = match auth_provider {
        AuthProvider::Custodial => &[
            (EntryKind::Deposit, dec!(650.00), "Initial deposit", 7),
            (EntryKind::Yield, dec!(4.32), "Interest earned", 3),
        ],
        AuthProvider::ExternalSigner => &[
            (EntryKind::Deposit, dec!(750.00), "Initial deposit", 30),
            (EntryKind::Yield, dec!(3.29), "Weekly yield earned", 25),
            (EntryKind::Spend, dec!(-78.45), "Online shopping purchase", 20),
            (EntryKind::Yield, dec!(3.12), "Weekly yield earned", 18),
            (
                EntryKind::TransferToCard,
                dec!(50.00),
                "Transferred earnings to card",
                15,
            ),
            (EntryKind::Spend, dec!(-4.75), "Coffee shop purchase", 10),
            (EntryKind::Yield, dec!(3.24), "Weekly yield earned", 7),
            (EntryKind::Spend, dec!(-22.50), "Restaurant purchase", 3),
            (EntryKind::Yield, dec!(0.42), "Daily yield earned", 1),
        ],
    };
    for (kind, amount, description, age_days) in seeds {
        if let Err(err) = ledger.append_historical(*kind, *amount, *description, *age_days) {
            tracing::warn!(%err, "failed to seed sample history entry");
        }
    }
}
