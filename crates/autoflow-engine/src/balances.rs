//! Balance state machine.
//!
//! The single authority for wallet and card balance mutation. Every
//! successful operation appends exactly one ledger entry before the balance
//! fields change, so a failed append can never leave a silent balance
//! change behind.

use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;

use autoflow_core::{EngineError, EntryKind, LedgerEntry};

use crate::ledger::TransactionLedger;

/// Outcome phases of a card spend attempt. Terminal either way; a new
/// attempt starts from `Idle` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CardSpendPhase {
    Idle,
    Processing,
    Approved,
    Declined,
}

/// Wallet and card balances plus the card-network approval draw.
pub struct BalanceStateMachine {
    wallet: Decimal,
    card: Decimal,
    approval_probability: f64,
    rng: StdRng,
    last_spend_phase: CardSpendPhase,
}

impl BalanceStateMachine {
    #[must_use]
    pub fn new(
        seed_wallet: Decimal,
        seed_card: Decimal,
        approval_probability: f64,
        rng: StdRng,
    ) -> Self {
        Self {
            wallet: seed_wallet,
            card: seed_card,
            // `gen_bool` panics outside [0, 1].
            approval_probability: approval_probability.clamp(0.0, 1.0),
            rng,
            last_spend_phase: CardSpendPhase::Idle,
        }
    }

    #[must_use]
    pub fn wallet(&self) -> Decimal {
        self.wallet
    }

    #[must_use]
    pub fn card(&self) -> Decimal {
        self.card
    }

    #[must_use]
    pub fn last_spend_phase(&self) -> CardSpendPhase {
        self.last_spend_phase
    }

    /// Credits the wallet with a deposited asset.
    pub fn deposit(
        &mut self,
        ledger: &mut TransactionLedger,
        amount: Decimal,
        asset: &str,
    ) -> Result<LedgerEntry, EngineError> {
        require_positive(amount)?;
        let entry = ledger.append(
            EntryKind::Deposit,
            amount,
            format!("Deposited {asset} to savings"),
        )?;
        self.wallet += amount;
        Ok(entry)
    }

    /// Moves value from the wallet onto the card, recorded as a transfer.
    pub fn transfer_to_card(
        &mut self,
        ledger: &mut TransactionLedger,
        amount: Decimal,
        last_four: &str,
    ) -> Result<LedgerEntry, EngineError> {
        self.move_to_card(
            ledger,
            amount,
            EntryKind::TransferToCard,
            format!("Transferred from wallet to card ending in {last_four}"),
        )
    }

    /// Moves value from the wallet onto the card, recorded as a top-up.
    ///
    /// Identical semantics to [`Self::transfer_to_card`]; only the recorded
    /// entry kind differs, reflecting which flow the user came through.
    pub fn top_up_card(
        &mut self,
        ledger: &mut TransactionLedger,
        amount: Decimal,
        last_four: &str,
    ) -> Result<LedgerEntry, EngineError> {
        self.move_to_card(
            ledger,
            amount,
            EntryKind::TopUp,
            format!("Added funds to card ending in {last_four}"),
        )
    }

    fn move_to_card(
        &mut self,
        ledger: &mut TransactionLedger,
        amount: Decimal,
        kind: EntryKind,
        description: String,
    ) -> Result<LedgerEntry, EngineError> {
        require_positive(amount)?;
        if amount > self.wallet {
            return Err(EngineError::InsufficientFunds {
                requested: amount,
                available: self.wallet,
            });
        }
        let entry = ledger.append(kind, amount, description)?;
        self.wallet -= amount;
        self.card += amount;
        Ok(entry)
    }

    /// Attempts a card purchase, modelling card-network approval variance.
    ///
    /// On approval the card balance drops and one negative `Spend` entry is
    /// appended; on a decline nothing changes and the caller receives
    /// [`EngineError::Declined`].
    pub fn spend_from_card(
        &mut self,
        ledger: &mut TransactionLedger,
        amount: Decimal,
        last_four: &str,
    ) -> Result<LedgerEntry, EngineError> {
        require_positive(amount)?;
        if amount > self.card {
            return Err(EngineError::InsufficientFunds {
                requested: amount,
                available: self.card,
            });
        }
        self.last_spend_phase = CardSpendPhase::Processing;
        if !self.rng.gen_bool(self.approval_probability) {
            self.last_spend_phase = CardSpendPhase::Declined;
            tracing::info!(%amount, "card network declined the spend");
            return Err(EngineError::Declined);
        }
        let entry = ledger.append(
            EntryKind::Spend,
            -amount,
            format!("Purchase with card ending in {last_four}"),
        )?;
        self.card -= amount;
        self.last_spend_phase = CardSpendPhase::Approved;
        Ok(entry)
    }

    /// Credits collected yield onto the card, recorded as a top-up.
    pub fn credit_card_from_yield(
        &mut self,
        ledger: &mut TransactionLedger,
        amount: Decimal,
    ) -> Result<LedgerEntry, EngineError> {
        require_positive(amount)?;
        let entry = ledger.append(EntryKind::TopUp, amount, "Moved earnings to card")?;
        self.card += amount;
        Ok(entry)
    }

    /// Credits collected yield into the wallet, recorded as a deposit.
    pub fn credit_wallet_from_yield(
        &mut self,
        ledger: &mut TransactionLedger,
        amount: Decimal,
    ) -> Result<LedgerEntry, EngineError> {
        require_positive(amount)?;
        let entry = ledger.append(EntryKind::Deposit, amount, "Collected yield to wallet")?;
        self.wallet += amount;
        Ok(entry)
    }
}

fn require_positive(amount: Decimal) -> Result<(), EngineError> {
    if amount <= Decimal::ZERO {
        return Err(EngineError::InvalidAmount { amount });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use autoflow_core::{EngineError, EntryKind, ReceiptGenerator};

    use super::{BalanceStateMachine, CardSpendPhase};
    use crate::ledger::TransactionLedger;

    fn machine(approval_probability: f64) -> (BalanceStateMachine, TransactionLedger) {
        let machine = BalanceStateMachine::new(
            dec!(500.00),
            Decimal::ZERO,
            approval_probability,
            StdRng::seed_from_u64(21),
        );
        (machine, TransactionLedger::new(ReceiptGenerator::seeded(21)))
    }

    #[test]
    fn deposit_credits_wallet_and_appends_one_entry() {
        let (mut machine, mut ledger) = machine(1.0);
        let entry = machine.deposit(&mut ledger, dec!(100), "USDC").unwrap();
        assert_eq!(machine.wallet(), dec!(600.00));
        assert_eq!(entry.kind, EntryKind::Deposit);
        assert_eq!(entry.signed_amount, dec!(100));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn deposit_rejects_non_positive_amounts() {
        let (mut machine, mut ledger) = machine(1.0);
        for amount in [dec!(0), dec!(-5)] {
            let err = machine.deposit(&mut ledger, amount, "USDC").unwrap_err();
            assert!(matches!(err, EngineError::InvalidAmount { .. }));
        }
        assert_eq!(machine.wallet(), dec!(500.00));
        assert!(ledger.is_empty());
    }

    #[test]
    fn transfer_moves_value_and_guards_funds() {
        let (mut machine, mut ledger) = machine(1.0);
        machine
            .transfer_to_card(&mut ledger, dec!(200), "1234")
            .unwrap();
        assert_eq!(machine.wallet(), dec!(300.00));
        assert_eq!(machine.card(), dec!(200.00));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.entries()[0].kind, EntryKind::TransferToCard);

        let err = machine
            .transfer_to_card(&mut ledger, dec!(600), "1234")
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientFunds {
                requested: dec!(600),
                available: dec!(300.00),
            }
        );
        assert_eq!(machine.wallet(), dec!(300.00));
        assert_eq!(machine.card(), dec!(200.00));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn top_up_differs_from_transfer_only_by_kind() {
        let (mut machine, mut ledger) = machine(1.0);
        machine.top_up_card(&mut ledger, dec!(50), "1234").unwrap();
        assert_eq!(machine.wallet(), dec!(450.00));
        assert_eq!(machine.card(), dec!(50.00));
        assert_eq!(ledger.entries()[0].kind, EntryKind::TopUp);
    }

    #[test]
    fn approved_spend_debits_card_with_negative_entry() {
        let (mut machine, mut ledger) = machine(1.0);
        machine.top_up_card(&mut ledger, dec!(100), "1234").unwrap();

        let entry = machine
            .spend_from_card(&mut ledger, dec!(25), "1234")
            .unwrap();
        assert_eq!(machine.card(), dec!(75.00));
        assert_eq!(entry.kind, EntryKind::Spend);
        assert_eq!(entry.signed_amount, dec!(-25));
        assert_eq!(machine.last_spend_phase(), CardSpendPhase::Approved);
    }

    #[test]
    fn declined_spend_changes_nothing() {
        let (mut machine, mut ledger) = machine(0.0);
        machine.top_up_card(&mut ledger, dec!(100), "1234").unwrap();
        let before = ledger.len();

        let err = machine
            .spend_from_card(&mut ledger, dec!(25), "1234")
            .unwrap_err();
        assert_eq!(err, EngineError::Declined);
        assert_eq!(machine.card(), dec!(100.00));
        assert_eq!(ledger.len(), before);
        assert_eq!(machine.last_spend_phase(), CardSpendPhase::Declined);
    }

    #[test]
    fn spend_beyond_card_balance_is_insufficient_funds() {
        let (mut machine, mut ledger) = machine(1.0);
        let err = machine
            .spend_from_card(&mut ledger, dec!(25), "1234")
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFunds { .. }));
        assert_eq!(ledger.len(), 0);
    }

    #[test]
    fn out_of_range_approval_probability_is_clamped() {
        let mut machine = BalanceStateMachine::new(
            dec!(500.00),
            Decimal::ZERO,
            1.5,
            StdRng::seed_from_u64(21),
        );
        let mut ledger = TransactionLedger::new(ReceiptGenerator::seeded(21));
        machine.top_up_card(&mut ledger, dec!(100), "1234").unwrap();

        // Clamped to certain approval rather than panicking in the draw.
        machine.spend_from_card(&mut ledger, dec!(25), "1234").unwrap();
        assert_eq!(machine.card(), dec!(75.00));
        assert_eq!(machine.last_spend_phase(), CardSpendPhase::Approved);
    }

    #[test]
    fn wallet_plus_card_is_conserved_without_deposits_or_spends() {
        let (mut machine, mut ledger) = machine(1.0);
        let initial = machine.wallet() + machine.card();

        machine.transfer_to_card(&mut ledger, dec!(120), "1234").unwrap();
        machine.top_up_card(&mut ledger, dec!(80), "1234").unwrap();
        machine.deposit(&mut ledger, dec!(40), "USDC").unwrap();
        machine.spend_from_card(&mut ledger, dec!(30), "1234").unwrap();

        assert_eq!(
            machine.wallet() + machine.card(),
            initial + dec!(40) - dec!(30)
        );
    }
}
