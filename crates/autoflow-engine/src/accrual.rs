//! Yield accrual on a fixed demo principal.
//!
//! Yield is simple, non-compounding daily interest on a principal that is
//! deliberately decoupled from the spendable wallet balance, so spending
//! never feeds back into future yield. Each accrual tick posts one `Yield`
//! ledger entry and grows the uncollected pool; collection and direct-spend
//! paths drain the pool through [`YieldAccrual::withdraw`] while the caller
//! owns the corresponding ledger posting.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use autoflow_core::{EngineError, EntryKind, LedgerEntry};

use crate::ledger::TransactionLedger;

/// Periodic yield generator and its uncollected pool.
#[derive(Debug, Clone, PartialEq)]
pub struct YieldAccrual {
    principal: Decimal,
    annual_rate: Decimal,
    accrued: Decimal,
}

/// Projected earnings at the configured rate over standard periods.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YieldProjection {
    pub daily: Decimal,
    pub weekly: Decimal,
    pub monthly: Decimal,
    pub annual: Decimal,
}

impl YieldAccrual {
    #[must_use]
    pub fn new(principal: Decimal, annual_rate: Decimal) -> Self {
        Self {
            principal,
            annual_rate,
            accrued: Decimal::ZERO,
        }
    }

    #[must_use]
    pub fn principal(&self) -> Decimal {
        self.principal
    }

    #[must_use]
    pub fn annual_rate(&self) -> Decimal {
        self.annual_rate
    }

    /// Yield generated but not yet collected or spent.
    #[must_use]
    pub fn available(&self) -> Decimal {
        self.accrued
    }

    /// The canonical per-tick unit: one day of simple interest, rounded to
    /// cents.
    #[must_use]
    pub fn daily_amount(&self) -> Decimal {
        (self.principal * self.annual_rate / dec!(365)).round_dp(2)
    }

    #[must_use]
    pub fn projection(&self) -> YieldProjection {
        let annual = self.principal * self.annual_rate;
        YieldProjection {
            daily: (annual / dec!(365)).round_dp(2),
            weekly: (annual / dec!(52)).round_dp(2),
            monthly: (annual / dec!(12)).round_dp(2),
            annual: annual.round_dp(2),
        }
    }

    /// One accrual interval: grows the pool and posts a `Yield` entry.
    ///
    /// Skips entirely when the rounded daily amount is zero; a zero-amount
    /// ledger entry is never posted.
    pub fn tick(&mut self, ledger: &mut TransactionLedger) -> Option<LedgerEntry> {
        let amount = self.daily_amount();
        if amount.is_zero() {
            tracing::trace!("daily yield rounds to zero, skipping tick");
            return None;
        }
        match ledger.append(EntryKind::Yield, amount, "Daily yield earned") {
            Ok(entry) => {
                self.accrued += amount;
                tracing::debug!(%amount, accrued = %self.accrued, "yield posted");
                Some(entry)
            }
            Err(err) => {
                // Accrual ticks must never abort the background task.
                tracing::warn!(%err, "failed to post yield entry");
                None
            }
        }
    }

    /// Removes `amount` from the uncollected pool.
    pub fn withdraw(&mut self, amount: Decimal) -> Result<(), EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount { amount });
        }
        if amount > self.accrued {
            return Err(EngineError::InsufficientYield {
                requested: amount,
                available: self.accrued,
            });
        }
        self.accrued -= amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use autoflow_core::{EngineError, EntryKind, ReceiptGenerator};

    use super::YieldAccrual;
    use crate::ledger::TransactionLedger;

    #[test]
    fn daily_amount_is_rounded_simple_interest() {
        let accrual = YieldAccrual::new(dec!(789.23), dec!(0.052));
        assert_eq!(accrual.daily_amount(), dec!(0.11));
    }

    #[test]
    fn projections_derive_from_the_annual_rate() {
        let projection = YieldAccrual::new(dec!(789.23), dec!(0.052)).projection();
        assert_eq!(projection.daily, dec!(0.11));
        assert_eq!(projection.weekly, dec!(0.79));
        assert_eq!(projection.monthly, dec!(3.42));
        assert_eq!(projection.annual, dec!(41.04));
    }

    #[test]
    fn tick_grows_pool_and_posts_exactly_one_entry() {
        let mut ledger = TransactionLedger::new(ReceiptGenerator::seeded(5));
        let mut accrual = YieldAccrual::new(dec!(789.23), dec!(0.052));

        let entry = accrual.tick(&mut ledger).expect("posts yield");
        assert_eq!(entry.kind, EntryKind::Yield);
        assert_eq!(entry.signed_amount, dec!(0.11));
        assert_eq!(accrual.available(), dec!(0.11));
        assert_eq!(ledger.len(), 1);

        accrual.tick(&mut ledger);
        assert_eq!(accrual.available(), dec!(0.22));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn zero_rounded_tick_posts_nothing() {
        let mut ledger = TransactionLedger::new(ReceiptGenerator::seeded(5));
        let mut accrual = YieldAccrual::new(dec!(1.00), dec!(0.052));
        assert!(accrual.tick(&mut ledger).is_none());
        assert!(ledger.is_empty());
        assert_eq!(accrual.available(), dec!(0));
    }

    #[test]
    fn withdraw_validates_amount_and_pool() {
        let mut accrual = YieldAccrual::new(dec!(789.23), dec!(0.052));
        let mut ledger = TransactionLedger::new(ReceiptGenerator::seeded(5));
        accrual.tick(&mut ledger);

        assert!(matches!(
            accrual.withdraw(dec!(0)),
            Err(EngineError::InvalidAmount { .. })
        ));
        assert!(matches!(
            accrual.withdraw(dec!(5)),
            Err(EngineError::InsufficientYield { .. })
        ));
        accrual.withdraw(dec!(0.11)).expect("full pool");
        assert_eq!(accrual.available(), dec!(0));
    }
}
