//! Append-only transaction ledger.
//!
//! The ledger is the ordered record of every balance-affecting event in a
//! session. Entries enter exclusively through [`TransactionLedger::append`]
//! (or the historical seeding variant) and are never removed or reordered;
//! after append only the attached receipt changes, and only through
//! [`TransactionLedger::tick`].

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use autoflow_core::{EngineError, EntryId, EntryKind, LedgerEntry, Receipt, ReceiptGenerator};

/// Append-only, timestamp-ordered record of ledger entries.
pub struct TransactionLedger {
    entries: Vec<LedgerEntry>,
    last_id: u64,
    generator: ReceiptGenerator,
}

/// Derived projection of the ledger grouped into calendar-day buckets,
/// most recent day first, entries within a day most recent first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerView {
    pub days: Vec<DayGroup>,
}

/// All entries sharing one local calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub entries: Vec<LedgerEntry>,
}

impl TransactionLedger {
    #[must_use]
    pub fn new(generator: ReceiptGenerator) -> Self {
        Self {
            entries: Vec::new(),
            last_id: 0,
            generator,
        }
    }

    /// Appends a new entry with a fresh `Pending` receipt.
    ///
    /// The sole entry point for live entries; fails fast with
    /// [`EngineError::InvalidAmount`] on a zero amount and appends nothing.
    pub fn append(
        &mut self,
        kind: EntryKind,
        signed_amount: Decimal,
        description: impl Into<String>,
    ) -> Result<LedgerEntry, EngineError> {
        let receipt = self.generator.create(kind);
        self.push(kind, signed_amount, description.into(), Utc::now(), receipt)
    }

    /// Appends a backdated, pre-confirmed entry. Used only while seeding a
    /// fresh session with sample history.
    pub fn append_historical(
        &mut self,
        kind: EntryKind,
        signed_amount: Decimal,
        description: impl Into<String>,
        age_days: u32,
    ) -> Result<LedgerEntry, EngineError> {
        let receipt = self.generator.create_historical(kind, age_days);
        let created_at = Utc::now() - Duration::days(i64::from(age_days));
        self.push(kind, signed_amount, description.into(), created_at, receipt)
    }

    fn push(
        &mut self,
        kind: EntryKind,
        signed_amount: Decimal,
        description: String,
        created_at: DateTime<Utc>,
        receipt: Receipt,
    ) -> Result<LedgerEntry, EngineError> {
        if signed_amount.is_zero() {
            return Err(EngineError::InvalidAmount {
                amount: signed_amount,
            });
        }
        // Time-based id, kept strictly monotonic even for backdated seeds.
        let millis = created_at.timestamp_millis().max(0) as u64;
        self.last_id = millis.max(self.last_id + 1);
        let entry = LedgerEntry {
            id: EntryId::new(self.last_id),
            kind,
            signed_amount,
            description,
            created_at,
            receipt,
        };
        tracing::debug!(id = %entry.id, %kind, amount = %signed_amount, "ledger entry appended");
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Advances every non-settled receipt one lifecycle step.
    ///
    /// Never fails; the sole writer of receipt transitions after creation.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        let Self {
            entries, generator, ..
        } = self;
        let mut advanced = 0usize;
        for entry in entries.iter_mut() {
            if entry.receipt.is_settled() {
                continue;
            }
            entry.receipt = generator.advance(&entry.receipt, now - entry.created_at);
            advanced += 1;
        }
        if advanced > 0 {
            tracing::trace!(advanced, "receipt tick");
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    #[must_use]
    pub fn find(&self, id: EntryId) -> Option<&LedgerEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Most-recent `limit` entries, newest first.
    #[must_use]
    pub fn view(&self, limit: usize) -> Vec<LedgerEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    /// Most-recent `limit` entries grouped by local calendar day.
    #[must_use]
    pub fn view_grouped(&self, limit: usize) -> LedgerView {
        let mut days: Vec<DayGroup> = Vec::new();
        for entry in self.view(limit) {
            let date = entry.created_at.with_timezone(&Local).date_naive();
            match days.last_mut() {
                Some(group) if group.date == date => group.entries.push(entry),
                _ => days.push(DayGroup {
                    date,
                    entries: vec![entry],
                }),
            }
        }
        LedgerView { days }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    use autoflow_core::{
        EngineError, EntryKind, ReceiptGenerator, ReceiptStatus, MAX_CONFIRMATIONS,
    };

    use super::TransactionLedger;

    fn ledger() -> TransactionLedger {
        TransactionLedger::new(ReceiptGenerator::seeded(11))
    }

    #[test]
    fn append_rejects_zero_amount_and_appends_nothing() {
        let mut ledger = ledger();
        let err = ledger
            .append(EntryKind::Deposit, dec!(0), "nothing")
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount { .. }));
        assert!(ledger.is_empty());
    }

    #[test]
    fn ids_are_strictly_monotonic_across_backdated_seeds() {
        let mut ledger = ledger();
        let old = ledger
            .append_historical(EntryKind::Deposit, dec!(750), "Initial deposit", 30)
            .unwrap();
        let newer = ledger
            .append_historical(EntryKind::Yield, dec!(3.29), "Weekly yield earned", 25)
            .unwrap();
        let live = ledger.append(EntryKind::Deposit, dec!(100), "Deposit").unwrap();

        assert!(old.id < newer.id);
        assert!(newer.id < live.id);
        assert_eq!(ledger.find(live.id).unwrap().signed_amount, dec!(100));
    }

    #[test]
    fn historical_entries_are_backdated_and_confirmed() {
        let mut ledger = ledger();
        let entry = ledger
            .append_historical(EntryKind::Spend, dec!(-78.45), "Online shopping purchase", 20)
            .unwrap();
        assert!(entry.created_at < Utc::now() - Duration::days(19));
        assert_eq!(entry.receipt.status, ReceiptStatus::Confirmed);
        assert_eq!(entry.receipt.confirmations, MAX_CONFIRMATIONS);
    }

    #[test]
    fn view_is_newest_first_and_respects_limit() {
        let mut ledger = ledger();
        ledger
            .append_historical(EntryKind::Deposit, dec!(750), "Initial deposit", 30)
            .unwrap();
        ledger
            .append_historical(EntryKind::Yield, dec!(3.29), "Weekly yield earned", 25)
            .unwrap();
        ledger.append(EntryKind::Deposit, dec!(50), "Deposit").unwrap();

        let view = ledger.view(2);
        assert_eq!(view.len(), 2);
        assert!(view[0].created_at >= view[1].created_at);
        assert_eq!(view[0].signed_amount, dec!(50));
    }

    #[test]
    fn grouped_view_buckets_by_day_newest_first() {
        let mut ledger = ledger();
        ledger
            .append_historical(EntryKind::Deposit, dec!(750), "Initial deposit", 30)
            .unwrap();
        ledger
            .append_historical(EntryKind::Yield, dec!(3.12), "Weekly yield earned", 18)
            .unwrap();
        ledger.append(EntryKind::Deposit, dec!(25), "Deposit").unwrap();
        ledger.append(EntryKind::Spend, dec!(-4.75), "Coffee shop purchase").unwrap();

        let grouped = ledger.view_grouped(10);
        assert_eq!(grouped.days.len(), 3);
        // Today's bucket holds both live entries, newest first.
        assert_eq!(grouped.days[0].entries.len(), 2);
        assert_eq!(grouped.days[0].entries[0].signed_amount, dec!(-4.75));
        assert!(grouped.days[0].date > grouped.days[1].date);
        assert!(grouped.days[1].date > grouped.days[2].date);
    }

    #[test]
    fn tick_advances_live_receipts_and_leaves_entries_immutable() {
        let mut ledger = ledger();
        let entry = ledger.append(EntryKind::Deposit, dec!(100), "Deposit").unwrap();
        assert_eq!(entry.receipt.status, ReceiptStatus::Pending);

        ledger.tick(Utc::now() + Duration::seconds(16));
        let after = ledger.find(entry.id).unwrap();
        assert_eq!(after.receipt.status, ReceiptStatus::Processing);
        assert_eq!(after.receipt.confirmations, 1);
        assert_eq!(after.id, entry.id);
        assert_eq!(after.kind, entry.kind);
        assert_eq!(after.signed_amount, entry.signed_amount);
        assert_eq!(after.created_at, entry.created_at);

        // Repeated ticks only ever move the receipt forward.
        let mut confirmations = after.receipt.confirmations;
        for step in 2..10 {
            ledger.tick(Utc::now() + Duration::seconds(16 + step * 15));
            let receipt = &ledger.find(entry.id).unwrap().receipt;
            assert!(receipt.confirmations >= confirmations);
            confirmations = receipt.confirmations;
        }
        assert_eq!(
            ledger.find(entry.id).unwrap().receipt.status,
            ReceiptStatus::Confirmed
        );
    }
}
