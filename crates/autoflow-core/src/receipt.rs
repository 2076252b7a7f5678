//! Simulated on-chain settlement receipts.
//!
//! Every ledger entry carries a [`Receipt`] that mimics the metadata a block
//! explorer would show for a real transaction: hash, addresses, gas figures
//! and a confirmation count that advances over time. The lifecycle is
//! `Pending -> Processing -> Confirmed` and never moves backwards;
//! confirmations are monotonically non-decreasing and stop growing at
//! [`MAX_CONFIRMATIONS`].

use chrono::Duration;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::entry::EntryKind;

/// Confirmations at which a receipt transitions to [`ReceiptStatus::Confirmed`].
pub const CONFIRMATION_THRESHOLD: u32 = 6;

/// Confirmations after which a receipt stops advancing entirely.
pub const MAX_CONFIRMATIONS: u32 = 12;

/// Seconds a receipt stays `Pending` before it starts processing.
const PROCESSING_DELAY_SECS: i64 = 15;

const GAS_USED_MIN: u64 = 21_000;
const GAS_USED_SPAN: u64 = 100_000;
const BLOCK_NUMBER_BASE: u64 = 15_000_000;
const BLOCK_NUMBER_SPAN: u64 = 1_000_000;

/// Settlement state of a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Pending,
    Processing,
    Confirmed,
}

/// Network a simulated transaction settles on.
///
/// Spends use Polygon (the cost-sensitive card path), everything else
/// settles on Ethereum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Network {
    Ethereum,
    Polygon,
}

impl Network {
    #[must_use]
    pub const fn for_kind(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Spend => Self::Polygon,
            _ => Self::Ethereum,
        }
    }

    #[must_use]
    pub const fn currency(&self) -> &'static str {
        match self {
            Self::Ethereum => "ETH",
            Self::Polygon => "MATIC",
        }
    }
}

/// Simulated settlement metadata attached to a ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub tx_hash: String,
    pub from_address: String,
    pub to_address: String,
    pub network: Network,
    pub currency: String,
    pub gas_used: u64,
    pub gas_price_gwei: Decimal,
    pub fee: Decimal,
    pub block_number: Option<u64>,
    pub confirmations: u32,
    pub status: ReceiptStatus,
}

impl Receipt {
    /// Whether the receipt has reached its terminal display state and no
    /// further `advance` call will change it.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.status == ReceiptStatus::Confirmed && self.confirmations >= MAX_CONFIRMATIONS
    }
}

/// Generator producing and advancing [`Receipt`]s from an injectable random
/// source.
///
/// Construct with [`ReceiptGenerator::seeded`] in tests for deterministic
/// hashes, gas figures and block numbers.
#[derive(Debug)]
pub struct ReceiptGenerator {
    rng: StdRng,
}

impl ReceiptGenerator {
    /// Generator backed by OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator for tests and reproducible demo runs.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Produces a fresh `Pending` receipt for an entry of the given kind.
    pub fn create(&mut self, kind: EntryKind) -> Receipt {
        let network = Network::for_kind(kind);
        let gas_used = GAS_USED_MIN + self.rng.gen_range(0..GAS_USED_SPAN);
        // Gwei price in [10, 30) with two decimal places.
        let gas_price_gwei = Decimal::new(i64::from(self.rng.gen_range(1_000u32..3_000)), 2);
        let fee = (Decimal::from(gas_used) * gas_price_gwei / Decimal::new(1_000_000_000, 0))
            .round_dp(6);
        Receipt {
            tx_hash: self.random_hex(32),
            from_address: self.random_hex(20),
            to_address: self.random_hex(20),
            network,
            currency: network.currency().to_owned(),
            gas_used,
            gas_price_gwei,
            fee,
            block_number: None,
            confirmations: 0,
            status: ReceiptStatus::Pending,
        }
    }

    /// Produces an already-confirmed receipt for seeding sample history.
    ///
    /// Older entries carry more confirmations, capped at
    /// [`MAX_CONFIRMATIONS`], so a 30-day-old seed entry renders as fully
    /// settled while yesterday's still shows partial settlement.
    pub fn create_historical(&mut self, kind: EntryKind, age_days: u32) -> Receipt {
        let mut receipt = self.create(kind);
        receipt.block_number = Some(self.random_block_number());
        receipt.confirmations = MAX_CONFIRMATIONS.min((age_days + 1) * 2);
        receipt.status = ReceiptStatus::Confirmed;
        receipt
    }

    /// One lifecycle step for a receipt whose entry is `age` old.
    ///
    /// Safe to call on any cadence: the returned receipt never has fewer
    /// confirmations than the input and the status never regresses. A
    /// settled receipt is returned unchanged.
    pub fn advance(&mut self, receipt: &Receipt, age: Duration) -> Receipt {
        let mut next = receipt.clone();
        match receipt.status {
            ReceiptStatus::Pending => {
                if age.num_seconds() >= PROCESSING_DELAY_SECS {
                    next.status = ReceiptStatus::Processing;
                    next.block_number = Some(self.random_block_number());
                    next.confirmations = 1;
                }
            }
            ReceiptStatus::Processing => {
                next.confirmations = receipt.confirmations.saturating_add(1);
                if next.confirmations >= CONFIRMATION_THRESHOLD {
                    next.status = ReceiptStatus::Confirmed;
                }
            }
            ReceiptStatus::Confirmed => {
                if receipt.confirmations < MAX_CONFIRMATIONS {
                    next.confirmations = receipt.confirmations + 1;
                }
            }
        }
        next
    }

    fn random_block_number(&mut self) -> u64 {
        BLOCK_NUMBER_BASE + self.rng.gen_range(0..BLOCK_NUMBER_SPAN)
    }

    fn random_hex(&mut self, len: usize) -> String {
        let mut bytes = vec![0u8; len];
        self.rng.fill_bytes(&mut bytes);
        format!("0x{}", hex::encode(bytes))
    }
}
