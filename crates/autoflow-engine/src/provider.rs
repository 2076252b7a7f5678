//! Wallet provider abstraction.
//!
//! The engine treats the wallet-as-a-service provider as an opaque remote
//! collaborator: it hands out an address at connect time and can be asked
//! for a balance. [`SimulatedProvider`] is the in-process stand-in used by
//! the demo and the tests.

use std::future::Future;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rust_decimal::Decimal;

use autoflow_core::ProviderError;

/// Result of creating a wallet for an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedWallet {
    pub address: String,
}

/// Balance reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderBalance {
    pub amount: Decimal,
}

/// Minimal contract the engine needs from a wallet provider.
pub trait WalletProvider: Send + Sync + 'static {
    fn create_wallet(
        &self,
        identity: &str,
    ) -> impl Future<Output = Result<CreatedWallet, ProviderError>> + Send;

    fn fetch_balance(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<ProviderBalance, ProviderError>> + Send;
}

/// In-process provider handing out random addresses and a fixed balance.
pub struct SimulatedProvider {
    rng: Mutex<StdRng>,
    balance: Decimal,
    create_failure: Option<ProviderError>,
    fetch_failure: Option<ProviderError>,
}

impl SimulatedProvider {
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            balance: Decimal::ZERO,
            create_failure: None,
            fetch_failure: None,
        }
    }

    /// Balance every `fetch_balance` call reports.
    #[must_use]
    pub fn with_balance(mut self, amount: Decimal) -> Self {
        self.balance = amount;
        self
    }

    /// Makes every `create_wallet` call fail with the given error.
    #[must_use]
    pub fn failing_create(mut self, error: ProviderError) -> Self {
        self.create_failure = Some(error);
        self
    }

    /// Makes every `fetch_balance` call fail with the given error.
    #[must_use]
    pub fn failing_fetch(mut self, error: ProviderError) -> Self {
        self.fetch_failure = Some(error);
        self
    }
}

impl WalletProvider for SimulatedProvider {
    async fn create_wallet(&self, identity: &str) -> Result<CreatedWallet, ProviderError> {
        if let Some(failure) = &self.create_failure {
            return Err(failure.clone());
        }
        let mut bytes = [0u8; 20];
        {
            let mut rng = self.rng.lock().expect("provider rng poisoned");
            rng.fill_bytes(&mut bytes);
        }
        let address = format!("0x{}", hex::encode(bytes));
        tracing::debug!(%identity, %address, "simulated wallet created");
        Ok(CreatedWallet { address })
    }

    async fn fetch_balance(&self, _address: &str) -> Result<ProviderBalance, ProviderError> {
        if let Some(failure) = &self.fetch_failure {
            return Err(failure.clone());
        }
        Ok(ProviderBalance {
            amount: self.balance,
        })
    }
}
