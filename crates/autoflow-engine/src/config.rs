//! Engine configuration.
//!
//! Defaults mirror the demo product behaviour; every tunable can be
//! overridden from an optional TOML file and from programmatic overrides
//! (file wins over defaults, overrides win over the file).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tokio::fs;

/// Runtime configuration for a [`SessionEngine`](crate::SessionEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wallet balance a fresh session starts with.
    pub seed_wallet_balance: Decimal,
    /// Card balance a fresh session starts with.
    pub seed_card_balance: Decimal,
    /// Display floor used when the provider reports a zero balance. A
    /// product presentation rule, never a ledger rule.
    pub display_floor: Decimal,
    /// Fixed demo principal the yield accrual is computed against.
    pub principal: Decimal,
    /// Simple annual interest rate, e.g. 0.052 for 5.2%.
    pub annual_rate: Decimal,
    /// Wall-clock period between automatic yield postings.
    pub accrual_interval: Duration,
    /// Wall-clock period between receipt lifecycle advances.
    pub receipt_interval: Duration,
    /// Artificial latency applied to each mutating command.
    pub op_delay: Duration,
    /// Whether connect seeds the ledger with sample history.
    pub seed_history: bool,
    /// Probability that an external-signer connect arrives with a card
    /// already linked.
    pub card_prelink_probability: f64,
    /// Probability that the simulated card network approves a spend.
    pub spend_approval_probability: f64,
    /// Seed for every random source in the session; `None` draws from OS
    /// entropy.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed_wallet_balance: dec!(400.00),
            seed_card_balance: Decimal::ZERO,
            display_floor: dec!(400.00),
            principal: dec!(789.23),
            annual_rate: dec!(0.052),
            accrual_interval: Duration::from_secs(60),
            receipt_interval: Duration::from_secs(15),
            op_delay: Duration::from_millis(1500),
            seed_history: true,
            card_prelink_probability: 0.7,
            spend_approval_probability: 0.9,
            rng_seed: None,
        }
    }
}

/// Programmatic overrides applied on top of defaults and file values.
#[derive(Debug, Default, Clone)]
pub struct EngineConfigOverrides {
    pub seed_wallet_balance: Option<Decimal>,
    pub op_delay: Option<Duration>,
    pub seed_history: Option<bool>,
    pub rng_seed: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    seed_wallet_balance: Option<Decimal>,
    seed_card_balance: Option<Decimal>,
    display_floor: Option<Decimal>,
    principal: Option<Decimal>,
    annual_rate: Option<Decimal>,
    #[serde(default, with = "humantime_serde")]
    accrual_interval: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    receipt_interval: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    op_delay: Option<Duration>,
    seed_history: Option<bool>,
    card_prelink_probability: Option<f64>,
    spend_approval_probability: Option<f64>,
    rng_seed: Option<u64>,
}

impl EngineConfig {
    /// Resolves a configuration from defaults, an optional TOML file, and
    /// overrides.
    pub async fn from_sources(
        config_path: Option<PathBuf>,
        overrides: EngineConfigOverrides,
    ) -> Result<Self> {
        let file_cfg = if let Some(path) = config_path.as_ref() {
            let contents = fs::read_to_string(path)
                .await
                .with_context(|| format!("reading engine configuration from {}", path.display()))?;
            parse_config(&contents, path)?
        } else {
            FileConfig::default()
        };

        let defaults = Self::default();
        let config = Self {
            seed_wallet_balance: overrides
                .seed_wallet_balance
                .or(file_cfg.seed_wallet_balance)
                .unwrap_or(defaults.seed_wallet_balance),
            seed_card_balance: file_cfg
                .seed_card_balance
                .unwrap_or(defaults.seed_card_balance),
            display_floor: file_cfg.display_floor.unwrap_or(defaults.display_floor),
            principal: file_cfg.principal.unwrap_or(defaults.principal),
            annual_rate: file_cfg.annual_rate.unwrap_or(defaults.annual_rate),
            accrual_interval: file_cfg
                .accrual_interval
                .unwrap_or(defaults.accrual_interval),
            receipt_interval: file_cfg
                .receipt_interval
                .unwrap_or(defaults.receipt_interval),
            op_delay: overrides
                .op_delay
                .or(file_cfg.op_delay)
                .unwrap_or(defaults.op_delay),
            seed_history: overrides
                .seed_history
                .or(file_cfg.seed_history)
                .unwrap_or(defaults.seed_history),
            card_prelink_probability: file_cfg
                .card_prelink_probability
                .unwrap_or(defaults.card_prelink_probability),
            spend_approval_probability: file_cfg
                .spend_approval_probability
                .unwrap_or(defaults.spend_approval_probability),
            rng_seed: overrides.rng_seed.or(file_cfg.rng_seed),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.seed_wallet_balance >= Decimal::ZERO,
            "seed_wallet_balance must not be negative"
        );
        ensure!(
            self.seed_card_balance >= Decimal::ZERO,
            "seed_card_balance must not be negative"
        );
        ensure!(
            self.annual_rate >= Decimal::ZERO,
            "annual_rate must not be negative"
        );
        ensure!(
            !self.accrual_interval.is_zero(),
            "accrual_interval must be positive"
        );
        ensure!(
            !self.receipt_interval.is_zero(),
            "receipt_interval must be positive"
        );
        for (name, p) in [
            ("card_prelink_probability", self.card_prelink_probability),
            ("spend_approval_probability", self.spend_approval_probability),
        ] {
            ensure!((0.0..=1.0).contains(&p), "{name} must be within [0, 1]");
        }
        Ok(())
    }
}

fn parse_config(contents: &str, path: &Path) -> Result<FileConfig> {
    let deserializer = toml::Deserializer::new(contents);
    let parsed = serde_path_to_error::deserialize(deserializer)
        .with_context(|| format!("parsing engine configuration at {}", path.display()))?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal_macros::dec;

    use super::{parse_config, EngineConfig};

    #[test]
    fn defaults_match_demo_product_behaviour() {
        let config = EngineConfig::default();
        assert_eq!(config.seed_wallet_balance, dec!(400.00));
        assert_eq!(config.principal, dec!(789.23));
        assert_eq!(config.annual_rate, dec!(0.052));
        assert_eq!(config.accrual_interval, Duration::from_secs(60));
        assert_eq!(config.receipt_interval, Duration::from_secs(15));
        config.validate().expect("defaults validate");
    }

    #[test]
    fn file_values_parse_with_humantime_durations() {
        let parsed = parse_config(
            "seed_wallet_balance = 250.0\nreceipt_interval = \"5s\"\nrng_seed = 42\n",
            std::path::Path::new("test.toml"),
        )
        .expect("parse");
        assert_eq!(parsed.seed_wallet_balance, Some(dec!(250.0)));
        assert_eq!(parsed.receipt_interval, Some(Duration::from_secs(5)));
        assert_eq!(parsed.rng_seed, Some(42));
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        let config = EngineConfig {
            spend_approval_probability: 1.5,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
