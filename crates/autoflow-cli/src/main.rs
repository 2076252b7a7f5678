use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use autoflow_core::{AuthProvider, EngineError, LedgerEntry, Session};
use autoflow_engine::{
    BalanceSnapshot, EngineConfig, EngineConfigOverrides, LedgerView, ObservabilitySnapshot,
    SessionEngine, SimulatedProvider, YieldAccrual, YieldProjection, YieldSummary,
};

#[derive(Parser)]
#[command(name = "autoflow", version, about = "Drive the AutoFlow wallet simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted demo session and print the resulting state as JSON.
    Demo(DemoArgs),
    /// Print yield projections for a principal without starting a session.
    Projection(ProjectionArgs),
}

#[derive(Args, Debug)]
struct DemoArgs {
    /// Optional TOML file with engine configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Authentication flow to simulate.
    #[arg(long, value_enum, default_value_t = ProviderArg::Custodial)]
    provider: ProviderArg,
    /// Identity handed to the wallet provider at connect.
    #[arg(long, default_value = "demo@example.com")]
    identity: String,
    /// Seed for all random sources; repeat runs reproduce byte-identical
    /// hashes and outcomes.
    #[arg(long)]
    seed: Option<u64>,
    /// Skip the simulated per-command latency.
    #[arg(long)]
    fast: bool,
    /// Limit on ledger entries included in the report.
    #[arg(long, default_value_t = 25)]
    limit: usize,
}

#[derive(Args, Debug)]
struct ProjectionArgs {
    /// Principal the projection is computed against.
    #[arg(long, default_value = "789.23")]
    principal: Decimal,
    /// Simple annual interest rate, e.g. 0.052 for 5.2%.
    #[arg(long, default_value = "0.052")]
    rate: Decimal,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    Custodial,
    ExternalSigner,
}

impl From<ProviderArg> for AuthProvider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Custodial => Self::Custodial,
            ProviderArg::ExternalSigner => Self::ExternalSigner,
        }
    }
}

#[derive(Serialize)]
struct DemoReport {
    session: Session,
    display_balance: Decimal,
    balances: BalanceSnapshot,
    yield_summary: YieldSummary,
    spend_outcome: String,
    ledger: LedgerView,
    recent_entries: Vec<LedgerEntry>,
    observability: ObservabilitySnapshot,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Demo(args) => run_demo(args).await,
        Commands::Projection(args) => run_projection(args),
    }
}

fn init_tracing() {
    let subscriber = tracing_subscriber::fmt().with_env_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );
    let _ = subscriber.try_init();
}

/// Connects a session, walks it through the common money movements, then
/// prints a JSON snapshot of everything the engine tracks.
async fn run_demo(args: DemoArgs) -> Result<()> {
    let overrides = EngineConfigOverrides {
        op_delay: args.fast.then_some(std::time::Duration::ZERO),
        rng_seed: args.seed,
        ..EngineConfigOverrides::default()
    };
    let config = EngineConfig::from_sources(args.config, overrides).await?;

    let provider = match args.seed {
        Some(seed) => SimulatedProvider::seeded(seed),
        None => SimulatedProvider::from_entropy(),
    };
    let engine = SessionEngine::new(provider, config);

    let auth_provider = AuthProvider::from(args.provider);
    let session = engine
        .connect(auth_provider, &args.identity)
        .await
        .context("connecting demo session")?;
    tracing::info!(address = %session.user_address, "demo session connected");

    engine.deposit(dec!(125.50), "USDC").await?;
    if engine.card_info().await?.is_none() {
        engine.link_card("4821").await?;
    }
    engine.transfer_to_card(dec!(80.00)).await?;

    // Card approval is a probability draw, so a decline is a legitimate
    // demo outcome rather than a failure.
    let spend_outcome = match engine.spend_from_card(dec!(19.99)).await {
        Ok(entry) => format!("approved ({})", entry.receipt.tx_hash),
        Err(EngineError::Declined) => "declined".to_owned(),
        Err(err) => return Err(err.into()),
    };

    // Step the simulation a few intervals instead of waiting on the
    // background timers.
    engine.tick_yield().await;
    engine.tick_yield().await;
    engine.tick_receipts().await;
    let daily = engine.yield_summary().await?.projection.daily;
    if daily > Decimal::ZERO {
        engine.collect_yield_to_card(daily).await?;
    }

    let report = DemoReport {
        display_balance: engine.display_balance().await?,
        balances: engine.balances().await?,
        yield_summary: engine.yield_summary().await?,
        spend_outcome,
        ledger: engine.ledger_view(args.limit).await?,
        recent_entries: engine.ledger_entries(5).await?,
        observability: engine.observability(),
        session,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    engine.disconnect().await?;
    Ok(())
}

fn run_projection(args: ProjectionArgs) -> Result<()> {
    let accrual = YieldAccrual::new(args.principal, args.rate);
    let projection: YieldProjection = accrual.projection();
    println!("{}", serde_json::to_string_pretty(&projection)?);
    Ok(())
}
