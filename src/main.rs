use clap::{Args, Parser, Subcommand};
use finerecon::application::engine::{InitiateRequest, ReconciliationEngine};
use finerecon::application::resolver::ResolutionHints;
use finerecon::config::EngineConfig;
use finerecon::domain::payment::{Payer, PaymentId};
use finerecon::domain::ports::{StoreHandle, ViolationStore};
use finerecon::gateway::{
    Gateway, GatewayKind, GatewayRegistry, HostedCheckoutConfig, HostedCheckoutGateway,
    SandboxBehavior, SandboxGateway,
};
use finerecon::infrastructure::in_memory::InMemoryStore;
use finerecon::interfaces::csv::violation_reader::ViolationReader;
use miette::{IntoDiagnostic, Result, miette};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Violations CSV file used to seed the store
    #[arg(long)]
    violations: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Currency every fine is charged in
    #[arg(long, default_value = "EUR")]
    currency: String,

    /// One-time late penalty as a fraction of the base fine
    #[arg(long, default_value = "0.10")]
    late_penalty_rate: Decimal,

    /// Timeout for each gateway call, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    gateway_timeout_ms: u64,

    /// Sandbox gateway behaviour: settle, redirect, decline, reject, unreachable
    #[arg(long, default_value = "settle")]
    sandbox_behavior: String,

    /// Base URL of the hosted checkout provider; enables that gateway
    #[arg(long, env = "HOSTED_CHECKOUT_URL")]
    hosted_checkout_url: Option<String>,

    #[arg(long, env = "HOSTED_CHECKOUT_API_KEY", default_value = "")]
    hosted_checkout_api_key: String,

    #[arg(long, default_value = "/payments/return")]
    hosted_checkout_return_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ViolationArgs {
    /// Internal violation identifier
    #[arg(long)]
    violation_id: Option<String>,

    /// Human-facing reference number, as typed
    #[arg(long)]
    reference: Option<String>,

    /// Driver name used for best-effort matching
    #[arg(long)]
    driver_name: Option<String>,
}

impl From<ViolationArgs> for ResolutionHints {
    fn from(args: ViolationArgs) -> Self {
        ResolutionHints {
            violation_id: args.violation_id,
            reference: args.reference,
            driver_name: args.driver_name,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Start a payment for a violation
    Initiate {
        #[command(flatten)]
        violation: ViolationArgs,
        #[arg(long)]
        payer_name: String,
        #[arg(long)]
        payer_email: String,
        #[arg(long)]
        payer_phone: Option<String>,
        #[arg(long, default_value = "sandbox")]
        gateway: GatewayKind,
        /// Amount the payer expects to pay (informational only)
        #[arg(long)]
        claimed_amount: Option<Decimal>,
    },
    /// Verify a redirect-based payment with its gateway
    Confirm {
        #[arg(long)]
        payment_id: Uuid,
        #[arg(long)]
        transaction_id: String,
    },
    /// Show the amount currently owed
    Quote {
        #[command(flatten)]
        violation: ViolationArgs,
    },
}

#[derive(Serialize)]
struct QuoteOutput {
    violation_id: String,
    reference: String,
    status: String,
    amount: Decimal,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<StoreHandle> {
    use finerecon::infrastructure::rocksdb::RocksDBStore;

    let store: StoreHandle = match db_path {
        Some(path) => Arc::new(RocksDBStore::open(path).into_diagnostic()?),
        None => Arc::new(InMemoryStore::new()),
    };
    Ok(store)
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<StoreHandle> {
    if db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryStore::new()))
}

fn build_gateways(cli: &Cli, config: &EngineConfig) -> Result<GatewayRegistry> {
    let behavior = SandboxBehavior::parse(&cli.sandbox_behavior)
        .ok_or_else(|| miette!("unknown sandbox behavior '{}'", cli.sandbox_behavior))?;
    let mut registry = GatewayRegistry::new(config.gateway_timeout)
        .with(Gateway::Sandbox(SandboxGateway::new(behavior)));

    if let Some(base_url) = &cli.hosted_checkout_url {
        let hosted = HostedCheckoutGateway::new(HostedCheckoutConfig {
            base_url: base_url.clone(),
            api_key: cli.hosted_checkout_api_key.clone(),
            return_url: cli.hosted_checkout_return_url.clone(),
            timeout: config.gateway_timeout,
        })
        .into_diagnostic()?;
        registry = registry.with(Gateway::HostedCheckout(hosted));
    }
    Ok(registry)
}

async fn seed_violations(store: &StoreHandle, path: PathBuf) -> Result<()> {
    let file = File::open(path).into_diagnostic()?;
    let mut seeded = 0usize;
    for record in ViolationReader::new(file).violations() {
        match record {
            Ok(violation) => {
                let reference = violation.reference.clone();
                match store.insert_violation(violation).await {
                    Ok(()) => seeded += 1,
                    Err(e) => warn!(%reference, "Skipping violation: {e}"),
                }
            }
            Err(e) => warn!("Error reading violation: {e}"),
        }
    }
    info!(seeded, "violations loaded");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = EngineConfig {
        currency: cli.currency.to_ascii_uppercase(),
        ..EngineConfig::default()
    }
    .with_late_penalty_rate(cli.late_penalty_rate)
    .with_gateway_timeout(Duration::from_millis(cli.gateway_timeout_ms));

    let gateways = build_gateways(&cli, &config)?;
    let store = open_store(cli.db_path.clone())?;
    if let Some(path) = cli.violations.clone() {
        seed_violations(&store, path).await?;
    }

    let engine = ReconciliationEngine::new(store, gateways, config);

    match cli.command {
        Command::Initiate {
            violation,
            payer_name,
            payer_email,
            payer_phone,
            gateway,
            claimed_amount,
        } => {
            let outcome = engine
                .initiate(InitiateRequest {
                    hints: violation.into(),
                    payer: Payer {
                        name: payer_name,
                        email: payer_email,
                        phone: payer_phone,
                    },
                    gateway,
                    claimed_amount,
                })
                .await
                .into_diagnostic()?;
            print_json(&outcome)
        }
        Command::Confirm {
            payment_id,
            transaction_id,
        } => {
            let outcome = engine
                .confirm(PaymentId(payment_id), &transaction_id)
                .await
                .into_diagnostic()?;
            print_json(&outcome)
        }
        Command::Quote { violation } => {
            let (violation, amount) = engine.quote(&violation.into()).await.into_diagnostic()?;
            print_json(&QuoteOutput {
                violation_id: violation.id.to_string(),
                reference: violation.reference,
                status: violation.status.to_string(),
                amount: amount.value(),
            })
        }
    }
}
