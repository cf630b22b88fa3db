#![allow(clippy::result_large_err)]

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::path::PathBuf;
use swagstore::{
    config::{self, StorageBackend, database},
    core::{
        Ledger, ReconcileMode, RewardPolicy, TenantLifecycle, TenantStatus,
        rewards::format_swagbucks,
    },
    errors::Result,
    store::{DocumentTenantStore, ListTenantStore, SqlListQueue, TenantStore},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Maintenance commands for the storefront's tenant and SwagBucks stores.
#[derive(Parser)]
#[command(name = "swagstore", version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, env = "SWAGSTORE_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create any missing tables
    InitDb,
    /// Compare stored balances with their transaction logs
    Reconcile {
        /// Only check this tenant
        #[arg(long)]
        tenant: Option<String>,
        /// Rewrite drifted balances from the log
        #[arg(long)]
        repair: bool,
    },
    /// Replay interrupted list-store transitions and drop duplicate entries
    RecoverLists,
    /// Show a tenant's balance and latest transactions
    Balance {
        /// Tenant id
        tenant: String,
        /// Number of transactions to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List tenants in a status (pending, active, declined). Never writes; run
    /// `recover-lists` first if a list-store transition was interrupted
    Tenants {
        /// Status to list
        #[arg(long, default_value = "pending")]
        status: TenantStatus,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, env vars can also be set externally
    dotenv().ok();

    let cli = Cli::parse();

    // 3. Load the application configuration
    let app_config = config::settings::load_app_configuration(&cli.config)
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Connect and make sure the schema exists
    let db = database::create_connection(&app_config.database)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database schema ready."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    let ledger = Ledger::new(db.clone(), RewardPolicy::from_config(&app_config.swagbucks));

    match cli.command {
        Command::InitDb => {}
        Command::Reconcile { tenant, repair } => {
            let mode = if repair {
                ReconcileMode::Repair
            } else {
                ReconcileMode::ReportOnly
            };
            let reports = match tenant {
                Some(tenant_id) => vec![ledger.reconcile(&tenant_id, mode).await?],
                None => ledger.reconcile_all(mode).await?,
            };

            let drifted = reports.iter().filter(|r| !r.is_consistent()).count();
            for report in reports.iter().filter(|r| !r.is_consistent()) {
                println!(
                    "{}: stored {} / computed {}{}",
                    report.tenant_id,
                    report.stored.balance,
                    report.computed.balance,
                    if report.repaired { " (repaired)" } else { "" }
                );
            }
            println!("{} ledgers checked, {drifted} drifted", reports.len());
        }
        Command::RecoverLists => {
            let store = ListTenantStore::new(SqlListQueue::new(db));
            let report = store.recover().await?;
            println!("{report:?}");
        }
        Command::Balance { tenant, limit } => {
            let balance = ledger.get_balance(&tenant).await?;
            println!(
                "{}: {} (earned {}, redeemed {}){}",
                balance.tenant_id,
                format_swagbucks(balance.balance),
                format_swagbucks(balance.total_earned),
                format_swagbucks(balance.total_redeemed),
                if balance.archived { " [archived]" } else { "" }
            );
            for entry in ledger.transactions(&tenant).await?.into_iter().take(limit) {
                println!(
                    "  {} {:>10} {:>6}  {}",
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.transaction_type,
                    entry.amount,
                    entry.description
                );
            }
        }
        Command::Tenants { status } => match app_config.tenants.backend {
            StorageBackend::Document => {
                let lifecycle = TenantLifecycle::new(DocumentTenantStore::new(db), ledger);
                print_tenants(&lifecycle, status).await?;
            }
            StorageBackend::List => {
                let store = ListTenantStore::new(SqlListQueue::new(db));
                let lifecycle = TenantLifecycle::new(store, ledger);
                print_tenants(&lifecycle, status).await?;
            }
        },
    }

    Ok(())
}

async fn print_tenants<S: TenantStore>(
    lifecycle: &TenantLifecycle<S>,
    status: TenantStatus,
) -> Result<()> {
    let tenants = lifecycle.list(status).await?;
    for tenant in &tenants {
        println!(
            "{}  {:<24} {:<20} {}",
            tenant.id, tenant.store_name, tenant.subdomain, tenant.contact_email
        );
    }
    println!("{} {status} tenants", tenants.len());
    Ok(())
}
