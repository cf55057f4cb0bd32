use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::task::JoinError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use voucher_service::api;
use voucher_service::config::ServiceConfig;
use voucher_service::connector::local::LocalConnector;
use voucher_service::identity::{generate_seed_hex, SigningIdentity};
use voucher_service::manager::VoucherManager;
use voucher_service::types::UNITS_PER_VARA;

/// Balance credited to the voucher account under the local backend.
const LOCAL_DEV_BALANCE: u128 = 1_000_000 * UNITS_PER_VARA;

#[derive(Parser)]
#[command(author, version, about = "Gasless voucher issuing service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the service using the provided configuration file
    Start {
        #[arg(short, long, default_value = "config/service.toml")]
        config: PathBuf,
    },
    /// Generate a default configuration file
    GenerateConfig {
        #[arg(short, long, default_value = "config/service.toml")]
        path: PathBuf,
    },
    /// Generate a fresh signing seed and print it to stdout
    Keygen,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config } => start_service(config).await?,
        Commands::GenerateConfig { path } => generate_config(path)?,
        Commands::Keygen => keygen()?,
    }

    Ok(())
}

async fn start_service(config_path: PathBuf) -> Result<()> {
    let config = if config_path.exists() {
        ServiceConfig::load(&config_path)?
    } else {
        let config = ServiceConfig::default();
        config.save(&config_path)?;
        config
    };

    let seed = config.resolve_seed()?;
    let identity = SigningIdentity::from_seed_hex(&seed)?;
    info!(address = %identity.address(), program = %config.program_id, "voucher account loaded");

    let connector = Arc::new(LocalConnector::new());
    connector.fund(identity.address(), LOCAL_DEV_BALANCE);
    warn!(
        endpoint = %config.node_endpoint,
        "using the in-memory local chain backend; the configured node endpoint is not dialed"
    );

    let manager = Arc::new(VoucherManager::new(
        connector,
        identity,
        config.program_id,
        config.inclusion_timeout(),
    ));

    let listen = config.listen;
    let api_task = tokio::spawn(async move { api::serve(manager, listen).await });

    let result = tokio::select! {
        res = api_task => handle_join(res),
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
            Ok(())
        }
    };

    result?;
    Ok(())
}

fn generate_config(path: PathBuf) -> Result<()> {
    let config = ServiceConfig::default();
    config.save(&path)?;
    info!(?path, "wrote default configuration");
    Ok(())
}

fn keygen() -> Result<()> {
    let seed = generate_seed_hex();
    let identity = SigningIdentity::from_seed_hex(&seed)?;
    info!(address = %identity.address(), "generated voucher account seed");
    println!("{seed}");
    Ok(())
}

fn handle_join(
    result: Result<voucher_service::errors::VoucherResult<()>, JoinError>,
) -> Result<()> {
    let inner = result?;
    inner?;
    Ok(())
}
