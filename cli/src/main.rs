use anyhow::{anyhow, Context};
use chrono::Utc;
use clap::Parser;
use owo_colors::OwoColorize;
use points_api::{start_server, ApiState};
use points_cli::config::{NodeConfig, DATA_DIR_ENV};
use points_cli::snapshots::{run_snapshot_loop, save_now};
use points_economy::{Economy, StaticTokenIdentity};
use points_storage::Storage;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pointsd")]
#[command(about = "Points economy node", version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "pointsd.toml")]
    config: PathBuf,

    /// Override the listen address
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Override the snapshot directory
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,
}

fn print_banner(config: &NodeConfig) {
    println!("{}", "Points Economy Node v0.1.0".cyan().bold());
    println!("{}", "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━".bright_black());
    println!("{}: {}", "Listen".yellow().bold(), config.server.bind);
    println!(
        "{}: {}",
        "Data dir".yellow().bold(),
        config.storage.data_dir.display()
    );
    println!(
        "{}: {:?}",
        "Fingerprint policy".yellow().bold(),
        config.economy.fingerprint_policy
    );
    println!(
        "{}: {}",
        "Static tokens".yellow().bold(),
        config.identity.tokens.len()
    );
    println!();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = NodeConfig::load(&cli.config)?;
    config.apply_overrides(cli.bind, cli.data_dir, std::env::var(DATA_DIR_ENV).ok());
    print_banner(&config);

    let storage = Arc::new(
        Storage::open(&config.storage.data_dir)
            .with_context(|| format!("opening {}", config.storage.data_dir.display()))?,
    );
    let economy = match storage.load_economy()? {
        Some(snapshot) => Economy::restore(config.economy.clone(), snapshot)?,
        None => {
            info!("No snapshot found, starting with an empty economy");
            Economy::new(config.economy.clone())?
        }
    };
    let economy = Arc::new(economy);
    println!(
        "{} {} accounts loaded",
        "✓".green(),
        economy.ledger().len()
    );

    let identity = StaticTokenIdentity::new(config.identity.tokens.clone());
    if identity.is_empty() {
        warn!("No identity tokens configured; every request will be rejected");
    }
    let state = ApiState::new(economy.clone(), Arc::new(identity));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let snapshot_task = match config.storage.snapshot_interval_secs {
        0 => None,
        secs => Some(tokio::spawn(run_snapshot_loop(
            storage.clone(),
            economy.clone(),
            Duration::from_secs(secs),
            shutdown_rx,
        ))),
    };

    println!("{}", "✓ API server starting".green());
    start_server(config.server.bind, state, shutdown_signal())
        .await
        .map_err(|e| anyhow!(e))?;

    let _ = shutdown_tx.send(true);
    if let Some(task) = snapshot_task {
        task.await?;
    }
    save_now(storage, economy).await?;
    println!("{}", "✓ Final snapshot written".green());
    Ok(())
}
