//! Periodic economy snapshots

use chrono::Utc;
use points_economy::Economy;
use points_storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error};

/// Write one snapshot off the async runtime
pub async fn save_now(storage: Arc<Storage>, economy: Arc<Economy>) -> anyhow::Result<()> {
    tokio::task::spawn_blocking(move || {
        let snapshot = economy.snapshot(Utc::now());
        storage.save_economy(&snapshot)
    })
    .await??;
    Ok(())
}

/// Save every `every` until `shutdown` flips to true
pub async fn run_snapshot_loop(
    storage: Arc<Storage>,
    economy: Arc<Economy>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = save_now(storage.clone(), economy.clone()).await {
                    error!(error = %e, "Periodic snapshot failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("Snapshot loop stopping");
                    break;
                }
            }
        }
    }
}
