use chrono::Duration;
use log::*;
use settlement_engine::{SweepEntry, SweepResult};
use tokio::task::JoinHandle;

use crate::server::MarketplaceApi;

/// Starts the capture sweep worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, authorized card payments on orders that were handed over at least `older_than` ago are captured.
/// This is the same sweep `POST /orders/auto-capture-payments` runs, so an external scheduler and this worker can both
/// be active.
pub fn start_sweep_worker(api: MarketplaceApi, interval: std::time::Duration, older_than: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Capture sweep worker started. Running every {} s", interval.as_secs());
        loop {
            timer.tick().await;
            info!("🕰️ Running capture sweep");
            match api.sweep(older_than).await {
                Ok(entries) => {
                    info!("🕰️ {} orders swept", entries.len());
                    debug!("🕰️ Sweep results: {}", summary(&entries));
                },
                Err(e) => {
                    error!("🕰️ Error running capture sweep: {e}");
                },
            }
        }
    })
}

fn summary(entries: &[SweepEntry]) -> String {
    entries
        .iter()
        .map(|e| {
            let result = match &e.result {
                SweepResult::Captured => "captured".to_string(),
                SweepResult::AlreadyCaptured => "already captured".to_string(),
                SweepResult::InProgress => "in progress".to_string(),
                SweepResult::HoldExpired => "hold expired".to_string(),
                SweepResult::Failed { reason } => format!("failed ({reason})"),
            };
            format!("[{}] {result}", e.order_id)
        })
        .collect::<Vec<String>>()
        .join(", ")
}
