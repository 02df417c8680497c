//! Serialized polling tick
//!
//! One recurring task drives the broadcast path: fetch → merge → diff →
//! broadcast runs to completion, then the next run is scheduled. Ticks
//! never overlap, so broadcasts stay ordered and duplicate-free. The
//! loop swallows all failures (they are already contained inside the
//! merge pipeline) and stops only when the shutdown channel fires.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::WsBroadcaster;
use crate::broadcast::DiffBroadcaster;
use crate::service::AggregatorService;

/// Spawn the polling loop. The returned handle completes after a
/// shutdown signal, once the in-flight tick has finished.
pub fn spawn_poller(
    service: Arc<AggregatorService>,
    ws: WsBroadcaster,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        // The broadcaster and its snapshot live inside the task: only the
        // serialized tick ever touches them.
        let mut broadcaster = DiffBroadcaster::new();
        info!(interval_ms = interval.as_millis() as u64, "Polling scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            run_tick(&service, &ws, &mut broadcaster).await;

            // Next run is scheduled only after the tick fully completed.
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Polling scheduler stopped");
    })
}

async fn run_tick(
    service: &AggregatorService,
    ws: &WsBroadcaster,
    broadcaster: &mut DiffBroadcaster,
) {
    let report = service.refresh_listing().await;
    let updates = broadcaster.apply(&report.tokens);

    debug!(
        merged = report.tokens.len(),
        updates = updates.len(),
        snapshot = broadcaster.snapshot_len(),
        "Polling tick complete"
    );

    for update in updates {
        ws.broadcast_update(update);
    }
}
