//! Background task committing periodic vault snapshots.

use crate::context::SyncContext;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

/// Spawns the periodic snapshotter.
///
/// The loop commits on a fixed interval and stops when the shutdown channel
/// flips; an in-flight commit is allowed to finish because the signal is
/// only observed between ticks.
pub(crate) fn spawn_snapshotter(
    ctx: Arc<SyncContext>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let period = ctx.config.snapshot_interval;

    tokio::spawn(async move {
        info!(interval_secs = period.as_secs(), "periodic snapshotter started");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so the first
        // snapshot lands one full interval after startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => ctx.snapshot("periodic vault snapshot").await,
                _ = shutdown.changed() => {
                    info!("periodic snapshotter stopped");
                    break;
                }
            }
        }
    })
}
