//! Long-running service loop around the cycle controller.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::cycle::CycleController;
use crate::hours;

/// Runs cycles forever at a fixed interval. Cycle errors are logged and
/// absorbed; nothing short of process termination stops the loop.
pub async fn run(
    controller: Arc<CycleController>,
    interval_secs: u64,
    enforce_market_hours: bool,
) -> ! {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(interval_secs, enforce_market_hours, "Service loop started");

    loop {
        interval.tick().await;

        if enforce_market_hours && !hours::is_market_open(Utc::now()) {
            debug!("Market closed, skipping cycle");
            continue;
        }

        match controller.run_cycle().await {
            Ok(summary) => info!(
                ideas = summary.ideas,
                validated = summary.validated,
                approved = summary.approved,
                positions_opened = summary.positions_opened,
                refreshed = summary.sweep.refreshed,
                closed = summary.sweep.closed,
                skipped = summary.sweep.skipped,
                "Cycle complete"
            ),
            Err(e) => error!(error = %e, "Cycle failed, continuing"),
        }
    }
}
