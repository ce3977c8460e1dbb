//! services/api/src/web/duty_task.rs
//!
//! The background task that forces over-long shifts off duty. It runs for the
//! life of the server, independent of any connected client.

use chrono::Utc;
use driverroom_core::DispatchBoard;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Sweeps stale shifts every `every` until `token` is cancelled.
pub async fn duty_sweep_process(board: DispatchBoard, every: Duration, token: CancellationToken) {
    info!(
        "Auto off-duty sweep every {:?} for shifts longer than {} minutes",
        every,
        board.off_duty_after().num_minutes()
    );
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match board.sweep_stale(Utc::now()).await {
            Ok(report) if report.stale > 0 => info!(
                "Auto off-duty sweep: {} stale, {} cleared, {} failed",
                report.stale, report.cleared, report.failed
            ),
            Ok(_) => {}
            Err(e) => error!("Auto off-duty sweep could not load the roster: {:?}", e),
        }
    }
    info!("Auto off-duty sweep stopped.");
}
