//! Background refresh of the cached standings.
//!
//! Keeps `stock:current` warm while the market is open so dashboard reads
//! rarely wait on the upstream provider.

use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::main_lib::AppState;
use leaderboard_core::leaderboard::RefreshSummary;

/// Initial delay before the first check, to let the server finish starting.
const INITIAL_DELAY_SECS: u64 = 30;

/// Starts the background refresh loop.
pub fn start_refresh_scheduler(state: Arc<AppState>, every: Duration) {
    tokio::spawn(async move {
        info!("Refresh scheduler started ({}s interval)", every.as_secs());
        tokio::time::sleep(Duration::from_secs(INITIAL_DELAY_SECS)).await;

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            run_scheduled_refresh(&state).await;
        }
    });
}

/// Runs a single scheduled refresh when the cached standings need it.
pub async fn run_scheduled_refresh(state: &AppState) -> Option<RefreshSummary> {
    if !state.leaderboard_service.needs_refresh().await {
        debug!("Scheduled refresh skipped: market closed or cache fresh");
        return None;
    }

    let summary = state.leaderboard_service.refresh_current().await;
    match &summary {
        RefreshSummary::Refreshed { records } => {
            info!("Scheduled refresh stored {} records", records)
        }
        RefreshSummary::Skipped => debug!("Scheduled refresh skipped"),
        RefreshSummary::Failed { reason } => warn!("Scheduled refresh failed: {}", reason),
    }
    Some(summary)
}
