use std::time::Duration;

use tracing::{info, warn};

use crate::repo::{producer_state, streams};
use crate::state::AppState;

/// Runs `sweepExpired` (§4.8) on a fixed interval for the lifetime of the
/// process. Intended to be spawned once from `main`.
pub async fn run(state: AppState, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match streams::sweep_expired(&state.pool).await {
            Ok(purged) if purged > 0 => info!(purged, "swept expired streams"),
            Ok(_) => {}
            Err(err) => warn!(%err, "stream sweep failed"),
        }
        match producer_state::sweep_expired(&state.pool).await {
            Ok(evicted) if evicted > 0 => info!(evicted, "swept idle producer state"),
            Ok(_) => {}
            Err(err) => warn!(%err, "producer-state sweep failed"),
        }
    }
}
