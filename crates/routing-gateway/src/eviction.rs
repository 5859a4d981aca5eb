use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::app::AppState;

/// Periodically drops sessions idle past `routing.idle_ttl_s`. Runs until
/// `shutdown` broadcasts `true`, mirroring the scheduler's own tick loop.
pub async fn run(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    let period = std::time::Duration::from_secs(state.config.queue.eviction_interval_s.max(1));
    let idle_ttl = chrono::Duration::seconds(state.config.routing.idle_ttl_s as i64);

    info!(period_s = period.as_secs(), idle_ttl_s = idle_ttl.num_seconds(), "session eviction task started");
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let evicted = state.sessions.evict_idle(idle_ttl).await;
                if evicted > 0 {
                    info!(evicted, "evicted idle sessions");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("session eviction task shutting down");
                    break;
                }
            }
        }
    }
}
