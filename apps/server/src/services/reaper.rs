// [apps/server/src/services/reaper.rs]
/*!
 * Command-expiry sweeper (§4.3 lifecycle, §5 background tasks): moves
 * any command still `Pending` or `Delivered` past `command_ttl_seconds`
 * into `Expired`. Runs on a fixed cadence independent of the TTL
 * itself, so a short TTL still gets swept promptly.
 */

use std::sync::Arc;
use std::time::Duration;

use crate::state::store::DataStore;

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

pub async fn spawn_reaper(store: Arc<DataStore>, ttl: chrono::Duration) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        let expired = store.expire_overdue_commands(ttl);
        if expired > 0 {
            tracing::info!(expired, "expired overdue commands");
        }
    }
}
