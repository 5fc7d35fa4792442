// [apps/server/src/services/heartbeat.rs]
/*!
 * Background heartbeat writer (§4.4): rewrites this node's cluster
 * record on `cluster.heartbeat_interval_seconds`. A missed write just
 * lets the TTL creep closer to expiry — there is no retry-with-backoff
 * here, the next tick is the retry.
 */

use std::sync::Arc;

use crate::state::cluster::ClusterManager;

pub async fn spawn_heartbeat(cluster: Arc<ClusterManager>) {
    let mut ticker = tokio::time::interval(cluster.heartbeat_interval());
    loop {
        ticker.tick().await;
        if let Err(error) = cluster.heartbeat().await {
            tracing::error!(%error, "cluster heartbeat failed");
        }
    }
}
