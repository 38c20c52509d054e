use super::cluster::Cluster;
use super::types::NodeStatusEntry;

use axum::{Extension, Json, http::StatusCode};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const ENDPOINT_CLUSTER_STATUS: &str = "/cluster/status";
pub const ENDPOINT_CLUSTER_RELOAD: &str = "/cluster/reload";

pub type SharedCluster = Arc<RwLock<Cluster>>;

pub async fn handle_cluster_status(
    Extension(cluster): Extension<SharedCluster>,
) -> (StatusCode, Json<BTreeMap<String, NodeStatusEntry>>) {
    let cluster = cluster.read().await;
    (StatusCode::OK, Json(cluster.engine_nodes_status()))
}

/// Re-reads the state file now instead of waiting for the watcher.
pub async fn handle_cluster_reload(
    Extension(cluster): Extension<SharedCluster>,
) -> (StatusCode, Json<BTreeMap<String, NodeStatusEntry>>) {
    let mut cluster = cluster.write().await;
    tracing::info!("Reload requested over HTTP");
    cluster.reload();
    (StatusCode::OK, Json(cluster.engine_nodes_status()))
}
