use axum::{Router, extract::Extension, routing::get, routing::post};
use distributed_engine::catalog::dataset::Catalog;
use distributed_engine::cluster::cluster::{Cluster, ClusterParams};
use distributed_engine::cluster::forwarder::HttpForwarder;
use distributed_engine::cluster::handlers::*;
use distributed_engine::cluster::types::StateDiff;
use distributed_engine::cluster::watcher::watch_state_file;
use distributed_engine::config::EngineConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut bind: Option<String> = None;
    let mut http: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                config_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--bind" if i + 1 < args.len() => {
                bind = Some(args[i + 1].clone());
                i += 2;
            }
            "--http" if i + 1 < args.len() => {
                http = Some(args[i + 1].clone());
                i += 2;
            }
            "--help" | "-h" => {
                eprintln!(
                    "Usage: {} [--config <path>] [--bind <host:port>] [--http <addr:port>]",
                    args[0]
                );
                eprintln!("Example: {} --config engine.json --bind 127.0.0.1:10031", args[0]);
                std::process::exit(1);
            }
            _ => {
                i += 1;
            }
        }
    }

    let mut config = match &config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(bind) = &bind {
        config.set_bind(bind)?;
    }
    if let Some(http) = &http {
        config.http_addr = http.parse()?;
    }

    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .init();

    let node_name = config.node_name();
    tracing::info!("Starting engine {} as {}", node_name, config.sender_role);

    // 1. Catalog:
    let catalog = Catalog::load(&config.catalog_path)?;
    let served = catalog.slices(&node_name);
    if served.is_empty() {
        tracing::warn!("Catalog assigns no slices to {}", node_name);
    }
    for (name, slice) in &served {
        tracing::info!("  - slice {} of dataset {}", name, slice.dataset);
    }

    // 2. Cluster:
    let mut cluster = Cluster::new(ClusterParams {
        catalog,
        state_path: config.state_path.clone(),
        sender_role: config.sender_role.clone(),
        forwarder_factory: HttpForwarder::factory(
            config.forward_timeout(),
            config.forward_attempts,
        ),
    });
    cluster.on_change(Box::new(|diff: &StateDiff| {
        tracing::info!(
            "Cluster membership changed ({} added, {} removed, {} changed)",
            diff.added.len(),
            diff.removed.len(),
            diff.changed.len()
        );
    }));
    cluster.start();
    let cluster: SharedCluster = Arc::new(RwLock::new(cluster));

    // 3. Spawn state file watcher:
    let (_watcher, mut changes) =
        watch_state_file(config.state_path.clone(), config.state_poll_interval());
    let reload_cluster = cluster.clone();
    tokio::spawn(async move {
        while changes.recv().await.is_some() {
            reload_cluster.write().await.reload();
        }
    });

    // 4. Spawn stats reporter:
    let stats_cluster = cluster.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));

        loop {
            interval.tick().await;
            let cluster = stats_cluster.read().await;
            tracing::info!(
                "Cluster stats: {} live of {} nodes",
                cluster.live_nodes().len(),
                cluster.engine_node_names().len()
            );
            for (name, entry) in cluster.engine_nodes_status() {
                tracing::debug!("  - {} {}", name, entry.status.as_str());
            }
        }
    });

    // 5. HTTP Router:
    let app = Router::new()
        .route(ENDPOINT_CLUSTER_STATUS, get(handle_cluster_status))
        .route(ENDPOINT_CLUSTER_RELOAD, post(handle_cluster_reload))
        .layer(Extension(cluster.clone()));

    // 6. Start HTTP server:
    tracing::info!("HTTP server listening on {}", config.http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    cluster.write().await.shutdown();
    Ok(())
}
