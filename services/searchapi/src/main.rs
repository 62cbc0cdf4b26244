// Search API service
// ------------------
// Read-only search and discovery over the denormalized cluster-resource
// store. Requests authenticate with a bearer token (token-review cache),
// get a per-user access snapshot (access-review caches), and the planner
// compiles that snapshot into the WHERE clause of every SQL statement.
// With federation enabled, the same request fans out to peer search
// services on managed hubs and the answers are merged.
use anyhow::Context;
use searchapi::app::{AppState, build_router};
use searchapi::cluster::kube::KubeClusterClient;
use searchapi::config::Config;
use searchapi::federated::FederationCoordinator;
use searchapi::observability;
use searchapi::rbac::Cache;
use searchapi::store::postgres::PgDatabase;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let metrics_handle = observability::init_observability("searchapi");

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    config.log();
    let config = Arc::new(config);

    let db: Arc<dyn searchapi::store::Database> = Arc::new(
        PgDatabase::connect(&config)
            .await
            .context("connect to database")?,
    );
    let cluster: Arc<dyn searchapi::cluster::ClusterClient> = Arc::new(
        KubeClusterClient::new()
            .await
            .context("build cluster client")?,
    );

    let cache = Arc::new(Cache::new(config.clone(), db.clone(), cluster.clone()));
    let federation = config
        .federation
        .enabled
        .then(|| Arc::new(FederationCoordinator::new(config.clone(), cluster.clone())));
    if federation.is_some() {
        tracing::info!(
            global_hub = %config.federation.global_hub_name,
            "federated search enabled"
        );
    }

    let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics_port).into();
    tokio::spawn(observability::serve_metrics(metrics_handle, metrics_addr));

    let state = AppState {
        config: config.clone(),
        db,
        cache,
        federation,
    };
    let app = build_router(state);

    let addr: SocketAddr = ([0, 0, 0, 0], config.http_port).into();
    tracing::info!(%addr, "search api listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
