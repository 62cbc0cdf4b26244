// Federation fan-out against real loopback peers: one healthy peer and one
// unreachable peer. The merged response carries the healthy peer's items
// and an error record naming the failing peer, with overall success.
use axum::Json;
use axum::routing::post;
use searchapi::api::types::{SearchInput, SearchRequest, SearchResponse, SearchResult};
use searchapi::cluster::mock::MockClusterClient;
use searchapi::config::Config;
use searchapi::federated::{FederationCoordinator, MANAGED_HUB_KEY, config::RemoteSearchService};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

fn item(name: &str) -> searchapi::api::types::Item {
    let mut item = searchapi::api::types::Item::new();
    item.insert("name".to_string(), json!(name));
    item.insert("kind".to_string(), json!("pod"));
    item
}

// Serve a canned search response on a loopback listener.
async fn spawn_peer(items: usize) -> (SocketAddr, oneshot::Sender<()>) {
    let router = axum::Router::new().route(
        "/searchapi/search",
        post(move || async move {
            let results = vec![SearchResult {
                count: items as i64,
                items: (0..items).map(|i| item(&format!("pod-{i}"))).collect(),
                related: None,
            }];
            Json(SearchResponse { results })
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;
    });
    (addr, shutdown_tx)
}

// A port with nothing listening on it.
async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    addr
}

fn peer(name: &str, addr: SocketAddr) -> RemoteSearchService {
    RemoteSearchService {
        name: name.to_string(),
        url: format!("http://{addr}/searchapi/search"),
        token: format!("{name}-token"),
        ca_bundle: None,
    }
}

#[tokio::test]
async fn partial_peer_failure_keeps_the_response_successful() {
    let (healthy_addr, shutdown) = spawn_peer(3).await;
    let failing_addr = unreachable_addr().await;

    let config = Arc::new(Config::from_env());
    let coordinator = FederationCoordinator::new(config, Arc::new(MockClusterClient::new()));

    let request = SearchRequest {
        input: vec![serde_json::from_value(json!({
            "filters": [{"property": "kind", "values": ["pod"]}]
        }))
        .unwrap()],
    };
    let response = coordinator
        .search_peers(
            vec![peer("hub1", healthy_addr), peer("hub2", failing_addr)],
            &request,
        )
        .await;

    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].count, 3);
    assert_eq!(response.results[0].items.len(), 3);
    // Every merged item names its hub of origin.
    for item in &response.results[0].items {
        assert_eq!(item[MANAGED_HUB_KEY], json!("hub1"));
    }
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].hub, "hub2");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn all_peers_merge_their_items() {
    let (peer1_addr, shutdown1) = spawn_peer(2).await;
    let (peer2_addr, shutdown2) = spawn_peer(1).await;

    let config = Arc::new(Config::from_env());
    let coordinator = FederationCoordinator::new(config, Arc::new(MockClusterClient::new()));

    let request = SearchRequest {
        input: vec![SearchInput::default()],
    };
    let response = coordinator
        .search_peers(
            vec![peer("hub1", peer1_addr), peer("hub2", peer2_addr)],
            &request,
        )
        .await;

    assert!(response.errors.is_empty());
    assert_eq!(response.results[0].count, 3);
    assert_eq!(response.results[0].items.len(), 3);
    let hubs: Vec<&str> = response.results[0]
        .items
        .iter()
        .map(|item| item[MANAGED_HUB_KEY].as_str().unwrap())
        .collect();
    assert!(hubs.contains(&"hub1"));
    assert!(hubs.contains(&"hub2"));

    let _ = shutdown1.send(());
    let _ = shutdown2.send(());
}
