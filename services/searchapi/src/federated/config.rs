//! Federation peer discovery.
//!
//! A peer is a managed hub: a managed cluster that runs its own
//! control-plane stack. For each hub, the `search-global` secret in the
//! hub's namespace carries the bearer token and optional CA bundle for its
//! search API. The discovered list is cached under its own TTL; the local
//! peer carries the caller's token and is rebuilt on every request.
use crate::cluster::ClusterClient;
use crate::config::Config;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

const PEER_SECRET: &str = "search-global";
const DISCOVERY_POOL: usize = 4;

/// Connection details for one peer search service.
#[derive(Debug, Clone)]
pub struct RemoteSearchService {
    pub name: String,
    pub url: String,
    pub token: String,
    pub ca_bundle: Option<Vec<u8>>,
}

#[derive(Default)]
struct CachedPeers {
    last_updated: Option<Instant>,
    peers: Vec<RemoteSearchService>,
}

pub struct FedConfigCache {
    config: Arc<Config>,
    cluster: Arc<dyn ClusterClient>,
    cached: RwLock<CachedPeers>,
}

/// The search API route exposed by a hub, derived from its cluster API URL.
pub fn search_api_url(hub_url: &str) -> String {
    if hub_url.contains("https://api") {
        hub_url
            .replace(
                "https://api",
                "https://search-global-hub-open-cluster-management.apps",
            )
            .replace(":6443", "/searchapi/search")
    } else {
        format!("{}/searchapi/search", hub_url.trim_end_matches('/'))
    }
}

impl FedConfigCache {
    pub fn new(config: Arc<Config>, cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            config,
            cluster,
            cached: RwLock::new(CachedPeers::default()),
        }
    }

    /// The peer list for one request: the local peer (carrying the
    /// caller's token) followed by the cached managed-hub peers.
    pub async fn peers(&self, caller_token: &str) -> Vec<RemoteSearchService> {
        let ttl = self.config.federation.config_cache_ttl;
        let stale = !self
            .cached
            .read()
            .await
            .last_updated
            .is_some_and(|at| at.elapsed() < ttl);
        if stale {
            let mut cached = self.cached.write().await;
            if !cached.last_updated.is_some_and(|at| at.elapsed() < ttl) {
                tracing::info!("refreshing federation config");
                cached.peers = self.discover().await;
                cached.last_updated = Some(Instant::now());
                log_federation_config(&cached.peers);
            }
        } else {
            tracing::debug!("using cached federation config");
        }

        let local = RemoteSearchService {
            name: self.config.federation.global_hub_name.clone(),
            url: format!(
                "https://localhost:{}/searchapi/search",
                self.config.http_port
            ),
            token: caller_token.to_string(),
            ca_bundle: None,
        };
        let mut result = vec![local];
        result.extend(self.cached.read().await.peers.iter().cloned());
        result
    }

    // Read the managed hubs and their route tokens concurrently; hubs with
    // a missing or unreadable secret are skipped.
    async fn discover(&self) -> Vec<RemoteSearchService> {
        let hubs = match self.cluster.list_managed_clusters().await {
            Ok(clusters) => clusters,
            Err(err) => {
                tracing::error!(error = %err, "error getting the managed clusters list");
                return Vec::new();
            }
        };

        futures::stream::iter(hubs.into_iter().filter(|hub| hub.managed_hub).map(|hub| {
            let cluster = self.cluster.clone();
            async move {
                let url = match &hub.url {
                    Some(url) => search_api_url(url),
                    None => {
                        tracing::warn!(hub = %hub.name, "managed hub has no client URL");
                        return None;
                    }
                };
                let secret = match cluster.read_secret(&hub.name, PEER_SECRET).await {
                    Ok(Some(secret)) => secret,
                    Ok(None) => {
                        tracing::warn!(hub = %hub.name, "peer token secret not found");
                        return None;
                    }
                    Err(err) => {
                        tracing::error!(hub = %hub.name, error = %err, "error getting peer token");
                        return None;
                    }
                };
                let token = match secret.get("token") {
                    Some(bytes) => String::from_utf8_lossy(bytes).to_string(),
                    None => {
                        tracing::warn!(hub = %hub.name, "peer secret has no token key");
                        return None;
                    }
                };
                Some(RemoteSearchService {
                    name: hub.name,
                    url,
                    token,
                    ca_bundle: secret.get("ca.crt").cloned(),
                })
            }
        }))
        .buffer_unordered(DISCOVERY_POOL)
        .filter_map(|peer| async move { peer })
        .collect()
        .await
    }
}

fn log_federation_config(peers: &[RemoteSearchService]) {
    for peer in peers {
        tracing::info!(
            name = %peer.name,
            url = %peer.url,
            has_ca = peer.ca_bundle.is_some(),
            "federation peer"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ManagedCluster;
    use crate::cluster::mock::MockClusterClient;
    use std::collections::BTreeMap;

    #[test]
    fn hub_api_url_maps_to_search_route() {
        assert_eq!(
            search_api_url("https://api.hub1.example.com:6443"),
            "https://search-global-hub-open-cluster-management.apps.hub1.example.com/searchapi/search"
        );
    }

    #[test]
    fn plain_urls_get_the_route_appended() {
        assert_eq!(
            search_api_url("http://127.0.0.1:9999"),
            "http://127.0.0.1:9999/searchapi/search"
        );
    }

    #[tokio::test]
    async fn local_peer_is_always_first_and_carries_caller_token() {
        let cluster = Arc::new(MockClusterClient::new());
        let config = Arc::new(crate::config::Config::for_tests());
        let cache = FedConfigCache::new(config, cluster);
        let peers = cache.peers("caller-token").await;
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].name, "global-hub");
        assert_eq!(peers[0].token, "caller-token");
    }

    #[tokio::test]
    async fn managed_hubs_with_secrets_become_peers() {
        let cluster = Arc::new(MockClusterClient::new());
        cluster.set_managed_clusters(vec![
            ManagedCluster {
                name: "hub1".to_string(),
                managed_hub: true,
                url: Some("https://api.hub1.example.com:6443".to_string()),
            },
            ManagedCluster {
                name: "plain-cluster".to_string(),
                managed_hub: false,
                url: Some("https://api.plain.example.com:6443".to_string()),
            },
        ]);
        cluster.add_secret(
            "hub1",
            PEER_SECRET,
            BTreeMap::from([("token".to_string(), b"hub1-token".to_vec())]),
        );
        let config = Arc::new(crate::config::Config::for_tests());
        let cache = FedConfigCache::new(config, cluster);

        let peers = cache.peers("caller").await;
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[1].name, "hub1");
        assert_eq!(peers[1].token, "hub1-token");
        // Non-hub clusters are not peers.
        assert!(!peers.iter().any(|p| p.name == "plain-cluster"));
    }

    #[tokio::test]
    async fn discovery_is_cached_between_requests() {
        let cluster = Arc::new(MockClusterClient::new());
        let config = Arc::new(crate::config::Config::for_tests());
        let cache = FedConfigCache::new(config, cluster.clone());
        cache.peers("t").await;
        let calls = cluster.list_calls_issued();
        cache.peers("t").await;
        assert_eq!(cluster.list_calls_issued(), calls);
    }
}
