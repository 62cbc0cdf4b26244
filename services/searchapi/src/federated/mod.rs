//! Federation coordinator.
//!
//! # Purpose and responsibility
//! Fans one search request out to every peer search service (the local one
//! included), tags each returned item with its hub of origin, and merges
//! the answers. A failing peer is recorded in the response's error list and
//! never fails the request.
pub mod client;
pub mod config;

use crate::api::types::{FederatedError, FederatedResponse, SearchRequest, SearchResponse};
use crate::cluster::ClusterClient;
use crate::config::Config;
use anyhow::{Context, Result, bail};
use client::HttpClientPool;
use config::{FedConfigCache, RemoteSearchService};
use serde_json::Value;
use std::sync::Arc;

/// Item key carrying the name of the hub an item came from.
pub const MANAGED_HUB_KEY: &str = "managedHub";

pub struct FederationCoordinator {
    config: Arc<Config>,
    peers: FedConfigCache,
    clients: HttpClientPool,
}

impl FederationCoordinator {
    pub fn new(config: Arc<Config>, cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            peers: FedConfigCache::new(config.clone(), cluster.clone()),
            clients: HttpClientPool::new(config.clone(), cluster),
            config,
        }
    }

    /// Resolve the peer list and fan the request out.
    pub async fn search(&self, caller_token: &str, request: &SearchRequest) -> FederatedResponse {
        let peers = self.peers.peers(caller_token).await;
        self.search_peers(peers, request).await
    }

    /// Fan the request out to an explicit peer list and merge the answers.
    pub async fn search_peers(
        &self,
        peers: Vec<RemoteSearchService>,
        request: &SearchRequest,
    ) -> FederatedResponse {
        let dispatches = peers.into_iter().map(|peer| async move {
            let outcome = self.dispatch(&peer, request).await;
            (peer.name, outcome)
        });
        let outcomes = futures::future::join_all(dispatches).await;

        let mut merged = FederatedResponse {
            results: Vec::new(),
            errors: Vec::new(),
        };
        for (hub, outcome) in outcomes {
            match outcome {
                Ok(response) => merge_results(&mut merged, response),
                Err(err) => {
                    tracing::warn!(hub = %hub, error = %err, "federated peer failed");
                    merged.errors.push(FederatedError {
                        hub,
                        message: err.to_string(),
                    });
                }
            }
        }
        merged
    }

    async fn dispatch(
        &self,
        peer: &RemoteSearchService,
        request: &SearchRequest,
    ) -> Result<SearchResponse> {
        let client = if peer.name == self.config.federation.global_hub_name {
            self.clients.local_client().await?
        } else {
            self.clients.remote_client(peer)?
        };
        let response = client
            .post(&peer.url)
            .bearer_auth(&peer.token)
            .json(request)
            .send()
            .await
            .with_context(|| format!("dispatch to peer {}", peer.name))?;
        if !response.status().is_success() {
            bail!("peer {} returned status {}", peer.name, response.status());
        }
        let mut body: SearchResponse = response
            .json()
            .await
            .with_context(|| format!("decode response from peer {}", peer.name))?;
        tag_items(&mut body, &peer.name);
        Ok(body)
    }
}

// Each item records which hub it came from.
fn tag_items(response: &mut SearchResponse, hub: &str) {
    for result in &mut response.results {
        for item in &mut result.items {
            item.insert(MANAGED_HUB_KEY.to_string(), Value::String(hub.to_string()));
        }
        if let Some(related) = &mut result.related {
            for group in related {
                for item in &mut group.items {
                    item.insert(MANAGED_HUB_KEY.to_string(), Value::String(hub.to_string()));
                }
            }
        }
    }
}

// Merge index-wise: result N of each peer answers input N of the request.
fn merge_results(merged: &mut FederatedResponse, response: SearchResponse) {
    for (index, result) in response.results.into_iter().enumerate() {
        match merged.results.get_mut(index) {
            Some(existing) => {
                existing.count += result.count;
                existing.items.extend(result.items);
                match (&mut existing.related, result.related) {
                    (Some(current), Some(incoming)) => current.extend(incoming),
                    (None, Some(incoming)) => existing.related = Some(incoming),
                    _ => {}
                }
            }
            None => merged.results.push(result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{Item, SearchResult};
    use serde_json::json;

    fn item(name: &str) -> Item {
        let mut item = Item::new();
        item.insert("name".to_string(), json!(name));
        item
    }

    #[test]
    fn items_are_tagged_with_their_hub() {
        let mut response = SearchResponse {
            results: vec![SearchResult {
                count: 1,
                items: vec![item("a")],
                related: None,
            }],
        };
        tag_items(&mut response, "hub1");
        assert_eq!(response.results[0].items[0][MANAGED_HUB_KEY], json!("hub1"));
    }

    #[test]
    fn merge_is_index_wise_across_peers() {
        let mut merged = FederatedResponse {
            results: Vec::new(),
            errors: Vec::new(),
        };
        merge_results(
            &mut merged,
            SearchResponse {
                results: vec![SearchResult {
                    count: 2,
                    items: vec![item("a"), item("b")],
                    related: None,
                }],
            },
        );
        merge_results(
            &mut merged,
            SearchResponse {
                results: vec![SearchResult {
                    count: 1,
                    items: vec![item("c")],
                    related: None,
                }],
            },
        );
        assert_eq!(merged.results.len(), 1);
        assert_eq!(merged.results[0].count, 3);
        assert_eq!(merged.results[0].items.len(), 3);
    }
}
