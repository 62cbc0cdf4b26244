//! Per-identity access snapshot cache.
//!
//! Each entry holds the three-part snapshot (cluster-scoped grants,
//! per-namespace grants, managed-cluster grants) with independent refresh
//! timestamps. A refresh holds the entry's async mutex, so concurrent
//! requests for one user share a single round of access reviews; the
//! reviews themselves fan out through a bounded worker pool.
use super::{Cache, Resource, UserData};
use crate::cluster::{ClusterError, ResourceAttributes, UserIdentity};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

// Concurrent access reviews per refresh.
const ACCESS_REVIEW_POOL: usize = 10;

const MANAGED_CLUSTER_GROUP: &str = "cluster.open-cluster-management.io";

pub struct UserEntry {
    state: Mutex<UserState>,
}

#[derive(Default)]
struct UserState {
    user: UserData,
    cs_updated_at: Option<Instant>,
    ns_updated_at: Option<Instant>,
    mc_updated_at: Option<Instant>,
}

impl UserEntry {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(UserState::default()),
        }
    }
}

impl Cache {
    /// The caller's access snapshot, refreshing any component whose TTL has
    /// lapsed. Review failures leave the affected grants empty (no access).
    pub async fn get_user_data(&self, identity: &UserIdentity) -> Result<UserData, ClusterError> {
        let entry = self
            .users
            .entry(identity.uid.clone())
            .or_insert_with(|| Arc::new(UserEntry::new()))
            .value()
            .clone();

        let mut state = entry.state.lock().await;
        let ttl = self.config.user_cache_ttl;

        if !state.cs_updated_at.is_some_and(|at| at.elapsed() < ttl) {
            state.user.cs_resources = self.refresh_cluster_scoped_grants(identity).await;
            state.cs_updated_at = Some(Instant::now());
        }
        if !state.ns_updated_at.is_some_and(|at| at.elapsed() < ttl) {
            state.user.ns_resources = self.refresh_namespaced_grants(identity).await;
            state.ns_updated_at = Some(Instant::now());
        }
        if !state.mc_updated_at.is_some_and(|at| at.elapsed() < ttl) {
            state.user.managed_clusters = self.refresh_managed_cluster_grants(identity).await;
            state.mc_updated_at = Some(Instant::now());
        }

        Ok(state.user.clone())
    }

    // One impersonated access review per cluster-scoped kind known in the
    // hub; keep the allowed pairs.
    async fn refresh_cluster_scoped_grants(&self, identity: &UserIdentity) -> Vec<Resource> {
        let candidates = self.shared_cluster_scoped().await;
        let mut allowed: Vec<Resource> = futures::stream::iter(candidates.into_iter().map(
            |resource| {
                let cluster = self.cluster.clone();
                let identity = identity.clone();
                async move {
                    let attrs = ResourceAttributes {
                        group: resource.apigroup.clone(),
                        resource: resource.kind.clone(),
                        verb: "list".to_string(),
                        ..Default::default()
                    };
                    // A failed review grants nothing.
                    let granted = cluster.can_access(&identity, &attrs).await.unwrap_or(false);
                    granted.then_some(resource)
                }
            },
        ))
        .buffer_unordered(ACCESS_REVIEW_POOL)
        .filter_map(|resource| async move { resource })
        .collect()
        .await;
        allowed.sort();
        allowed
    }

    // Rules review per hub namespace; namespaces with no listable kinds are
    // omitted from the snapshot.
    async fn refresh_namespaced_grants(
        &self,
        identity: &UserIdentity,
    ) -> std::collections::HashMap<String, Vec<Resource>> {
        let namespaces = self.shared_namespaces().await;
        let results: Vec<(String, Vec<Resource>)> =
            futures::stream::iter(namespaces.into_iter().map(|namespace| {
                let cluster = self.cluster.clone();
                let identity = identity.clone();
                async move {
                    let pairs = cluster
                        .allowed_resources(&identity, &namespace)
                        .await
                        .unwrap_or_default();
                    let mut resources: Vec<Resource> = pairs
                        .into_iter()
                        .map(|(apigroup, kind)| Resource::new(apigroup, kind))
                        .collect();
                    resources.sort();
                    resources.dedup();
                    (namespace, resources)
                }
            }))
            .buffer_unordered(ACCESS_REVIEW_POOL)
            .collect()
            .await;

        results
            .into_iter()
            .filter(|(_, resources)| !resources.is_empty())
            .collect()
    }

    // One access review against the managedclusters resource per known
    // managed-cluster name.
    async fn refresh_managed_cluster_grants(
        &self,
        identity: &UserIdentity,
    ) -> std::collections::HashSet<String> {
        let candidates = self.shared_managed_clusters().await;
        futures::stream::iter(candidates.into_iter().map(|name| {
            let cluster = self.cluster.clone();
            let identity = identity.clone();
            async move {
                let attrs = ResourceAttributes {
                    group: MANAGED_CLUSTER_GROUP.to_string(),
                    resource: "managedclusters".to_string(),
                    name: name.clone(),
                    verb: "get".to_string(),
                    ..Default::default()
                };
                let granted = cluster.can_access(&identity, &attrs).await.unwrap_or(false);
                granted.then_some(name)
            }
        }))
        .buffer_unordered(ACCESS_REVIEW_POOL)
        .filter_map(|name| async move { name })
        .collect()
        .await
    }
}
