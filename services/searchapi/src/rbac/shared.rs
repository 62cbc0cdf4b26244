//! Process-wide shared data cache.
//!
//! Four refreshable sub-caches, each with its own lock and timestamp:
//! cluster-scoped resource kinds (from the database), hub namespaces and
//! managed-cluster names (from the cluster API), and the managed clusters
//! with the search addon disabled (from the database, on demand). A
//! sub-cache within its TTL is never refreshed, so repeated warm-ups are
//! free; writers replace the value under the entry's write lock.
use super::{Cache, Resource, UserData};
use crate::store::StoreError;
use std::collections::HashSet;
use std::time::Instant;
use tokio::sync::RwLock;

/// Distinct cluster-scoped kinds on the hub: rows flagged as hub resources
/// with no namespace key.
pub const CLUSTER_SCOPED_SQL: &str = "SELECT DISTINCT COALESCE(\"data\"->>'apigroup', '') AS \"apigroup\", COALESCE(\"data\"->>'kind_plural', '') AS \"kind\" FROM \"search\".\"resources\" WHERE (\"data\"->>'_hubClusterResource' = 'true') AND (\"data\"->>'namespace' IS NULL)";

/// Managed clusters whose search addon is disabled: every ManagedClusterInfo
/// should have a matching `search-collector` ManagedClusterAddOn in its
/// namespace; a NULL join means the addon is absent. The local cluster is
/// excluded.
pub const DISABLED_CLUSTERS_SQL: &str = "SELECT DISTINCT \"mcInfo\".data->>'name' AS \"srchAddonDisabledCluster\" FROM \"search\".\"resources\" AS \"mcInfo\" LEFT OUTER JOIN \"search\".\"resources\" AS \"srchAddon\" ON ((\"mcInfo\".data->>'name' = \"srchAddon\".data->>'namespace') AND (\"srchAddon\".data->>'kind' = 'ManagedClusterAddOn') AND (\"srchAddon\".data->>'name' = 'search-collector')) WHERE ((\"mcInfo\".data->>'kind' = 'ManagedClusterInfo') AND (\"srchAddon\".uid IS NULL) AND (\"mcInfo\".data->>'name' != 'local-cluster'))";

const LOCAL_CLUSTER: &str = "local-cluster";

#[derive(Default)]
pub struct SharedData {
    cluster_scoped: RwLock<SharedEntry<Vec<Resource>>>,
    namespaces: RwLock<SharedEntry<Vec<String>>>,
    managed_clusters: RwLock<SharedEntry<HashSet<String>>>,
    disabled_clusters: RwLock<SharedEntry<HashSet<String>>>,
}

#[derive(Default)]
struct SharedEntry<T> {
    value: T,
    updated_at: Option<Instant>,
    err: Option<String>,
}

impl<T> SharedEntry<T> {
    fn fresh(&self, ttl: std::time::Duration) -> bool {
        self.updated_at.is_some_and(|at| at.elapsed() < ttl)
    }

    fn commit(&mut self, value: T, err: Option<String>) {
        self.value = value;
        self.err = err;
        self.updated_at = Some(Instant::now());
    }
}

/// Disabled managed clusters visible to one user. `user_has_access` is
/// false when the emptiness is caused by the caller having no
/// managed-cluster grants rather than by every addon being enabled.
#[derive(Debug, Clone)]
pub struct DisabledClusters {
    pub clusters: HashSet<String>,
    pub user_has_access: bool,
}

impl Cache {
    /// Ensure the cluster-scoped kinds, namespaces, and managed-cluster
    /// sub-caches are within TTL. Sub-caches already fresh are untouched.
    pub async fn populate_shared_cache(&self) -> Result<(), anyhow::Error> {
        let ttl = self.config.shared_cache_ttl;
        let mut last_err: Option<anyhow::Error> = None;

        if !self.shared.cluster_scoped.read().await.fresh(ttl) {
            if let Err(err) = self.refresh_cluster_scoped().await {
                last_err = Some(anyhow::anyhow!(err.to_string()));
            }
        }
        if !self.shared.namespaces.read().await.fresh(ttl) {
            if let Err(err) = self.refresh_namespaces().await {
                last_err = Some(anyhow::anyhow!(err.to_string()));
            }
        }
        if !self.shared.managed_clusters.read().await.fresh(ttl) {
            if let Err(err) = self.refresh_managed_clusters().await {
                last_err = Some(anyhow::anyhow!(err.to_string()));
            }
        }

        match last_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn refresh_cluster_scoped(&self) -> Result<(), StoreError> {
        let mut entry = self.shared.cluster_scoped.write().await;
        // Another request may have refreshed while we waited for the lock.
        if entry.fresh(self.config.shared_cache_ttl) {
            return Ok(());
        }
        match self.db.query_kind_pairs(CLUSTER_SCOPED_SQL).await {
            Ok(pairs) => {
                let mut resources: Vec<Resource> = pairs
                    .into_iter()
                    .map(|(apigroup, kind)| Resource::new(apigroup, kind))
                    .collect();
                resources.sort();
                tracing::debug!(count = resources.len(), "refreshed cluster-scoped kinds");
                entry.commit(resources, None);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to refresh cluster-scoped kinds");
                entry.commit(Vec::new(), Some(err.to_string()));
                Err(err)
            }
        }
    }

    async fn refresh_namespaces(&self) -> Result<(), anyhow::Error> {
        let mut entry = self.shared.namespaces.write().await;
        if entry.fresh(self.config.shared_cache_ttl) {
            return Ok(());
        }
        match self.cluster.list_namespaces().await {
            Ok(namespaces) => {
                tracing::debug!(count = namespaces.len(), "refreshed hub namespaces");
                entry.commit(namespaces, None);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to refresh namespaces");
                entry.commit(Vec::new(), Some(err.to_string()));
                Err(err.into())
            }
        }
    }

    async fn refresh_managed_clusters(&self) -> Result<(), anyhow::Error> {
        let mut entry = self.shared.managed_clusters.write().await;
        if entry.fresh(self.config.shared_cache_ttl) {
            return Ok(());
        }
        match self.cluster.list_managed_clusters().await {
            Ok(clusters) => {
                let names: HashSet<String> = clusters
                    .into_iter()
                    .map(|cluster| cluster.name)
                    .filter(|name| name != LOCAL_CLUSTER)
                    .collect();
                tracing::debug!(count = names.len(), "refreshed managed clusters");
                entry.commit(names, None);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to refresh managed clusters");
                entry.commit(HashSet::new(), Some(err.to_string()));
                Err(err.into())
            }
        }
    }

    pub async fn shared_cluster_scoped(&self) -> Vec<Resource> {
        self.shared.cluster_scoped.read().await.value.clone()
    }

    pub async fn shared_namespaces(&self) -> Vec<String> {
        self.shared.namespaces.read().await.value.clone()
    }

    pub async fn shared_managed_clusters(&self) -> HashSet<String> {
        self.shared.managed_clusters.read().await.value.clone()
    }

    /// Managed clusters with the search addon disabled, restricted to the
    /// clusters the caller may read.
    pub async fn get_disabled_clusters(
        &self,
        user: &UserData,
    ) -> Result<DisabledClusters, StoreError> {
        {
            let entry = self.shared.disabled_clusters.read().await;
            // A cached failure is not a valid entry; retry the query.
            if entry.fresh(self.config.shared_cache_ttl) && entry.err.is_none() {
                return Ok(intersect_with_user(&entry.value, user));
            }
        }

        let mut entry = self.shared.disabled_clusters.write().await;
        if !(entry.fresh(self.config.shared_cache_ttl) && entry.err.is_none()) {
            match self.db.query_values(DISABLED_CLUSTERS_SQL).await {
                Ok(values) => {
                    let disabled: HashSet<String> = values.into_iter().flatten().collect();
                    entry.commit(disabled, None);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to query search-addon disabled clusters");
                    entry.commit(HashSet::new(), Some(err.to_string()));
                    return Err(err);
                }
            }
        }
        Ok(intersect_with_user(&entry.value, user))
    }
}

fn intersect_with_user(disabled: &HashSet<String>, user: &UserData) -> DisabledClusters {
    let clusters = disabled
        .intersection(&user.managed_clusters)
        .cloned()
        .collect();
    DisabledClusters {
        clusters,
        user_has_access: !user.managed_clusters.is_empty(),
    }
}
