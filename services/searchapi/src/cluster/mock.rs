//! Scriptable cluster gateway for tests and offline development.
//!
//! Tokens, access rules, namespaces, and managed clusters are configured up
//! front; upstream calls are counted (and optionally delayed) so tests can
//! assert the caching layers' single-flight and TTL behavior.
use super::{
    ClusterClient, ClusterError, ClusterResult, ManagedCluster, ResourceAttributes,
    TokenReviewStatus, UserIdentity,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Access rules granted to one user in the mock control plane.
#[derive(Debug, Clone, Default)]
pub struct MockAccess {
    /// Cluster-scoped `(apigroup, kind_plural)` pairs the user may list.
    pub cluster_scoped: HashSet<(String, String)>,
    /// Per-namespace `(apigroup, kind_plural)` pairs.
    pub namespaced: HashMap<String, Vec<(String, String)>>,
    /// Managed-cluster names the user may read.
    pub managed_clusters: HashSet<String>,
}

#[derive(Default)]
pub struct MockClusterClient {
    tokens: Mutex<HashMap<String, TokenReviewStatus>>,
    access: Mutex<HashMap<String, MockAccess>>,
    namespaces: Mutex<Vec<String>>,
    managed_clusters: Mutex<Vec<ManagedCluster>>,
    secrets: Mutex<HashMap<(String, String), BTreeMap<String, Vec<u8>>>>,
    config_maps: Mutex<HashMap<(String, String), BTreeMap<String, String>>>,
    token_reviews_issued: AtomicUsize,
    access_reviews_issued: AtomicUsize,
    list_calls_issued: AtomicUsize,
    review_delay: Mutex<Duration>,
    fail_reviews: Mutex<Option<String>>,
}

impl MockClusterClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_token(&self, token: &str, review: TokenReviewStatus) {
        self.tokens.lock().unwrap().insert(token.to_string(), review);
    }

    pub fn add_access(&self, uid: &str, access: MockAccess) {
        self.access.lock().unwrap().insert(uid.to_string(), access);
    }

    pub fn set_namespaces(&self, namespaces: Vec<String>) {
        *self.namespaces.lock().unwrap() = namespaces;
    }

    pub fn set_managed_clusters(&self, clusters: Vec<ManagedCluster>) {
        *self.managed_clusters.lock().unwrap() = clusters;
    }

    pub fn add_secret(&self, namespace: &str, name: &str, data: BTreeMap<String, Vec<u8>>) {
        self.secrets
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), data);
    }

    /// Delay applied inside every token review; lets tests overlap callers.
    pub fn set_review_delay(&self, delay: Duration) {
        *self.review_delay.lock().unwrap() = delay;
    }

    pub fn fail_reviews_with(&self, message: &str) {
        *self.fail_reviews.lock().unwrap() = Some(message.to_string());
    }

    pub fn token_reviews_issued(&self) -> usize {
        self.token_reviews_issued.load(Ordering::SeqCst)
    }

    pub fn access_reviews_issued(&self) -> usize {
        self.access_reviews_issued.load(Ordering::SeqCst)
    }

    pub fn list_calls_issued(&self) -> usize {
        self.list_calls_issued.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterClient for MockClusterClient {
    async fn review_token(&self, token: &str) -> ClusterResult<TokenReviewStatus> {
        self.token_reviews_issued.fetch_add(1, Ordering::SeqCst);
        let delay = *self.review_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.fail_reviews.lock().unwrap().as_ref() {
            return Err(ClusterError::Api(message.clone()));
        }
        // Unknown tokens are a definitive reject, not an error.
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .unwrap_or_default())
    }

    async fn can_access(
        &self,
        user: &UserIdentity,
        attrs: &ResourceAttributes,
    ) -> ClusterResult<bool> {
        self.access_reviews_issued.fetch_add(1, Ordering::SeqCst);
        let access = self.access.lock().unwrap();
        let Some(rules) = access.get(&user.uid) else {
            return Ok(false);
        };
        if attrs.resource == "managedclusters" {
            return Ok(rules.managed_clusters.contains(&attrs.name));
        }
        Ok(rules
            .cluster_scoped
            .contains(&(attrs.group.clone(), attrs.resource.clone())))
    }

    async fn allowed_resources(
        &self,
        user: &UserIdentity,
        namespace: &str,
    ) -> ClusterResult<Vec<(String, String)>> {
        self.access_reviews_issued.fetch_add(1, Ordering::SeqCst);
        let access = self.access.lock().unwrap();
        Ok(access
            .get(&user.uid)
            .and_then(|rules| rules.namespaced.get(namespace))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_namespaces(&self) -> ClusterResult<Vec<String>> {
        self.list_calls_issued.fetch_add(1, Ordering::SeqCst);
        Ok(self.namespaces.lock().unwrap().clone())
    }

    async fn list_managed_clusters(&self) -> ClusterResult<Vec<ManagedCluster>> {
        self.list_calls_issued.fetch_add(1, Ordering::SeqCst);
        Ok(self.managed_clusters.lock().unwrap().clone())
    }

    async fn read_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<BTreeMap<String, Vec<u8>>>> {
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn read_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<BTreeMap<String, String>>> {
        Ok(self
            .config_maps
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}
