//! Cluster-API gateway.
//!
//! # Purpose
//! Read-only accessors for the hub cluster: namespaces, managed-cluster
//! registrations, secrets, config maps, token reviews, and impersonated
//! access reviews. The RBAC caches and the federation coordinator talk to
//! the control plane exclusively through this trait, which is what lets the
//! tests run without a cluster.
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

pub mod kube;
pub mod mock;

/// Outcome of a token review.
#[derive(Debug, Clone, Default)]
pub struct TokenReviewStatus {
    pub authenticated: bool,
    pub user_uid: String,
    pub username: String,
    pub groups: Vec<String>,
}

/// Identity attached to a request after a successful token review.
/// Carried into access reviews as impersonation headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserIdentity {
    pub uid: String,
    pub username: String,
    pub groups: Vec<String>,
}

impl From<&TokenReviewStatus> for UserIdentity {
    fn from(review: &TokenReviewStatus) -> Self {
        Self {
            uid: review.user_uid.clone(),
            username: review.username.clone(),
            groups: review.groups.clone(),
        }
    }
}

/// Attributes of one impersonated access review.
#[derive(Debug, Clone, Default)]
pub struct ResourceAttributes {
    pub group: String,
    pub resource: String,
    pub namespace: String,
    pub name: String,
    pub verb: String,
}

/// A managed-cluster registration as seen by peer discovery.
#[derive(Debug, Clone)]
pub struct ManagedCluster {
    pub name: String,
    // True when the cluster runs its own control-plane stack (a managed
    // hub); only managed hubs are federation peers.
    pub managed_hub: bool,
    pub url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("cluster api request failed: {0}")]
    Api(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type ClusterResult<T> = Result<T, ClusterError>;

#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Resolve a bearer token to an identity via a token review.
    async fn review_token(&self, token: &str) -> ClusterResult<TokenReviewStatus>;

    /// Impersonated self-subject access review: may `user` perform
    /// `attrs.verb` on the described resource?
    async fn can_access(&self, user: &UserIdentity, attrs: &ResourceAttributes)
    -> ClusterResult<bool>;

    /// Impersonated rules review: the `{apigroup, resource}` pairs the user
    /// may list in `namespace`.
    async fn allowed_resources(
        &self,
        user: &UserIdentity,
        namespace: &str,
    ) -> ClusterResult<Vec<(String, String)>>;

    async fn list_namespaces(&self) -> ClusterResult<Vec<String>>;

    async fn list_managed_clusters(&self) -> ClusterResult<Vec<ManagedCluster>>;

    /// Secret payload, or None when the secret does not exist.
    async fn read_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<BTreeMap<String, Vec<u8>>>>;

    /// Config-map payload, or None when it does not exist.
    async fn read_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<BTreeMap<String, String>>>;
}
