//! Authorization caches and request-entry middleware.
//!
//! # Purpose and responsibility
//! Minimizes traffic to the cluster API and the database by caching token
//! reviews, process-wide hub data, and per-user access snapshots, each with
//! its own TTL. The middleware resolves the caller's identity and warms the
//! caches before a request reaches a handler.
//!
//! # Key invariants and assumptions
//! - A missing or failed access snapshot means "no access", never "all
//!   access"; the planner compiles it to a predicate that matches no rows.
//! - Readers see either the previous or the committed snapshot, never a
//!   partial update.
//! - Concurrent lookups for the same token or user share one upstream call.
use crate::cluster::ClusterClient;
use crate::config::Config;
use crate::store::Database;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub mod middleware;
pub mod shared;
pub mod token;
pub mod user;

/// A `{apigroup, kind_plural}` grant pair. The `kind` field holds the
/// plural form, matching the `kind_plural` key in the stored documents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Resource {
    pub apigroup: String,
    pub kind: String,
}

impl Resource {
    pub fn new(apigroup: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            apigroup: apigroup.into(),
            kind: kind.into(),
        }
    }
}

/// Per-identity access snapshot consumed by the query planner.
#[derive(Debug, Clone, Default)]
pub struct UserData {
    /// Cluster-scoped grants.
    pub cs_resources: Vec<Resource>,
    /// Namespace to granted pairs.
    pub ns_resources: HashMap<String, Vec<Resource>>,
    /// Managed clusters the user may read.
    pub managed_clusters: HashSet<String>,
}

/// Process-wide cache facade. Created once at startup and shared by the
/// middleware and every handler.
pub struct Cache {
    pub(crate) config: Arc<Config>,
    pub(crate) db: Arc<dyn Database>,
    pub(crate) cluster: Arc<dyn ClusterClient>,
    pub(crate) token_reviews: DashMap<String, Arc<token::TokenEntry>>,
    pub(crate) shared: shared::SharedData,
    pub(crate) users: DashMap<String, Arc<user::UserEntry>>,
}

impl Cache {
    pub fn new(config: Arc<Config>, db: Arc<dyn Database>, cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            config,
            db,
            cluster,
            token_reviews: DashMap::new(),
            shared: shared::SharedData::default(),
            users: DashMap::new(),
        }
    }
}
