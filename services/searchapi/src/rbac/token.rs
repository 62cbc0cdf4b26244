//! Token-review cache.
//!
//! Maps a bearer token to its review outcome. Each entry owns an async
//! mutex that is held across the upstream review, so concurrent lookups for
//! the same token coalesce into a single call: the first caller refreshes,
//! the rest block on the entry and then read the committed result. Upstream
//! failures are stored with a timestamp too, so a broken authenticator is
//! retried at most once per TTL window.
use super::Cache;
use crate::cluster::{ClusterError, TokenReviewStatus};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

pub struct TokenEntry {
    state: Mutex<TokenState>,
}

#[derive(Default)]
struct TokenState {
    updated_at: Option<Instant>,
    review: TokenReviewStatus,
    err: Option<String>,
}

impl TokenEntry {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(TokenState::default()),
        }
    }
}

impl Cache {
    /// Whether the token authenticates. `Ok(false)` is a definitive
    /// reject; errors mean the review itself could not be performed.
    pub async fn is_valid_token(&self, token: &str) -> Result<bool, ClusterError> {
        Ok(self.get_token_review(token).await?.authenticated)
    }

    /// The full review record for a token, refreshed when stale.
    pub async fn get_token_review(&self, token: &str) -> Result<TokenReviewStatus, ClusterError> {
        let entry = self
            .token_reviews
            .entry(token.to_string())
            .or_insert_with(|| Arc::new(TokenEntry::new()))
            .value()
            .clone();

        let mut state = entry.state.lock().await;
        let fresh = state
            .updated_at
            .is_some_and(|at| at.elapsed() < self.config.auth_cache_ttl);
        if !fresh {
            match self.cluster.review_token(token).await {
                Ok(review) => {
                    state.review = review;
                    state.err = None;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "token review failed");
                    state.err = Some(err.to_string());
                }
            }
            state.updated_at = Some(Instant::now());
        }

        if let Some(message) = &state.err {
            return Err(ClusterError::Api(message.clone()));
        }
        Ok(state.review.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::mock::MockClusterClient;
    use crate::config::Config;
    use crate::store::mock::MockDatabase;
    use std::time::Duration;

    fn cache_with(cluster: Arc<MockClusterClient>) -> Cache {
        Cache::new(
            Arc::new(Config::for_tests()),
            Arc::new(MockDatabase::new()),
            cluster,
        )
    }

    fn valid_review() -> TokenReviewStatus {
        TokenReviewStatus {
            authenticated: true,
            user_uid: "uid-1".to_string(),
            username: "user-1".to_string(),
            groups: vec!["system:authenticated".to_string()],
        }
    }

    #[tokio::test]
    async fn concurrent_lookups_issue_one_upstream_review() {
        let cluster = Arc::new(MockClusterClient::new());
        cluster.add_token("tok", valid_review());
        cluster.set_review_delay(Duration::from_millis(50));
        let cache = Arc::new(cache_with(cluster.clone()));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(
                async move { cache.is_valid_token("tok").await },
            ));
        }
        for task in tasks {
            assert!(task.await.unwrap().unwrap());
        }
        assert_eq!(cluster.token_reviews_issued(), 1);
    }

    #[tokio::test]
    async fn fresh_entries_skip_upstream() {
        let cluster = Arc::new(MockClusterClient::new());
        cluster.add_token("tok", valid_review());
        let cache = cache_with(cluster.clone());

        assert!(cache.is_valid_token("tok").await.unwrap());
        assert!(cache.is_valid_token("tok").await.unwrap());
        assert_eq!(cluster.token_reviews_issued(), 1);
    }

    #[tokio::test]
    async fn unknown_token_is_a_reject_not_an_error() {
        let cluster = Arc::new(MockClusterClient::new());
        let cache = cache_with(cluster);
        assert!(!cache.is_valid_token("missing").await.unwrap());
    }

    #[tokio::test]
    async fn upstream_errors_are_cached_within_ttl() {
        let cluster = Arc::new(MockClusterClient::new());
        cluster.fail_reviews_with("apiserver unavailable");
        let cache = cache_with(cluster.clone());

        assert!(cache.is_valid_token("tok").await.is_err());
        assert!(cache.is_valid_token("tok").await.is_err());
        // The second failure comes from the cache, not a new review.
        assert_eq!(cluster.token_reviews_issued(), 1);
    }

    #[tokio::test]
    async fn distinct_tokens_do_not_share_entries() {
        let cluster = Arc::new(MockClusterClient::new());
        cluster.add_token("a", valid_review());
        let cache = cache_with(cluster.clone());

        assert!(cache.is_valid_token("a").await.unwrap());
        assert!(!cache.is_valid_token("b").await.unwrap());
        assert_eq!(cluster.token_reviews_issued(), 2);
    }
}
