use axum::body::Body;
use axum::http::Request;
use searchapi::app::AppState;
use searchapi::cluster::TokenReviewStatus;
use searchapi::cluster::mock::MockClusterClient;
use searchapi::config::Config;
use searchapi::rbac::Cache;
use searchapi::store::mock::MockDatabase;
use std::sync::Arc;

pub const VALID_TOKEN: &str = "valid-token";
pub const BAD_TOKEN: &str = "bad-token";

/// Application state wired to mocks: one authenticated user with no grants
/// and an empty shared cache seeded so warm-ups succeed.
pub fn test_state() -> (AppState, Arc<MockDatabase>, Arc<MockClusterClient>) {
    let config = Arc::new(Config::from_env());
    let db = Arc::new(MockDatabase::new());
    db.expect_kind_pairs(searchapi::rbac::shared::CLUSTER_SCOPED_SQL, Vec::new());

    let cluster = Arc::new(MockClusterClient::new());
    cluster.add_token(
        VALID_TOKEN,
        TokenReviewStatus {
            authenticated: true,
            user_uid: "uid-1".to_string(),
            username: "user-1".to_string(),
            groups: vec!["system:authenticated".to_string()],
        },
    );

    let cache = Arc::new(Cache::new(config.clone(), db.clone(), cluster.clone()));
    let state = AppState {
        config,
        db: db.clone(),
        cache,
        federation: None,
    };
    (state, db, cluster)
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}
